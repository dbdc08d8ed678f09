//! Redaction and segmentation pipeline for radiation survey track logs.
//!
//! This crate provides tools for:
//! - Aggregating raw device track exports into one master collection
//! - Removing records that fall inside circular exclusion zones
//! - Splitting the remaining records into monthly chunks bounded by file
//!   size and time span, each written as a CSV plus a device sidecar
//!
//! # Example
//!
//! ```no_run
//! use radtrack_pipeline::config::{ExclusionZone, SplitConfig};
//! use radtrack_pipeline::core::loaders::load_track_csv;
//! use radtrack_pipeline::processors::{scrub_records, split_records};
//! use std::path::Path;
//!
//! let master = load_track_csv("master_collection.csv").unwrap();
//! let zones = vec![ExclusionZone::new(51.5, -0.12, 250.0)];
//! let scrubbed = scrub_records(&master.set, &zones).unwrap();
//!
//! let config = SplitConfig {
//!     device_id: Some("RC-102-008228".to_string()),
//!     ..SplitConfig::default()
//! };
//! let report = split_records(&scrubbed.kept, &config, Path::new("out")).unwrap();
//! println!("{} chunks", report.chunks.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use crate::config::{ExclusionZone, PipelineConfig, SplitConfig};
pub use crate::core::record::{RecordSet, TrackRecord, TrackSchema};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
