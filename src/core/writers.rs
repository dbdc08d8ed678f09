//! Data writers for master collections and aggregation metadata.
//!
//! This module provides functions for writing track data to:
//! - CSV with the record set's own column order
//! - JSON metadata describing each aggregated source file

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::record::RecordSet;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// JSON serialization error.
    #[error("JSON write error for '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Describes one raw source file folded into the master collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFileMetadata {
    /// File name without directory
    pub file: String,
    /// First line of the raw export
    pub header: String,
    /// Smallest `Timestamp` in the file, as written
    pub start_time: Option<String>,
    /// Largest `Timestamp` in the file, as written
    pub end_time: Option<String>,
}

/// Write a record set to CSV.
///
/// The header row is the schema's column names; each record is written
/// from its raw fields so values pass through unchanged.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `set` - Records to write
///
/// # Example
///
/// ```no_run
/// use radtrack_pipeline::core::loaders::load_track_csv;
/// use radtrack_pipeline::core::writers::write_track_csv;
/// use std::path::Path;
///
/// let loaded = load_track_csv("master_collection.csv").unwrap();
/// write_track_csv(Path::new("copy.csv"), &loaded.set).unwrap();
/// ```
pub fn write_track_csv(path: &Path, set: &RecordSet) -> Result<()> {
    ensure_parent_dirs(path)?;

    let buf_writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(set.schema.columns())
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for record in &set.records {
        csv_writer
            .write_record(&record.fields)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write aggregation metadata as pretty-printed JSON.
pub fn write_metadata_json(path: &Path, metadata: &[TrackFileMetadata]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    serde_json::to_writer_pretty(&mut writer, metadata).map_err(|e| WriteError::JsonError {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
