//! Aggregation of raw device exports into one master collection.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::AggregateConfig;
use crate::core::loaders::{load_raw_track, LoadedTrack, LoaderError};
use crate::core::record::RecordSet;
use crate::core::writers::{write_metadata_json, write_track_csv, TrackFileMetadata, WriteError};

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to list directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No usable track files in {0}")]
    NoTrackFiles(PathBuf),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type for aggregation.
pub type Result<T> = std::result::Result<T, AggregateError>;

/// A raw file left out of the master collection.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Master collection plus the bookkeeping of how it was built.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub set: RecordSet,
    pub metadata: Vec<TrackFileMetadata>,
    pub skipped_files: Vec<SkippedFile>,
    pub skipped_rows: usize,
}

impl AggregateOutcome {
    #[inline]
    pub fn files_accepted(&self) -> usize {
        self.metadata.len()
    }
}

/// List raw track files in `dir` with one of `extensions`, sorted by path.
pub fn find_raw_tracks(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AggregateError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| AggregateError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

fn file_metadata(path: &Path, loaded: &LoadedTrack) -> TrackFileMetadata {
    let timestamps = loaded.set.records.iter().map(|r| r.timestamp);
    TrackFileMetadata {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        header: loaded.header.clone().unwrap_or_default(),
        start_time: timestamps.clone().min().map(|t| t.to_string()),
        end_time: timestamps.max().map(|t| t.to_string()),
    }
}

/// Load every raw track in `raw_dir` and concatenate them.
///
/// Files are parsed in parallel and merged in path order. The first file
/// that loads defines the column schema; a file that fails to load or
/// whose columns differ is skipped and reported, as are unparseable rows.
///
/// # Errors
///
/// Returns an error if the directory is missing or no file could be used.
pub fn aggregate_tracks(raw_dir: &Path, config: &AggregateConfig) -> Result<AggregateOutcome> {
    let files = find_raw_tracks(raw_dir, &config.extensions)?;

    let loaded: Vec<(PathBuf, std::result::Result<LoadedTrack, LoaderError>)> = files
        .into_par_iter()
        .map(|path| {
            let result = load_raw_track(&path);
            (path, result)
        })
        .collect();

    let mut set: Option<RecordSet> = None;
    let mut metadata = Vec::with_capacity(loaded.len());
    let mut skipped_files = Vec::new();
    let mut skipped_rows = 0usize;

    for (path, result) in loaded {
        let track = match result {
            Ok(track) => track,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                skipped_files.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Some(master) = &set {
            if master.schema != track.set.schema {
                let reason = format!(
                    "columns [{}] differ from master columns [{}]",
                    track.set.schema.columns().join(", "),
                    master.schema.columns().join(", ")
                );
                warn!("Skipping {}: {}", path.display(), reason);
                skipped_files.push(SkippedFile { path, reason });
                continue;
            }
        }

        if track.skipped_rows > 0 {
            warn!(
                "{}: skipped {} unparseable rows",
                path.display(),
                track.skipped_rows
            );
        }
        skipped_rows += track.skipped_rows;
        metadata.push(file_metadata(&path, &track));

        let master = set.get_or_insert_with(|| RecordSet::new(track.set.schema.clone()));
        master.records.extend(track.set.records);
    }

    let set = set.ok_or_else(|| AggregateError::NoTrackFiles(raw_dir.to_path_buf()))?;

    info!(
        "Aggregated {} files into {} records ({} files skipped, {} rows skipped)",
        metadata.len(),
        set.len(),
        skipped_files.len(),
        skipped_rows
    );

    Ok(AggregateOutcome {
        set,
        metadata,
        skipped_files,
        skipped_rows,
    })
}

/// Persist an aggregation as master CSV plus metadata JSON.
pub fn write_master(outcome: &AggregateOutcome, master_csv: &Path, metadata_json: &Path) -> Result<()> {
    write_track_csv(master_csv, &outcome.set)?;
    write_metadata_json(metadata_json, &outcome.metadata)?;
    info!("Master CSV written to {}", master_csv.display());
    info!("Metadata JSON written to {}", metadata_json.display());
    Ok(())
}
