//! Data loaders for raw device tracks and master CSV collections.
//!
//! This module provides parsers for:
//! - Raw track exports (one free-form header line, then tab-separated table)
//! - Comma-separated master collections produced by aggregation
//!
//! Rows that are not valid UTF-8, or whose `Time`, `Timestamp` or
//! coordinates cannot be parsed, are skipped and counted, never fatal.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::debug;
use thiserror::Error;

use super::record::{RecordSet, TrackSchema};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns in '{path}': {columns}")]
    MissingColumns { path: PathBuf, columns: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A parsed table plus what had to be dropped to get it.
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub set: RecordSet,
    /// Rows rejected because a required value failed to parse
    pub skipped_rows: usize,
    /// First line of a raw export, if the source had one
    pub header: Option<String>,
}

/// Load a comma-separated master collection.
///
/// The first row must name the columns and include `Time` and `Timestamp`.
pub fn load_track_csv<P: AsRef<Path>>(path: P) -> Result<LoadedTrack> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (set, skipped_rows) = read_table(path, BufReader::new(file), b',')?;
    Ok(LoadedTrack {
        set,
        skipped_rows,
        header: None,
    })
}

/// Load a raw device export.
///
/// The expected layout:
/// - Line 1: track header, e.g. `Track: 2024-03-05 14-22-11\tRC-102-008228\t \tEC`
/// - Line 2: tab-separated column names
/// - Remaining lines: tab-separated values
pub fn load_raw_track<P: AsRef<Path>>(path: P) -> Result<LoadedTrack> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    let read = reader.read_line(&mut header).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if read == 0 {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    let header = header.trim_end_matches(['\r', '\n']).to_string();

    let (set, skipped_rows) = read_table(path, reader, b'\t')?;
    Ok(LoadedTrack {
        set,
        skipped_rows,
        header: Some(header),
    })
}

fn read_table<R: Read>(path: &Path, source: R, delimiter: u8) -> Result<(RecordSet, usize)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|source| LoaderError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let schema =
        TrackSchema::from_headers(headers.iter()).map_err(|missing| LoaderError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing.join(", "),
        })?;

    let mut set = RecordSet::new(schema);
    let mut skipped = 0usize;

    for (line, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            // An I/O failure leaves the reader unusable; anything else is one bad row
            Err(source) if source.is_io_error() => {
                return Err(LoaderError::Csv {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(e) => {
                debug!("{}: skipping data row {}: {}", path.display(), line + 1, e);
                skipped += 1;
                continue;
            }
        };

        // Blank trailing lines come back as a single empty field
        if row.len() == 1 && row.get(0).map_or(true, |f| f.trim().is_empty()) {
            continue;
        }

        let fields: Vec<String> = row.iter().map(str::to_string).collect();
        match set.schema.parse_row(fields) {
            Ok(record) => set.records.push(record),
            Err(reason) => {
                debug!("{}: skipping data row {}: {}", path.display(), line + 1, reason);
                skipped += 1;
            }
        }
    }

    Ok((set, skipped))
}
