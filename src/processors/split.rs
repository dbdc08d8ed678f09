//! Month/size/time chunking of scrubbed track records.
//!
//! Records are sorted by calendar time, grouped by month and written to
//! numbered chunk pairs: a CSV file and a tab-separated device sidecar.
//! A chunk closes just before the record that finds it at or past the
//! byte ceiling or the time window; that record opens the next chunk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::config::{SizeProbe, SplitConfig};
use crate::core::record::{RecordSet, TrackRecord, TrackSchema};

/// Layout of the calendar time in a sidecar's first line.
const SIDECAR_TIME_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Errors that can occur while writing chunks.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("invalid split configuration: {0}")]
    Config(String),

    #[error("failed to create output directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create chunk file '{path}': {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write chunk file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV write error for '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Result type for split operations.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Why a chunk was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Tabular file reached the byte ceiling
    Size,
    /// Next record was at least one time window after the chunk start
    Time,
    /// No more records in the chunk's month
    MonthEnd,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CloseReason::Size => "size",
            CloseReason::Time => "time",
            CloseReason::MonthEnd => "month end",
        };
        f.write_str(label)
    }
}

/// One finished chunk and the two files that hold it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFileSet {
    /// `YYYY-MM`
    pub month: String,
    /// 1-based, restarts every month
    pub index: usize,
    pub tabular_path: PathBuf,
    pub sidecar_path: PathBuf,
    pub records: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    /// Bytes in the tabular file, header included
    pub tabular_bytes: u64,
    pub close_reason: CloseReason,
}

/// Outcome of a segmentation pass.
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub input_records: usize,
    pub months: usize,
    pub chunks: Vec<ChunkFileSet>,
    pub chunk_size_bytes: u64,
    pub time_window_ticks: i64,
}

/// Write-through wrapper that counts every byte accepted by the inner writer.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes accepted so far.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Validated naming and header settings.
struct ChunkLayout<'a> {
    device_id: &'a str,
    format_tag: &'a str,
    prefix: &'a str,
    tabular_ext: &'a str,
    sidecar_ext: &'a str,
    chunk_size_bytes: u64,
    time_window: i64,
    probe: SizeProbe,
}

impl<'a> ChunkLayout<'a> {
    fn from_config(config: &'a SplitConfig) -> Result<Self> {
        let device_id = config
            .device_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SplitError::Config("device_id is not configured".to_string()))?;

        let format_tag = config.format_tag.trim();
        if format_tag.is_empty() {
            return Err(SplitError::Config("format_tag is empty".to_string()));
        }
        if config.tabular_extension.is_empty() || config.sidecar_extension.is_empty() {
            return Err(SplitError::Config("output extensions must not be empty".to_string()));
        }
        if config.tabular_extension.eq_ignore_ascii_case(&config.sidecar_extension) {
            return Err(SplitError::Config(format!(
                "tabular and sidecar extensions are both '{}'",
                config.tabular_extension
            )));
        }
        if config.chunk_size_bytes == 0 {
            return Err(SplitError::Config("chunk_size_bytes must be positive".to_string()));
        }
        let time_window = config.time_window_ticks();
        if time_window <= 0 {
            return Err(SplitError::Config(
                "time window must be positive (time_window_seconds * ticks_per_second)".to_string(),
            ));
        }

        Ok(Self {
            device_id,
            format_tag,
            prefix: &config.file_prefix,
            tabular_ext: &config.tabular_extension,
            sidecar_ext: &config.sidecar_extension,
            chunk_size_bytes: config.chunk_size_bytes,
            time_window,
            probe: config.size_probe,
        })
    }

    fn paths(&self, output_dir: &Path, month: &str, index: usize) -> (PathBuf, PathBuf) {
        let stem = format!("{}_{}_part_{}", self.prefix, month, index);
        (
            output_dir.join(format!("{}.{}", stem, self.tabular_ext)),
            output_dir.join(format!("{}.{}", stem, self.sidecar_ext)),
        )
    }

    fn sidecar_header(&self, first: &TrackRecord) -> String {
        format!(
            "Track: {}\t{}\t \t{}",
            first.time.format(SIDECAR_TIME_FORMAT),
            self.device_id,
            self.format_tag
        )
    }
}

/// Check a split configuration without touching the filesystem.
pub fn validate_config(config: &SplitConfig) -> Result<()> {
    ChunkLayout::from_config(config).map(|_| ())
}

/// Join fields into one tab-separated sidecar line.
///
/// The sidecar has no quoting, so tabs and line breaks inside a field are
/// written as spaces to keep one record per line and one value per column.
/// The tabular file keeps the original value.
fn sidecar_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| field.replace(['\t', '\r', '\n'], " "))
        .collect::<Vec<_>>()
        .join("\t")
}

/// A chunk receiving rows. Both files are closed when this is dropped.
struct OpenChunk {
    month: String,
    index: usize,
    tabular_path: PathBuf,
    sidecar_path: PathBuf,
    tabular: csv::Writer<CountingWriter<File>>,
    sidecar: BufWriter<File>,
    start_timestamp: i64,
    last_timestamp: i64,
    records: usize,
}

impl OpenChunk {
    fn open(
        layout: &ChunkLayout<'_>,
        output_dir: &Path,
        schema: &TrackSchema,
        month: &str,
        index: usize,
        first: &TrackRecord,
    ) -> Result<Self> {
        let (tabular_path, sidecar_path) = layout.paths(output_dir, month, index);

        let tabular_file = File::create(&tabular_path).map_err(|source| SplitError::CreateFile {
            path: tabular_path.clone(),
            source,
        })?;
        let sidecar_file = File::create(&sidecar_path).map_err(|source| SplitError::CreateFile {
            path: sidecar_path.clone(),
            source,
        })?;

        let tabular = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(CountingWriter::new(tabular_file));

        let mut chunk = Self {
            month: month.to_string(),
            index,
            tabular_path,
            sidecar_path,
            tabular,
            sidecar: BufWriter::new(sidecar_file),
            start_timestamp: first.timestamp,
            last_timestamp: first.timestamp,
            records: 0,
        };

        chunk.write_tabular(schema.columns())?;
        let header = layout.sidecar_header(first);
        chunk.write_sidecar_line(&header)?;
        chunk.write_sidecar_line(&schema.columns().join("\t"))?;
        chunk.flush()?;

        debug!(
            "Opened {} chunk {} at {} ({})",
            chunk.month,
            chunk.index,
            chunk.start_timestamp,
            chunk.tabular_path.display()
        );

        Ok(chunk)
    }

    fn write_tabular<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.tabular
            .write_record(row)
            .map_err(|source| SplitError::Csv {
                path: self.tabular_path.clone(),
                source,
            })
    }

    fn write_sidecar_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.sidecar, "{}", line).map_err(|source| SplitError::WriteFile {
            path: self.sidecar_path.clone(),
            source,
        })
    }

    /// Push buffered bytes of both files to storage.
    fn flush(&mut self) -> Result<()> {
        let tabular = self.tabular.flush().map_err(|source| SplitError::WriteFile {
            path: self.tabular_path.clone(),
            source,
        });
        let sidecar = self.sidecar.flush().map_err(|source| SplitError::WriteFile {
            path: self.sidecar_path.clone(),
            source,
        });
        tabular.and(sidecar)
    }

    fn append(&mut self, record: &TrackRecord) -> Result<()> {
        self.write_tabular(&record.fields)?;
        self.write_sidecar_line(&sidecar_row(&record.fields))?;
        self.flush()?;
        self.last_timestamp = record.timestamp;
        self.records += 1;
        Ok(())
    }

    /// Size of the tabular file as persisted so far.
    fn tabular_bytes(&self, probe: SizeProbe) -> Result<u64> {
        match probe {
            SizeProbe::Counted => Ok(self.tabular.get_ref().written()),
            SizeProbe::Filesystem => fs::metadata(&self.tabular_path)
                .map(|m| m.len())
                .map_err(|source| SplitError::WriteFile {
                    path: self.tabular_path.clone(),
                    source,
                }),
        }
    }

    /// Check the ceilings as they stand before `next` is written.
    fn threshold_tripped(
        &self,
        next: &TrackRecord,
        layout: &ChunkLayout<'_>,
    ) -> Result<Option<CloseReason>> {
        if self.tabular_bytes(layout.probe)? >= layout.chunk_size_bytes {
            return Ok(Some(CloseReason::Size));
        }
        if next.timestamp.saturating_sub(self.start_timestamp) >= layout.time_window {
            return Ok(Some(CloseReason::Time));
        }
        Ok(None)
    }

    fn close(mut self, reason: CloseReason) -> Result<ChunkFileSet> {
        self.flush()?;
        let tabular_bytes = self.tabular.get_ref().written();

        debug!(
            "Closed {} chunk {} after {} records ({})",
            self.month, self.index, self.records, reason
        );

        Ok(ChunkFileSet {
            month: self.month,
            index: self.index,
            tabular_path: self.tabular_path,
            sidecar_path: self.sidecar_path,
            records: self.records,
            first_timestamp: self.start_timestamp,
            last_timestamp: self.last_timestamp,
            tabular_bytes,
            close_reason: reason,
        })
    }
}

/// Segmenter state within one month.
enum ChunkState {
    Idle,
    Open(OpenChunk),
}

impl ChunkState {
    fn take(&mut self) -> Option<OpenChunk> {
        match std::mem::replace(self, ChunkState::Idle) {
            ChunkState::Open(chunk) => Some(chunk),
            ChunkState::Idle => None,
        }
    }
}

/// Write one month's records, already in time order, as numbered chunks.
fn split_month(
    layout: &ChunkLayout<'_>,
    output_dir: &Path,
    schema: &TrackSchema,
    records: &[&TrackRecord],
    chunks: &mut Vec<ChunkFileSet>,
) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let month = first.month_key();
    info!("Processing month {} with {} records", month, records.len());

    let mut state = ChunkState::Idle;
    let mut next_index = 1usize;

    for &record in records {
        if let ChunkState::Open(chunk) = &state {
            if let Some(reason) = chunk.threshold_tripped(record, layout)? {
                if let Some(chunk) = state.take() {
                    chunks.push(chunk.close(reason)?);
                }
            }
        }

        match &mut state {
            ChunkState::Open(chunk) => chunk.append(record)?,
            ChunkState::Idle => {
                let mut chunk =
                    OpenChunk::open(layout, output_dir, schema, &month, next_index, record)?;
                next_index += 1;
                chunk.append(record)?;
                state = ChunkState::Open(chunk);
            }
        }
    }

    if let Some(chunk) = state.take() {
        chunks.push(chunk.close(CloseReason::MonthEnd)?);
    }

    Ok(())
}

/// Split records into month-bounded, size- and time-limited chunk pairs.
///
/// Records are sorted by `Time` (stable) before grouping, so the input
/// order does not matter. Configuration is validated before anything is
/// created on disk.
///
/// # Arguments
///
/// * `set` - Records to write; not modified
/// * `config` - Thresholds, naming and sidecar header settings
/// * `output_dir` - Directory for chunk files, created if missing
///
/// # Errors
///
/// Returns `SplitError::Config` for an unusable configuration. I/O errors
/// abort the pass and leave already written files in place.
pub fn split_records(set: &RecordSet, config: &SplitConfig, output_dir: &Path) -> Result<SplitReport> {
    let layout = ChunkLayout::from_config(config)?;

    fs::create_dir_all(output_dir).map_err(|source| SplitError::CreateDirectory {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut records: Vec<&TrackRecord> = set.records.iter().collect();
    records.sort_by_key(|r| r.time);

    let mut chunks = Vec::new();
    let mut months = 0usize;
    for month_records in records.chunk_by(|a, b| a.same_month(b)) {
        split_month(&layout, output_dir, &set.schema, month_records, &mut chunks)?;
        months += 1;
    }

    info!(
        "Split {} records into {} chunks across {} months (size ceiling {} bytes, time window {} ticks)",
        records.len(),
        chunks.len(),
        months,
        layout.chunk_size_bytes,
        layout.time_window
    );

    Ok(SplitReport {
        input_records: records.len(),
        months,
        chunks,
        chunk_size_bytes: layout.chunk_size_bytes,
        time_window_ticks: layout.time_window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: i64 = 3_600_000_000_000;

    fn schema() -> TrackSchema {
        TrackSchema::from_headers(["Timestamp", "Time", "Latitude", "Longitude", "DoseRate"]).unwrap()
    }

    fn record(schema: &TrackSchema, timestamp: i64, time: &str, dose: &str) -> TrackRecord {
        schema
            .parse_row(vec![
                timestamp.to_string(),
                time.to_string(),
                "51.5".to_string(),
                "-0.1".to_string(),
                dose.to_string(),
            ])
            .unwrap()
    }

    fn config() -> SplitConfig {
        SplitConfig {
            device_id: Some("RC-102-008228".to_string()),
            ..SplitConfig::default()
        }
    }

    fn data_rows(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_counting_writer() {
        let mut writer = CountingWriter::new(Vec::new());
        writer.write_all(b"hello").unwrap();
        writer.write_all(b", world").unwrap();
        assert_eq!(writer.written(), 12);
    }

    #[test]
    fn test_time_window_splits_every_record_and_restarts_numbering() {
        let schema = schema();
        let records = vec![
            record(&schema, 0, "2024-01-31 19:00:00", "1"),
            record(&schema, 2 * HOUR, "2024-01-31 21:00:00", "2"),
            record(&schema, 4 * HOUR, "2024-01-31 23:00:00", "3"),
            record(&schema, 6 * HOUR, "2024-02-01 01:00:00", "4"),
            record(&schema, 8 * HOUR, "2024-02-01 03:00:00", "5"),
        ];
        let set = RecordSet::with_records(schema, records);
        let dir = TempDir::new().unwrap();
        let config = SplitConfig {
            chunk_size_bytes: u64::MAX,
            time_window_seconds: 3600,
            ..config()
        };

        let report = split_records(&set, &config, dir.path()).unwrap();

        assert_eq!(report.input_records, 5);
        assert_eq!(report.months, 2);
        let names: Vec<(String, usize)> = report
            .chunks
            .iter()
            .map(|c| (c.month.clone(), c.index))
            .collect();
        assert_eq!(
            names,
            vec![
                ("2024-01".to_string(), 1),
                ("2024-01".to_string(), 2),
                ("2024-01".to_string(), 3),
                ("2024-02".to_string(), 1),
                ("2024-02".to_string(), 2),
            ]
        );
        assert!(report.chunks.iter().all(|c| c.records == 1));
        assert_eq!(report.chunks[0].close_reason, CloseReason::Time);
        assert_eq!(report.chunks[2].close_reason, CloseReason::MonthEnd);
        assert!(dir.path().join("master_2024-02_part_2.csv").exists());
        assert!(dir.path().join("master_2024-02_part_2.rctrk").exists());
    }

    #[test]
    fn test_tiny_byte_ceiling_gives_one_record_per_chunk() {
        let schema = schema();
        let records = (0..4)
            .map(|i| record(&schema, i, &format!("2024-05-01 00:00:0{}", i), "0.1"))
            .collect();
        let set = RecordSet::with_records(schema, records);
        let dir = TempDir::new().unwrap();
        let config = SplitConfig {
            chunk_size_bytes: 1,
            ..config()
        };

        let report = split_records(&set, &config, dir.path()).unwrap();

        assert_eq!(report.chunks.len(), 4);
        for (i, chunk) in report.chunks.iter().enumerate() {
            assert_eq!(chunk.index, i + 1);
            assert_eq!(chunk.records, 1);
            assert_eq!(data_rows(&chunk.tabular_path).len(), 1);
        }
    }

    #[test]
    fn test_size_ceiling_closes_before_overflow() {
        let schema = schema();
        // Every row serializes to the same number of bytes
        let records: Vec<TrackRecord> = (0..7)
            .map(|i| record(&schema, 10 + i, &format!("2024-05-01 00:00:1{}", i), "0.25"))
            .collect();
        let header_len = "Timestamp,Time,Latitude,Longitude,DoseRate\n".len() as u64;
        let row_len = "10,2024-05-01 00:00:10,51.5,-0.1,0.25\n".len() as u64;
        let set = RecordSet::with_records(schema, records);
        let dir = TempDir::new().unwrap();
        let config = SplitConfig {
            chunk_size_bytes: header_len + 3 * row_len,
            ..config()
        };

        let report = split_records(&set, &config, dir.path()).unwrap();

        let sizes: Vec<usize> = report.chunks.iter().map(|c| c.records).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(report.chunks[0].close_reason, CloseReason::Size);
        assert_eq!(report.chunks[0].tabular_bytes, header_len + 3 * row_len);
        assert_eq!(
            fs::metadata(&report.chunks[0].tabular_path).unwrap().len(),
            report.chunks[0].tabular_bytes
        );
    }

    #[test]
    fn test_time_window_boundary_is_inclusive() {
        let schema = schema();
        let records = vec![
            record(&schema, 0, "2024-06-01 00:00:00", "a"),
            record(&schema, HOUR - 1, "2024-06-01 00:59:59", "b"),
            record(&schema, HOUR, "2024-06-01 01:00:00", "c"),
        ];
        let set = RecordSet::with_records(schema, records);
        let dir = TempDir::new().unwrap();
        let config = SplitConfig {
            time_window_seconds: 3600,
            ..config()
        };

        let report = split_records(&set, &config, dir.path()).unwrap();
        let sizes: Vec<usize> = report.chunks.iter().map(|c| c.records).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(report.chunks[0].last_timestamp, HOUR - 1);
        assert_eq!(report.chunks[1].first_timestamp, HOUR);
    }

    #[test]
    fn test_file_contents() {
        let schema = schema();
        let records = vec![
            record(&schema, 5, "2024-03-05 14:22:11", "0.11"),
            record(&schema, 6, "2024-03-05 14:22:12", "note, with comma"),
        ];
        let set = RecordSet::with_records(schema, records);
        let dir = TempDir::new().unwrap();

        let report = split_records(&set, &config(), dir.path()).unwrap();
        assert_eq!(report.chunks.len(), 1);
        let chunk = &report.chunks[0];
        assert_eq!(chunk.tabular_path, dir.path().join("master_2024-03_part_1.csv"));

        let csv = fs::read_to_string(&chunk.tabular_path).unwrap();
        let csv_lines: Vec<&str> = csv.lines().collect();
        assert_eq!(csv_lines[0], "Timestamp,Time,Latitude,Longitude,DoseRate");
        assert_eq!(csv_lines[1], "5,2024-03-05 14:22:11,51.5,-0.1,0.11");
        assert_eq!(csv_lines[2], "6,2024-03-05 14:22:12,51.5,-0.1,\"note, with comma\"");

        let sidecar = fs::read_to_string(&chunk.sidecar_path).unwrap();
        let side_lines: Vec<&str> = sidecar.lines().collect();
        assert_eq!(side_lines[0], "Track: 2024-03-05 14-22-11\tRC-102-008228\t \tEC");
        assert_eq!(side_lines[1], "Timestamp\tTime\tLatitude\tLongitude\tDoseRate");
        assert_eq!(side_lines[2], "5\t2024-03-05 14:22:11\t51.5\t-0.1\t0.11");
        assert_eq!(side_lines[3], "6\t2024-03-05 14:22:12\t51.5\t-0.1\tnote, with comma");
        assert_eq!(side_lines.len(), 4);
    }

    #[test]
    fn test_sidecar_flattens_tabs_and_newlines() {
        let schema = schema();
        let records = vec![
            record(&schema, 5, "2024-03-05 14:22:11", "a\tb"),
            record(&schema, 6, "2024-03-05 14:22:12", "line one\r\nline two"),
        ];
        let set = RecordSet::with_records(schema, records);
        let dir = TempDir::new().unwrap();

        let report = split_records(&set, &config(), dir.path()).unwrap();
        let chunk = &report.chunks[0];

        let sidecar = fs::read_to_string(&chunk.sidecar_path).unwrap();
        let side_lines: Vec<&str> = sidecar.lines().collect();
        assert_eq!(side_lines.len(), 4);
        assert_eq!(side_lines[2], "5\t2024-03-05 14:22:11\t51.5\t-0.1\ta b");
        assert_eq!(side_lines[3], "6\t2024-03-05 14:22:12\t51.5\t-0.1\tline one  line two");
        assert!(side_lines.iter().skip(2).all(|l| l.split('\t').count() == 5));

        // The tabular file keeps the original values
        let mut reader = csv::Reader::from_path(&chunk.tabular_path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][4], "a\tb");
        assert_eq!(&rows[1][4], "line one\r\nline two");
    }

    #[test]
    fn test_chunks_reproduce_sorted_input() {
        let schema = schema();
        let times = [
            "2024-02-10 08:00:00",
            "2024-01-03 09:00:00",
            "2024-02-01 00:00:00",
            "2024-01-03 08:00:00",
            "2024-03-15 12:00:00",
            "2024-01-20 10:00:00",
        ];
        let records: Vec<TrackRecord> = times
            .iter()
            .enumerate()
            .map(|(i, t)| record(&schema, i as i64 * HOUR, t, &format!("v{}", i)))
            .collect();
        let mut expected = RecordSet::with_records(schema, records);
        let set = expected.clone();
        expected.sort_by_time();

        let dir = TempDir::new().unwrap();
        let config = SplitConfig {
            chunk_size_bytes: 120,
            ..config()
        };
        let report = split_records(&set, &config, dir.path()).unwrap();

        let written: Vec<String> = report
            .chunks
            .iter()
            .flat_map(|c| data_rows(&c.tabular_path))
            .collect();
        let wanted: Vec<String> = expected.records.iter().map(|r| r.fields.join(",")).collect();
        assert_eq!(written, wanted);

        for chunk in &report.chunks {
            for row in data_rows(&chunk.tabular_path) {
                assert!(row.contains(&format!(",{}-", chunk.month)));
            }
        }
    }

    #[test]
    fn test_missing_device_id_writes_nothing() {
        let schema = schema();
        let set = RecordSet::with_records(
            schema.clone(),
            vec![record(&schema, 0, "2024-01-01 00:00:00", "1")],
        );
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        let result = split_records(&set, &SplitConfig::default(), &out);
        assert!(matches!(result, Err(SplitError::Config(_))));
        assert!(!out.exists());

        let blank = SplitConfig {
            device_id: Some("  ".to_string()),
            ..SplitConfig::default()
        };
        assert!(matches!(split_records(&set, &blank, &out), Err(SplitError::Config(_))));
    }

    #[test]
    fn test_invalid_layouts_rejected() {
        let set = RecordSet::new(schema());
        let dir = TempDir::new().unwrap();

        let same_ext = SplitConfig {
            sidecar_extension: "CSV".to_string(),
            ..config()
        };
        assert!(matches!(
            split_records(&set, &same_ext, dir.path()),
            Err(SplitError::Config(_))
        ));

        let zero_window = SplitConfig {
            time_window_seconds: 0,
            ..config()
        };
        assert!(matches!(
            split_records(&set, &zero_window, dir.path()),
            Err(SplitError::Config(_))
        ));

        let no_tag = SplitConfig {
            format_tag: String::new(),
            ..config()
        };
        assert!(matches!(
            split_records(&set, &no_tag, dir.path()),
            Err(SplitError::Config(_))
        ));
    }

    #[test]
    fn test_filesystem_probe_matches_counted() {
        let schema = schema();
        let records: Vec<TrackRecord> = (0..20)
            .map(|i| {
                record(
                    &schema,
                    i * HOUR / 4,
                    &format!("2024-07-01 {:02}:00:00", i),
                    &"x".repeat(i as usize),
                )
            })
            .collect();
        let set = RecordSet::with_records(schema, records);

        let counted_dir = TempDir::new().unwrap();
        let fs_dir = TempDir::new().unwrap();
        let counted = SplitConfig {
            chunk_size_bytes: 200,
            ..config()
        };
        let probed = SplitConfig {
            size_probe: SizeProbe::Filesystem,
            ..counted.clone()
        };

        let a = split_records(&set, &counted, counted_dir.path()).unwrap();
        let b = split_records(&set, &probed, fs_dir.path()).unwrap();

        let shape = |r: &SplitReport| -> Vec<(usize, usize, u64)> {
            r.chunks
                .iter()
                .map(|c| (c.index, c.records, c.tabular_bytes))
                .collect()
        };
        assert_eq!(shape(&a), shape(&b));
        assert!(a.chunks.len() > 1);
    }

    #[test]
    fn test_empty_input() {
        let set = RecordSet::new(schema());
        let dir = TempDir::new().unwrap();

        let report = split_records(&set, &config(), dir.path()).unwrap();
        assert!(report.chunks.is_empty());
        assert_eq!(report.months, 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_output_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();

        let schema = schema();
        let set = RecordSet::with_records(
            schema.clone(),
            vec![record(&schema, 0, "2024-01-01 00:00:00", "1")],
        );
        let result = split_records(&set, &config(), &blocker.join("out"));
        assert!(matches!(result, Err(SplitError::CreateDirectory { .. })));
    }
}
