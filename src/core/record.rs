//! Track record types shared by every pipeline stage.

use chrono::{Datelike, NaiveDateTime};

/// Column holding the calendar time of a sample.
pub const TIME_COLUMN: &str = "Time";
/// Column holding the high-resolution counter of a sample.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// Accepted layouts for the `Time` column, tried in order.
const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Column layout shared by every record of a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSchema {
    columns: Vec<String>,
    time_idx: usize,
    timestamp_idx: usize,
    position_idx: Option<(usize, usize)>,
}

impl TrackSchema {
    /// Build a schema from header names.
    ///
    /// `Time` and `Timestamp` are required; `Latitude`/`Longitude` are
    /// resolved when both are present. Names match exactly first, then
    /// case-insensitively. Returns the names of missing required columns
    /// on failure.
    pub fn from_headers<I, S>(headers: I) -> Result<Self, Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns: Vec<String> = headers
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .collect();

        let time_idx = find_column(&columns, TIME_COLUMN);
        let timestamp_idx = find_column(&columns, TIMESTAMP_COLUMN);

        match (time_idx, timestamp_idx) {
            (Some(time_idx), Some(timestamp_idx)) => {
                let position_idx = find_column(&columns, LATITUDE_COLUMN)
                    .zip(find_column(&columns, LONGITUDE_COLUMN));
                Ok(Self {
                    columns,
                    time_idx,
                    timestamp_idx,
                    position_idx,
                })
            }
            (time_idx, timestamp_idx) => {
                let mut missing = Vec::new();
                if time_idx.is_none() {
                    missing.push(TIME_COLUMN.to_string());
                }
                if timestamp_idx.is_none() {
                    missing.push(TIMESTAMP_COLUMN.to_string());
                }
                Err(missing)
            }
        }
    }

    /// Column names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether the schema carries `Latitude` and `Longitude`.
    #[inline]
    pub fn has_position(&self) -> bool {
        self.position_idx.is_some()
    }

    /// Parse one row of raw fields into a record.
    ///
    /// Rows with the wrong field count, or an unparseable `Time`,
    /// `Timestamp` or coordinate, are rejected with a reason.
    pub fn parse_row(&self, fields: Vec<String>) -> Result<TrackRecord, String> {
        if fields.len() != self.columns.len() {
            return Err(format!(
                "expected {} fields, found {}",
                self.columns.len(),
                fields.len()
            ));
        }

        let time_raw = &fields[self.time_idx];
        let time = parse_time(time_raw).ok_or_else(|| format!("unparseable Time '{}'", time_raw))?;

        let ts_raw = &fields[self.timestamp_idx];
        let timestamp = parse_timestamp(ts_raw)
            .ok_or_else(|| format!("unparseable Timestamp '{}'", ts_raw))?;

        let position = match self.position_idx {
            Some((lat_idx, lon_idx)) => {
                let latitude = parse_coordinate(&fields[lat_idx])
                    .ok_or_else(|| format!("unparseable Latitude '{}'", fields[lat_idx]))?;
                let longitude = parse_coordinate(&fields[lon_idx])
                    .ok_or_else(|| format!("unparseable Longitude '{}'", fields[lon_idx]))?;
                Some(GeoPoint {
                    latitude,
                    longitude,
                })
            }
            None => None,
        };

        Ok(TrackRecord {
            time,
            timestamp,
            position,
            fields,
        })
    }
}

fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
}

/// Parse a timezone-naive calendar time.
pub fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse the integer counter. Integral float spellings such as `1.7e17`
/// are accepted since spreadsheet round trips produce them.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v: f64 = raw.parse().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One measurement sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    /// Calendar time, used for ordering and month grouping
    pub time: NaiveDateTime,
    /// Opaque counter, used only for span arithmetic
    pub timestamp: i64,
    /// Present when the schema carries coordinates
    pub position: Option<GeoPoint>,
    /// Raw text of every column in schema order
    pub fields: Vec<String>,
}

impl TrackRecord {
    /// `YYYY-MM` key of the record's calendar month.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.time.year(), self.time.month())
    }

    #[inline]
    pub(crate) fn same_month(&self, other: &TrackRecord) -> bool {
        self.time.year() == other.time.year() && self.time.month() == other.time.month()
    }
}

/// Records sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub schema: TrackSchema,
    pub records: Vec<TrackRecord>,
}

impl RecordSet {
    pub fn new(schema: TrackSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn with_records(schema: TrackSchema, records: Vec<TrackRecord>) -> Self {
        Self { schema, records }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stable sort by calendar time.
    pub fn sort_by_time(&mut self) {
        self.records.sort_by_key(|r| r.time);
    }
}
