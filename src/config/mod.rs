//! Configuration types for the track pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading or writing configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Directory layout used by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw track exports as produced by the device
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Aggregated master collection and its metadata
    #[serde(default = "default_master_dir")]
    pub master_dir: PathBuf,

    /// Master collection with exclusion zones removed
    #[serde(default = "default_scrubbed_dir")]
    pub scrubbed_dir: PathBuf,

    /// Chunked CSV/sidecar output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Raw exports copied with the sidecar extension
    #[serde(default = "default_renamed_dir")]
    pub renamed_dir: PathBuf,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("files_raw_input_from_radiacode")
}

fn default_master_dir() -> PathBuf {
    PathBuf::from("files_master_collection")
}

fn default_scrubbed_dir() -> PathBuf {
    PathBuf::from("files_scrubbed_stage_one_master_collection")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("files_output_collection")
}

fn default_renamed_dir() -> PathBuf {
    PathBuf::from("files_raw_output_raddiacode")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            master_dir: default_master_dir(),
            scrubbed_dir: default_scrubbed_dir(),
            output_dir: default_output_dir(),
            renamed_dir: default_renamed_dir(),
        }
    }
}

impl PathsConfig {
    /// Master CSV written by the aggregation stage.
    pub fn master_csv(&self) -> PathBuf {
        self.master_dir.join("master_collection.csv")
    }

    /// Per-file metadata written by the aggregation stage.
    pub fn master_metadata(&self) -> PathBuf {
        self.master_dir.join("master_metadata.json")
    }

    /// Scrubbed CSV written by the exclusion stage.
    pub fn scrubbed_csv(&self) -> PathBuf {
        self.scrubbed_dir.join("master_collection_scrubbed.csv")
    }
}

/// A circular region whose records are redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionZone {
    /// Optional label, only used in log output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Center latitude in degrees
    #[serde(rename = "lat", alias = "latitude")]
    pub center_latitude: f64,

    /// Center longitude in degrees
    #[serde(rename = "lon", alias = "longitude")]
    pub center_longitude: f64,

    /// Radius in meters, boundary inclusive
    #[serde(rename = "radius_m", alias = "radius_meters")]
    pub radius_meters: f64,
}

impl ExclusionZone {
    pub fn new(center_latitude: f64, center_longitude: f64, radius_meters: f64) -> Self {
        Self {
            name: None,
            center_latitude,
            center_longitude,
            radius_meters,
        }
    }

    /// Label for log output: the configured name or the center coordinates.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("({:.5}, {:.5})", self.center_latitude, self.center_longitude),
        }
    }
}

/// Standalone exclusion zone file, `{"exclusions": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionConfig {
    #[serde(default)]
    pub exclusions: Vec<ExclusionZone>,
}

impl ExclusionConfig {
    /// Load exclusion zones from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// How the segmenter learns the size of a chunk's tabular file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeProbe {
    /// Count the bytes flushed to the file
    #[default]
    Counted,
    /// Ask the filesystem for the file length after every row
    Filesystem,
}

/// Configuration for month/size/time chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Close a chunk once its tabular file reaches this many bytes
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: u64,

    /// Close a chunk once it spans this many seconds
    #[serde(default = "default_time_window_seconds")]
    pub time_window_seconds: u64,

    /// Resolution of the `Timestamp` column in ticks per second
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u64,

    /// Device identifier written to every sidecar header
    #[serde(default)]
    pub device_id: Option<String>,

    /// Format tag closing every sidecar header
    #[serde(default = "default_format_tag")]
    pub format_tag: String,

    /// Output file name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_tabular_extension")]
    pub tabular_extension: String,

    #[serde(default = "default_sidecar_extension")]
    pub sidecar_extension: String,

    #[serde(default)]
    pub size_probe: SizeProbe,
}

fn default_chunk_size_bytes() -> u64 {
    9 * 1024 * 1024
}

fn default_time_window_seconds() -> u64 {
    24 * 3600
}

fn default_ticks_per_second() -> u64 {
    1_000_000_000
}

fn default_format_tag() -> String {
    "EC".to_string()
}

fn default_file_prefix() -> String {
    "master".to_string()
}

fn default_tabular_extension() -> String {
    "csv".to_string()
}

fn default_sidecar_extension() -> String {
    "rctrk".to_string()
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size_bytes(),
            time_window_seconds: default_time_window_seconds(),
            ticks_per_second: default_ticks_per_second(),
            device_id: None,
            format_tag: default_format_tag(),
            file_prefix: default_file_prefix(),
            tabular_extension: default_tabular_extension(),
            sidecar_extension: default_sidecar_extension(),
            size_probe: SizeProbe::default(),
        }
    }
}

impl SplitConfig {
    /// Time ceiling expressed in `Timestamp` units, saturating at `i64::MAX`.
    pub fn time_window_ticks(&self) -> i64 {
        let ticks = u128::from(self.time_window_seconds) * u128::from(self.ticks_per_second);
        i64::try_from(ticks).unwrap_or(i64::MAX)
    }
}

/// Configuration for raw track aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// File extensions accepted as raw track exports
    #[serde(default = "default_raw_extensions")]
    pub extensions: Vec<String>,
}

fn default_raw_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            extensions: default_raw_extensions(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub aggregate: AggregateConfig,

    #[serde(default)]
    pub exclusions: Vec<ExclusionZone>,

    #[serde(default)]
    pub split: SplitConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_split_config() {
        let config = SplitConfig::default();
        assert_eq!(config.chunk_size_bytes, 9 * 1024 * 1024);
        assert_eq!(config.time_window_ticks(), 86_400 * 1_000_000_000);
        assert_eq!(config.format_tag, "EC");
        assert!(config.device_id.is_none());
        assert_eq!(config.size_probe, SizeProbe::Counted);
    }

    #[test]
    fn test_time_window_saturates() {
        let config = SplitConfig {
            time_window_seconds: u64::MAX,
            ticks_per_second: u64::MAX,
            ..SplitConfig::default()
        };
        assert_eq!(config.time_window_ticks(), i64::MAX);
    }

    #[test]
    fn test_exclusion_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"exclusions": [{{"lat": 51.5, "lon": -0.12, "radius_m": 250}},
                {{"name": "depot", "latitude": 10.0, "longitude": 10.0, "radius_meters": 1000.0}}]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = ExclusionConfig::from_json(file.path()).unwrap();
        assert_eq!(config.exclusions.len(), 2);
        assert_eq!(config.exclusions[0], ExclusionZone::new(51.5, -0.12, 250.0));
        assert_eq!(config.exclusions[1].label(), "depot");
    }

    #[test]
    fn test_exclusion_json_missing_key_is_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();
        file.flush().unwrap();

        let config = ExclusionConfig::from_json(file.path()).unwrap();
        assert!(config.exclusions.is_empty());
    }

    #[test]
    fn test_yaml_partial_sections_use_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "split:").unwrap();
        writeln!(file, "  device_id: RC-102-008228").unwrap();
        writeln!(file, "  size_probe: filesystem").unwrap();
        writeln!(file, "exclusions:").unwrap();
        writeln!(file, "  - {{lat: 1.0, lon: 2.0, radius_m: 3.0}}").unwrap();
        file.flush().unwrap();

        let config = PipelineConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.split.device_id.as_deref(), Some("RC-102-008228"));
        assert_eq!(config.split.size_probe, SizeProbe::Filesystem);
        assert_eq!(config.split.file_prefix, "master");
        assert_eq!(config.exclusions.len(), 1);
        assert_eq!(config.paths.raw_dir, PathBuf::from("files_raw_input_from_radiacode"));
    }

    #[test]
    fn test_yaml_zone_without_radius_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "exclusions:").unwrap();
        writeln!(file, "  - {{lat: 51.5007, lon: -0.1246, radius: 300}}").unwrap();
        file.flush().unwrap();

        let result = PipelineConfig::from_yaml(file.path());
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn test_yaml_round_trip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.yaml");
        let mut config = PipelineConfig::default();
        config.split.device_id = Some("RC-1".to_string());

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.split.device_id.as_deref(), Some("RC-1"));
        assert_eq!(loaded.aggregate.extensions, vec!["txt".to_string()]);
    }

    #[test]
    fn test_missing_config_file() {
        let result = PipelineConfig::from_yaml("/nonexistent/pipeline.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
