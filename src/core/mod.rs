//! Core data types and I/O operations.

pub mod geo;
pub mod loaders;
pub mod record;
pub mod writers;

pub use geo::haversine_m;
pub use loaders::{load_raw_track, load_track_csv, LoadedTrack, LoaderError};
pub use record::{GeoPoint, RecordSet, TrackRecord, TrackSchema};
pub use writers::{write_metadata_json, write_track_csv, TrackFileMetadata, WriteError};
