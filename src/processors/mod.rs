//! Data processing stages.

pub mod aggregate;
pub mod pipeline;
pub mod rename;
pub mod scrub;
pub mod split;

// Re-export key types for convenience
pub use aggregate::{
    aggregate_tracks, find_raw_tracks, write_master, AggregateError, AggregateOutcome, SkippedFile,
};
pub use pipeline::{run_pipeline, PipelineReport};
pub use rename::{copy_with_extension, RenameError, RenameOutcome};
pub use scrub::{scrub_records, ScrubError, ScrubOutcome};
pub use split::{split_records, ChunkFileSet, CloseReason, SplitError, SplitReport};
