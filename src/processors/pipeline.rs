//! End-to-end run: aggregate, scrub, split.

use anyhow::{Context, Result};
use log::info;

use crate::config::PipelineConfig;
use crate::core::writers::write_track_csv;
use crate::processors::aggregate::{aggregate_tracks, write_master};
use crate::processors::scrub::{scrub_records, validate_zone};
use crate::processors::split::{self, split_records, SplitReport};

/// Counters from every stage of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub files_accepted: usize,
    pub files_skipped: usize,
    pub rows_skipped: usize,
    pub master_records: usize,
    pub excluded_records: usize,
    pub split: SplitReport,
}

/// Run all stages with the directories from `config.paths`.
///
/// Zones and split settings are validated before any file is read, so a
/// configuration error leaves the filesystem untouched. Intermediate
/// master and scrubbed CSVs are written as each stage finishes.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    for (index, zone) in config.exclusions.iter().enumerate() {
        validate_zone(index, zone)?;
    }
    split::validate_config(&config.split)?;

    let paths = &config.paths;

    info!("[1/3] Aggregating raw tracks from {}", paths.raw_dir.display());
    let aggregated = aggregate_tracks(&paths.raw_dir, &config.aggregate)
        .with_context(|| format!("aggregating {}", paths.raw_dir.display()))?;
    write_master(&aggregated, &paths.master_csv(), &paths.master_metadata())
        .context("writing master collection")?;

    info!("[2/3] Scrubbing {} records", aggregated.set.len());
    let scrubbed = scrub_records(&aggregated.set, &config.exclusions)?;
    let scrubbed_csv = paths.scrubbed_csv();
    write_track_csv(&scrubbed_csv, &scrubbed.kept)
        .with_context(|| format!("writing {}", scrubbed_csv.display()))?;

    info!("[3/3] Splitting {} records", scrubbed.kept.len());
    let split = split_records(&scrubbed.kept, &config.split, &paths.output_dir)
        .with_context(|| format!("splitting into {}", paths.output_dir.display()))?;

    Ok(PipelineReport {
        files_accepted: aggregated.files_accepted(),
        files_skipped: aggregated.skipped_files.len(),
        rows_skipped: aggregated.skipped_rows,
        master_records: aggregated.set.len(),
        excluded_records: scrubbed.excluded,
        split,
    })
}
