//! Command-line interface for the track pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ConfigError, ExclusionConfig, ExclusionZone};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "radtrack-pipeline")]
#[command(about = "Scrub and chunk radiation survey track logs", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine raw track exports into a master CSV and metadata JSON
    Aggregate {
        /// Directory of raw track exports
        #[arg(long)]
        raw_dir: Option<PathBuf>,
        /// Directory for master_collection.csv and master_metadata.json
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Remove records inside exclusion zones
    Scrub {
        /// Master CSV to scrub
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory for master_collection_scrubbed.csv
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// JSON file with {"exclusions": [{lat, lon, radius_m}, ...]}
        #[arg(long)]
        zones: Option<PathBuf>,
    },

    /// Split scrubbed records into monthly size/time-bounded chunks
    Split {
        /// Scrubbed CSV to split
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory for chunk files
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Device identifier for sidecar headers
        #[arg(long)]
        device_id: Option<String>,
        /// Byte ceiling per chunk
        #[arg(long)]
        chunk_size_bytes: Option<u64>,
        /// Time ceiling per chunk in seconds
        #[arg(long)]
        time_window_seconds: Option<u64>,
        /// Timestamp ticks per second
        #[arg(long)]
        ticks_per_second: Option<u64>,
    },

    /// Copy raw exports with the sidecar extension
    Rename {
        /// Directory of raw exports
        #[arg(long)]
        src_dir: Option<PathBuf>,
        /// Destination directory
        #[arg(long)]
        dest_dir: Option<PathBuf>,
        /// Preview changes without copying files
        #[arg(long)]
        dry_run: bool,
    },

    /// Aggregate, scrub and split in one go
    Run {
        /// JSON file with exclusion zones (overrides config)
        #[arg(long)]
        zones: Option<PathBuf>,
        /// Device identifier for sidecar headers
        #[arg(long)]
        device_id: Option<String>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            let head: String = value.chars().take(35).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Log a fatal error and exit non-zero.
fn fail(spinner: Option<&ProgressBar>, what: &str, err: &dyn std::fmt::Display) -> ! {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    error!("{} failed: {}", what, err);
    eprintln!("{} failed: {}", what, err);
    std::process::exit(1);
}

/// Zones from an explicit JSON file, or the config's list.
fn resolve_zones(zones_file: Option<&Path>, config: &PipelineConfig) -> Vec<ExclusionZone> {
    match zones_file {
        Some(path) => match ExclusionConfig::from_json(path) {
            Ok(zones) => {
                info!(
                    "Loaded {} exclusion zones from {}",
                    zones.exclusions.len(),
                    path.display()
                );
                zones.exclusions
            }
            Err(e) => fail(None, "Loading exclusion zones", &e),
        },
        None => config.exclusions.clone(),
    }
}

/// Config from an explicit YAML file, or the defaults when none is given.
///
/// A file that was named but cannot be loaded is an error: its exclusion
/// zones must never be silently replaced by an empty list.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => fail(None, "Loading config", &e),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Aggregate { raw_dir, out_dir } => {
            cmd_aggregate(raw_dir, out_dir, config);
        }
        Commands::Scrub { input, out_dir, zones } => {
            cmd_scrub(input, out_dir, zones, config);
        }
        Commands::Split {
            input,
            out_dir,
            device_id,
            chunk_size_bytes,
            time_window_seconds,
            ticks_per_second,
        } => {
            let mut config = config;
            if let Some(id) = device_id {
                config.split.device_id = Some(id);
            }
            if let Some(bytes) = chunk_size_bytes {
                config.split.chunk_size_bytes = bytes;
            }
            if let Some(seconds) = time_window_seconds {
                config.split.time_window_seconds = seconds;
            }
            if let Some(ticks) = ticks_per_second {
                config.split.ticks_per_second = ticks;
            }
            cmd_split(input, out_dir, config);
        }
        Commands::Rename {
            src_dir,
            dest_dir,
            dry_run,
        } => {
            cmd_rename(src_dir, dest_dir, dry_run, config);
        }
        Commands::Run { zones, device_id } => {
            let mut config = config;
            config.exclusions = resolve_zones(zones.as_deref(), &config);
            if let Some(id) = device_id {
                config.split.device_id = Some(id);
            }
            cmd_run(config);
        }
    }
}

fn cmd_aggregate(raw_dir: Option<PathBuf>, out_dir: Option<PathBuf>, mut config: PipelineConfig) {
    use crate::processors::aggregate;

    let start = Instant::now();
    if let Some(dir) = raw_dir {
        config.paths.raw_dir = dir;
    }
    if let Some(dir) = out_dir {
        config.paths.master_dir = dir;
    }
    let paths = &config.paths;

    let spinner = create_spinner("Aggregating raw tracks...");

    let outcome = match aggregate::aggregate_tracks(&paths.raw_dir, &config.aggregate) {
        Ok(outcome) => outcome,
        Err(e) => fail(Some(&spinner), "Aggregation", &e),
    };
    if let Err(e) = aggregate::write_master(&outcome, &paths.master_csv(), &paths.master_metadata()) {
        fail(Some(&spinner), "Writing master collection", &e);
    }

    spinner.finish_and_clear();

    for skipped in &outcome.skipped_files {
        println!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    print_summary(
        "Aggregation Complete",
        &[
            ("Raw directory", paths.raw_dir.display().to_string()),
            ("Files processed", outcome.files_accepted().to_string()),
            ("Files skipped", outcome.skipped_files.len().to_string()),
            ("Rows skipped", outcome.skipped_rows.to_string()),
            ("Master records", outcome.set.len().to_string()),
            ("Master columns", outcome.set.schema.len().to_string()),
            ("Master CSV", paths.master_csv().display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    println!("Columns: {}", outcome.set.schema.columns().join(", "));
}

fn cmd_scrub(
    input: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    zones: Option<PathBuf>,
    mut config: PipelineConfig,
) {
    use crate::core::loaders;
    use crate::core::writers;
    use crate::processors::scrub;

    let start = Instant::now();
    let input = input.unwrap_or_else(|| config.paths.master_csv());
    if let Some(dir) = out_dir {
        config.paths.scrubbed_dir = dir;
    }
    let zones = resolve_zones(zones.as_deref(), &config);
    let output = config.paths.scrubbed_csv();

    println!("Scrubbing {} against {} exclusion zones", input.display(), zones.len());

    let spinner = create_spinner("Loading master collection...");

    let loaded = match loaders::load_track_csv(&input) {
        Ok(loaded) => loaded,
        Err(e) => fail(Some(&spinner), "Loading master collection", &e),
    };

    spinner.set_message("Applying exclusion zones...");
    let outcome = match scrub::scrub_records(&loaded.set, &zones) {
        Ok(outcome) => outcome,
        Err(e) => fail(Some(&spinner), "Scrubbing", &e),
    };

    if let Err(e) = writers::write_track_csv(&output, &outcome.kept) {
        fail(Some(&spinner), "Writing scrubbed CSV", &e);
    }

    spinner.finish_and_clear();

    print_summary(
        "Scrubbing Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Initial records", loaded.set.len().to_string()),
            ("Rows skipped", loaded.skipped_rows.to_string()),
            ("Excluded records", outcome.excluded.to_string()),
            ("Remaining records", outcome.kept.len().to_string()),
            ("Scrubbed CSV", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_split(input: Option<PathBuf>, out_dir: Option<PathBuf>, mut config: PipelineConfig) {
    use crate::core::loaders;
    use crate::processors::split;

    let start = Instant::now();
    let input = input.unwrap_or_else(|| config.paths.scrubbed_csv());
    if let Some(dir) = out_dir {
        config.paths.output_dir = dir;
    }

    if let Err(e) = split::validate_config(&config.split) {
        fail(None, "Split configuration", &e);
    }

    println!("Reading input from scrubbed CSV: {}", input.display());

    let spinner = create_spinner("Loading scrubbed records...");

    let loaded = match loaders::load_track_csv(&input) {
        Ok(loaded) => loaded,
        Err(e) => fail(Some(&spinner), "Loading scrubbed records", &e),
    };

    spinner.set_message("Writing chunks...");
    let report = match split::split_records(&loaded.set, &config.split, &config.paths.output_dir) {
        Ok(report) => report,
        Err(e) => fail(Some(&spinner), "Splitting", &e),
    };

    spinner.finish_and_clear();

    for chunk in &report.chunks {
        println!(
            "{} part {}: {} records, {} bytes ({})",
            chunk.month, chunk.index, chunk.records, chunk.tabular_bytes, chunk.close_reason
        );
    }

    print_summary(
        "Splitting Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Input records", report.input_records.to_string()),
            ("Rows skipped", loaded.skipped_rows.to_string()),
            ("Months", report.months.to_string()),
            ("Chunks written", report.chunks.len().to_string()),
            ("Size ceiling (bytes)", report.chunk_size_bytes.to_string()),
            ("Time window (ticks)", report.time_window_ticks.to_string()),
            ("Output directory", config.paths.output_dir.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_rename(
    src_dir: Option<PathBuf>,
    dest_dir: Option<PathBuf>,
    dry_run: bool,
    config: PipelineConfig,
) {
    use crate::processors::rename;

    let start = Instant::now();
    let src_dir = src_dir.unwrap_or(config.paths.raw_dir);
    let dest_dir = dest_dir.unwrap_or(config.paths.renamed_dir);

    if dry_run {
        println!("DRY RUN: No files will be copied");
    }

    let outcome = match rename::copy_with_extension(
        &src_dir,
        &dest_dir,
        &config.split.sidecar_extension,
        dry_run,
    ) {
        Ok(outcome) => outcome,
        Err(e) => fail(None, "Rename", &e),
    };

    print_summary(
        "Rename Complete",
        &[
            ("Source directory", src_dir.display().to_string()),
            ("Destination", dest_dir.display().to_string()),
            ("Files copied", outcome.copied.len().to_string()),
            ("Files failed", outcome.failed.len().to_string()),
            ("Dry run", dry_run.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_run(config: PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();

    println!("=== Radiation Track Pipeline ===");

    let spinner = create_spinner("Aggregating, scrubbing and splitting...");

    let report = match pipeline::run_pipeline(&config) {
        Ok(report) => report,
        Err(e) => fail(Some(&spinner), "Pipeline", &format!("{:#}", e)),
    };

    spinner.finish_and_clear();

    print_summary(
        "Pipeline Complete",
        &[
            ("Files processed", report.files_accepted.to_string()),
            ("Files skipped", report.files_skipped.to_string()),
            ("Rows skipped", report.rows_skipped.to_string()),
            ("Master records", report.master_records.to_string()),
            ("Excluded records", report.excluded_records.to_string()),
            ("Split records", report.split.input_records.to_string()),
            ("Chunks written", report.split.chunks.len().to_string()),
            ("Output directory", config.paths.output_dir.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
