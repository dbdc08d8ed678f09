//! Copy raw exports under the device-native sidecar extension.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::processors::aggregate::SkippedFile;

/// Errors that can occur while renaming exports.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for rename operations.
pub type Result<T> = std::result::Result<T, RenameError>;

/// Files handled by a rename pass.
#[derive(Debug, Clone, Default)]
pub struct RenameOutcome {
    /// Destination paths of copied (or would-be-copied) files
    pub copied: Vec<PathBuf>,
    /// Sources that could not be copied
    pub failed: Vec<SkippedFile>,
}

/// Copy every file in `src_dir` to `dest_dir`, swapping its extension for
/// `extension`.
///
/// Source files are left in place. A file that fails to copy is logged,
/// recorded in `failed` and does not stop the pass.
///
/// # Arguments
///
/// * `src_dir` - Directory holding the raw exports
/// * `dest_dir` - Destination, created unless `dry_run`
/// * `extension` - New extension without the dot, e.g. `rctrk`
/// * `dry_run` - If true, only report what would be copied
///
pub fn copy_with_extension(
    src_dir: &Path,
    dest_dir: &Path,
    extension: &str,
    dry_run: bool,
) -> Result<RenameOutcome> {
    if !src_dir.is_dir() {
        return Err(RenameError::DirectoryNotFound(src_dir.to_path_buf()));
    }

    if !dry_run {
        fs::create_dir_all(dest_dir).map_err(|source| RenameError::CreateDirectory {
            path: dest_dir.to_path_buf(),
            source,
        })?;
    }

    let mut files: Vec<PathBuf> = fs::read_dir(src_dir)
        .map_err(|source| RenameError::ReadDir {
            path: src_dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    files.sort();

    let mut outcome = RenameOutcome::default();

    for src in files {
        let stem = match src.file_stem() {
            Some(stem) => stem,
            None => continue,
        };
        // Only the last extension is replaced: `a.v1.txt` -> `a.v1.rctrk`
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(extension);
        let dest = dest_dir.join(name);

        if dry_run {
            info!("Would copy {} -> {}", src.display(), dest.display());
            outcome.copied.push(dest);
            continue;
        }

        match fs::copy(&src, &dest) {
            Ok(_) => {
                info!("Copied {} -> {}", src.display(), dest.display());
                outcome.copied.push(dest);
            }
            Err(e) => {
                warn!("Failed to copy {}: {}", src.display(), e);
                outcome.failed.push(SkippedFile {
                    path: src,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}
