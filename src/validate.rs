//! Post-run artifact validation.
//!
//! Two checks run after the fleet completes: every configured node must have
//! produced an artifact, and no artifact may be suspiciously small. A dump
//! below the size floor usually means the device emitted an error banner
//! instead of its configuration.

use std::fs;
use std::path::Path;

use log::{error, info};

use crate::error::BackupError;

/// Checks that the run folder holds exactly one artifact per node.
pub fn validate_backup_count(run_folder: &Path, node_count: usize) -> Result<(), BackupError> {
    let mut found = 0usize;
    for entry in fs::read_dir(run_folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            found += 1;
        }
    }

    if found != node_count {
        error!(
            "Expected {} backup files in {}, found {}",
            node_count,
            run_folder.display(),
            found
        );
        return Err(BackupError::InvalidConfig(format!(
            "backup count mismatch: expected {node_count}, found {found}"
        )));
    }

    info!("All {} backup files are present", node_count);
    Ok(())
}

/// Checks that every artifact in the run folder exceeds the size floor.
pub fn validate_backup_sizes(run_folder: &Path, min_size: u64) -> Result<(), BackupError> {
    for entry in fs::read_dir(run_folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let size = entry.metadata()?.len();
        if size <= min_size {
            error!(
                "Backup file {} is too small: {} bytes",
                entry.path().display(),
                size
            );
            return Err(BackupError::InvalidConfig(format!(
                "backup file {} is {} bytes, floor is {} bytes",
                entry.path().display(),
                size,
                min_size
            )));
        }
    }

    info!("All backup files exceed the {} byte floor", min_size);
    Ok(())
}

/// Runs both validation passes over a finished run folder.
pub fn validate_run(
    run_folder: &Path,
    node_count: usize,
    min_size: u64,
) -> Result<(), BackupError> {
    validate_backup_count(run_folder, node_count)?;
    validate_backup_sizes(run_folder, min_size)
}
