//! Offsite transfer of a finished run folder over scp.

use std::path::Path;

use log::{error, info};
use tokio::process::Command;

use crate::config::OffsiteConfig;
use crate::error::BackupError;

/// Copies the run folder to the offsite host with key-based scp.
///
/// The whole folder is transferred recursively, so the offsite side ends up
/// with the same per-day layout as the local backup path.
pub async fn transfer_run_folder(
    run_folder: &Path,
    offsite: &OffsiteConfig,
) -> Result<(), BackupError> {
    let destination = format!("{}:{}", offsite.host(), offsite.dir);
    info!(
        "Transferring {} to {}",
        run_folder.display(),
        destination
    );

    let status = Command::new("scp")
        .arg("-r")
        .arg("-i")
        .arg(&offsite.key_path)
        .arg(run_folder)
        .arg(&destination)
        .status()
        .await
        .map_err(|err| BackupError::TransferFailed(format!("failed to spawn scp: {err}")))?;

    if !status.success() {
        error!("scp exited with {status}");
        return Err(BackupError::TransferFailed(format!(
            "scp to {destination} exited with {status}"
        )));
    }

    info!("Offsite transfer completed");
    Ok(())
}
