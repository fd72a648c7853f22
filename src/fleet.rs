//! Fleet driver: runs the backup for every configured node.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::backup::{NodeBackupHandler, NodeOutcome};
use crate::config::Settings;
use crate::error::BackupError;

const RUN_FOLDER_TEMPLATE: &str = "network_device_backup_";
const DATE_FORMAT: &str = "%Y%m%d";

/// Aggregated result of one fleet run.
#[derive(Debug)]
pub struct RunReport {
    /// Folder every artifact of this run was written to.
    pub run_folder: PathBuf,
    pub outcomes: Vec<NodeOutcome>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(NodeOutcome::succeeded)
    }

    /// Outcomes for nodes whose backup did not complete.
    pub fn failures(&self) -> Vec<&NodeOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded()).collect()
    }
}

/// Creates (or reuses) today's run folder under the backup path.
///
/// The name carries the calendar day, so a rerun on the same day lands in the
/// same folder and overwrites its artifacts.
pub fn create_run_folder(backup_path: &Path) -> Result<PathBuf, BackupError> {
    let stamp = Local::now().format(DATE_FORMAT);
    let folder = backup_path.join(format!("{RUN_FOLDER_TEMPLATE}{stamp}"));
    fs::create_dir_all(&folder)?;
    Ok(folder)
}

/// Backs up every node in the settings, sequentially, one artifact each.
///
/// A node failure is recorded in the report and the run moves on to the next
/// node; only a failure to create the run folder aborts the whole run.
pub async fn run_fleet(settings: &Settings) -> Result<RunReport, BackupError> {
    let run_folder = create_run_folder(&settings.backup.path)?;
    let tuning = settings.tuning();

    let mut outcomes = Vec::with_capacity(settings.nodes.len());
    for node in &settings.nodes {
        info!("Backing up {} ({})", node.hostname, node.ip);
        let mut handler = NodeBackupHandler::new(node, &tuning);
        outcomes.push(handler.create_node_backup(&run_folder).await);
    }

    Ok(RunReport {
        run_folder,
        outcomes,
    })
}
