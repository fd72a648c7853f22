//! Per-node backup session orchestration.
//!
//! One [`NodeBackupHandler`] drives one node through its whole session:
//! connect, authenticate, walk the dialect script, capture the configuration
//! and flush it to the artifact file. The session handle is released on every
//! exit path, including pattern-match failure and unsupported equipment, and
//! exactly one artifact file is written per invocation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{error, info};

use crate::config::{NodeConfig, SessionTuning};
use crate::dialect::{Dialect, StepAction};
use crate::error::{BackupError, FailureKind};
use crate::expect::{ExpectPattern, Matcher};
use crate::transport::SessionHandle;

const SEPARATOR: &str =
    "-----------------------------------------------------------------------------------\n";
const DATE_FORMAT: &str = "%Y%m%d";
const SSH_PORT: u16 = 22;

/// Fallback artifact body for nodes whose type has no dialect.
pub const UNSUPPORTED_NOTE: &str = "Equipment not supported!";

/// Lifecycle of one backup session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Connecting,
    Authenticating,
    AwaitingPrompt,
    Executing,
    Capturing,
    Closed(CloseReason),
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Success,
    Failed(FailureKind),
}

/// Result of one node's backup attempt, as aggregated by the fleet driver.
#[derive(Debug)]
pub struct NodeOutcome {
    pub hostname: String,
    /// Where the artifact was written (or attempted).
    pub artifact: PathBuf,
    /// Terminal session state.
    pub state: SessionState,
    /// Human-readable failure cause, when one exists.
    pub error: Option<String>,
}

impl NodeOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == SessionState::Closed(CloseReason::Success)
    }
}

/// Creates the backup artifact for a single node.
pub struct NodeBackupHandler<'a> {
    node: &'a NodeConfig,
    tuning: &'a SessionTuning,
    state: SessionState,
}

impl<'a> NodeBackupHandler<'a> {
    pub fn new(node: &'a NodeConfig, tuning: &'a SessionTuning) -> Self {
        Self {
            node,
            tuning,
            state: SessionState::Created,
        }
    }

    /// Current position in the session lifecycle.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Artifact path for this node under the given run folder.
    ///
    /// Deterministic for a given calendar day: re-running the backup reuses
    /// the same filename and overwrites, no random suffix.
    pub fn artifact_path(&self, run_folder: &Path) -> PathBuf {
        let stamp = Local::now().format(DATE_FORMAT);
        run_folder.join(format!(
            "{}-backup-{}",
            self.node.hostname.to_lowercase(),
            stamp
        ))
    }

    /// Opens a session to the node, creates its backup, and writes the
    /// artifact. Failures are folded into the returned outcome, never raised.
    pub async fn create_node_backup(&mut self, run_folder: &Path) -> NodeOutcome {
        self.state = SessionState::Connecting;
        match SessionHandle::open(
            &self.node.ip,
            SSH_PORT,
            &self.node.username,
            &self.node.password,
            self.tuning,
        )
        .await
        {
            Ok(handle) => self.create_node_backup_with(handle, run_folder).await,
            Err(err) => self.finish(Err(err), run_folder),
        }
    }

    /// Same as [`create_node_backup`](Self::create_node_backup) but over a
    /// pre-opened handle, e.g. an in-memory session.
    ///
    /// The handle is closed before this returns, on every exit path.
    pub async fn create_node_backup_with(
        &mut self,
        mut handle: SessionHandle,
        run_folder: &Path,
    ) -> NodeOutcome {
        let result = self.drive(&mut handle).await;
        handle.close().await;
        info!("Closed the connection for {}", self.node.hostname);
        self.finish(result, run_folder)
    }

    /// Walks the session protocol: authenticate, then run the dialect script.
    ///
    /// Returns the captured configuration text on success. Does not close the
    /// handle; the caller owns its release.
    async fn drive(&mut self, handle: &mut SessionHandle) -> Result<String, BackupError> {
        let mut matcher = Matcher::new(self.tuning.buffer_size);

        self.state = SessionState::Authenticating;
        let password_prompt = [ExpectPattern::literal("assword:")];
        matcher
            .expect(handle, &password_prompt, self.tuning.auth_timeout)
            .await
            .map_err(|err| match err {
                BackupError::ExpectTimeout { .. } => {
                    BackupError::AuthTimeout(self.node.hostname.clone())
                }
                other => other,
            })?;
        handle.send_line(&self.node.password).await?;
        info!("Connected to {}", self.node.hostname);

        let dialect = Dialect::lookup(&self.node.node_type)?;
        let script = dialect.script(self.node.prompt_pattern()?, self.tuning);

        self.state = SessionState::AwaitingPrompt;
        let mut capture = String::new();
        for step in script.steps {
            if matches!(step.action, StepAction::Capture) {
                self.state = SessionState::Capturing;
            }
            let found = matcher
                .expect(handle, std::slice::from_ref(&step.wait_for), step.timeout)
                .await?;

            match step.action {
                StepAction::SendLine(command) => {
                    self.state = SessionState::Executing;
                    handle.send_line(command).await?;
                    if step.settle_after {
                        // Blind settle delay: lets slow devices finish
                        // buffering the dump before capture begins.
                        tokio::time::sleep(self.tuning.settle_delay).await;
                    }
                }
                StepAction::Capture => {
                    capture = found.before;
                }
            }
        }

        Ok(capture)
    }

    /// Turns the session result into an outcome and writes the artifact.
    fn finish(&mut self, result: Result<String, BackupError>, run_folder: &Path) -> NodeOutcome {
        let artifact = self.artifact_path(run_folder);
        let mut messages = vec![
            SEPARATOR.to_string(),
            format!(
                "Equipment type: {} -> {} with IP: {}\n",
                self.node.node_type, self.node.hostname, self.node.ip
            ),
            SEPARATOR.to_string(),
        ];

        let (reason, error) = match result {
            Ok(capture) => {
                messages.push(capture);
                info!("Created backup file for {}", self.node.hostname);
                (CloseReason::Success, None)
            }
            Err(err) => {
                match &err {
                    BackupError::UnsupportedEquipment(_) => {
                        messages.push(UNSUPPORTED_NOTE.to_string());
                    }
                    // Partial capture up to the deadline is kept, not
                    // discarded.
                    BackupError::ExpectTimeout { pending, .. } => {
                        messages.push(pending.clone());
                    }
                    other => {
                        messages.push(format!("{other}\n"));
                    }
                }
                error!("Backup of {} failed: {}", self.node.hostname, err);
                (CloseReason::Failed(err.failure_kind()), Some(err.to_string()))
            }
        };

        if let Err(write_err) = fs::write(&artifact, messages.concat()) {
            error!(
                "Backup file {} was not created due to {}",
                artifact.display(),
                write_err
            );
        }

        self.state = SessionState::Closed(reason);
        NodeOutcome {
            hostname: self.node.hostname.clone(),
            artifact,
            state: self.state.clone(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(node_type: &str) -> NodeConfig {
        NodeConfig {
            hostname: "Edge_FW_01".to_string(),
            ip: "10.0.2.7".to_string(),
            node_type: node_type.to_string(),
            prompt: "fw01>".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn artifact_path_is_lowercase_and_dated() {
        let node = test_node("srx");
        let tuning = SessionTuning::default();
        let handler = NodeBackupHandler::new(&node, &tuning);

        let path = handler.artifact_path(Path::new("/tmp/run"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let stamp = Local::now().format(DATE_FORMAT).to_string();

        assert_eq!(name, format!("edge_fw_01-backup-{stamp}"));
    }

    #[test]
    fn artifact_path_is_deterministic_within_a_day() {
        let node = test_node("srx");
        let tuning = SessionTuning::default();
        let handler = NodeBackupHandler::new(&node, &tuning);

        assert_eq!(
            handler.artifact_path(Path::new("/tmp/run")),
            handler.artifact_path(Path::new("/tmp/run"))
        );
    }

    #[test]
    fn new_handler_starts_in_created_state() {
        let node = test_node("connectivitySwitch");
        let tuning = SessionTuning::default();
        let handler = NodeBackupHandler::new(&node, &tuning);

        assert_eq!(*handler.state(), SessionState::Created);
    }
}
