//! Error types for backup sessions and fleet processing.
//!
//! All session errors are node-scoped: the fleet driver records them against
//! the failing node and moves on to the next one. None of them aborts a run.

use thiserror::Error;

/// Errors that can occur while creating and shipping node backups.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Connection establishment did not finish within its budget.
    #[error("connection timed out, cannot connect to node {0}")]
    ConnectionTimeout(String),

    /// The remote host actively refused the connection.
    #[error("connection refused by node {0}")]
    ConnectionRefused(String),

    /// The password prompt never appeared or the device stalled after login.
    ///
    /// Usually means wrong credentials or an unreachable authentication
    /// subsystem on the device.
    #[error("authentication timed out on node {0}, check username and password")]
    AuthTimeout(String),

    /// A required pattern never appeared within its timeout.
    ///
    /// Carries the partial output read before the deadline so the
    /// orchestrator can flush it to the artifact instead of discarding it.
    #[error("expect timed out waiting for {pattern}")]
    ExpectTimeout {
        /// The pattern that never showed up.
        pattern: String,
        /// Everything read from the device up to the deadline.
        pending: String,
    },

    /// The node's declared type has no dialect in the command table.
    #[error("equipment type {0} is not supported")]
    UnsupportedEquipment(String),

    /// The session transport is no longer live.
    ///
    /// Returned when sending to or reading from a handle whose remote side
    /// has already gone away.
    #[error("session closed")]
    SessionClosed,

    /// The accumulated device output exceeded the configured read buffer.
    #[error("capture exceeded the configured buffer size of {0} bytes")]
    CaptureOverflow(u64),

    /// A configuration value could not be parsed or is missing.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The offsite copy command failed.
    #[error("offsite transfer failed: {0}")]
    TransferFailed(String),

    /// The notification service rejected or never received the report.
    #[error("failed to send notification e-mail to {recipient}: {cause}")]
    NotificationFailed { recipient: String, cause: String },

    /// An error occurred in the async-ssh2-tokio library.
    #[error("ssh error: {0}")]
    Ssh(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),

    /// Local filesystem failure while writing artifacts or run folders.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Classifies the error into the reason tag used in per-node outcomes.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::ConnectionTimeout(_) => FailureKind::ConnectionTimeout,
            Self::ConnectionRefused(_) => FailureKind::ConnectionRefused,
            Self::AuthTimeout(_) => FailureKind::AuthTimeout,
            Self::ExpectTimeout { .. } => FailureKind::ExpectTimeout,
            Self::UnsupportedEquipment(_) => FailureKind::UnsupportedEquipment,
            _ => FailureKind::Session,
        }
    }
}

/// Node-scoped failure reasons, as aggregated in the fleet report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionTimeout,
    ConnectionRefused,
    AuthTimeout,
    ExpectTimeout,
    UnsupportedEquipment,
    /// Any other transport or I/O failure during the session.
    Session,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ConnectionTimeout => "connection timeout",
            Self::ConnectionRefused => "connection refused",
            Self::AuthTimeout => "authentication timeout",
            Self::ExpectTimeout => "expect timeout",
            Self::UnsupportedEquipment => "unsupported equipment",
            Self::Session => "session failure",
        };
        f.write_str(name)
    }
}
