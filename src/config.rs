//! Settings file parsing and session tuning.
//!
//! The tool is driven by a single TOML settings file describing the fleet:
//! one `[[node]]` table per backup target plus global `[backup]`, `[offsite]`,
//! `[delay]` and `[support_contact]` sections. Human-readable size and
//! duration strings (`"100MB"`, `"2s"`) are parsed here, once, at load time;
//! the rest of the crate only ever sees typed values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::BackupError;
use crate::expect::ExpectPattern;

/// Budget for establishing the SSH connection and seeing the password prompt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// Budget for the device prompt and every scripted expect thereafter.
///
/// Larger than the connect budget because configuration dumps on loaded
/// devices can take minutes to start flowing.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(240);

/// One backup target, as declared by a `[[node]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Name of the host, also the stem of its artifact filename.
    pub hostname: String,
    /// Management address the session connects to.
    pub ip: String,
    /// Equipment type tag, resolved to a dialect at session time.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Prompt pattern of the device OS, treated as a regular expression.
    pub prompt: String,
    /// Account username on the node.
    pub username: String,
    /// Account password on the node.
    pub password: String,
}

impl NodeConfig {
    /// The `user@ip` form used in log lines and failure reports.
    pub fn host(&self) -> String {
        format!("{}@{}", self.username, self.ip)
    }

    /// Compiles the configured prompt into an expect pattern.
    pub fn prompt_pattern(&self) -> Result<ExpectPattern, BackupError> {
        ExpectPattern::regex(&self.prompt).map_err(|err| {
            BackupError::InvalidConfig(format!(
                "node {} has an invalid prompt pattern '{}': {}",
                self.hostname, self.prompt, err
            ))
        })
    }
}

/// Local backup storage settings.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Root directory under which run folders are created.
    pub path: PathBuf,
    /// Read-buffer capacity for a single session, in bytes.
    pub buffer_size: u64,
    /// Minimum artifact size accepted by validation, in bytes.
    pub min_backup_size: u64,
}

/// Offsite storage server settings; the run folder is copied there via scp.
#[derive(Debug, Clone)]
pub struct OffsiteConfig {
    pub ip: String,
    pub username: String,
    /// Remote directory that receives the run folder.
    pub dir: String,
    /// Private key used for the copy.
    pub key_path: PathBuf,
}

impl OffsiteConfig {
    /// The `user@ip` scp target.
    pub fn host(&self) -> String {
        format!("{}@{}", self.username, self.ip)
    }
}

/// Settle-delay settings for slow devices.
#[derive(Debug, Clone)]
pub struct DelayConfig {
    /// Fixed sleep inserted after issuing a capture command, before the
    /// termination pattern is awaited. A blind wait, not a timeout.
    pub max_delay: Duration,
}

/// Where failure and success reports are mailed.
#[derive(Debug, Clone, Deserialize)]
pub struct SupportContact {
    pub email_to: String,
    pub email_url: String,
}

/// Fully parsed and validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub support: SupportContact,
    pub backup: BackupConfig,
    pub offsite: OffsiteConfig,
    pub delay: DelayConfig,
    pub nodes: Vec<NodeConfig>,
}

#[derive(Deserialize)]
struct RawBackup {
    path: String,
    buffer_size: String,
    min_backup_size: String,
}

#[derive(Deserialize)]
struct RawOffsite {
    ip: String,
    username: String,
    dir: String,
    key_path: String,
}

#[derive(Deserialize)]
struct RawDelay {
    max_delay: String,
}

#[derive(Deserialize)]
struct RawSettings {
    support_contact: SupportContact,
    backup: RawBackup,
    offsite: RawOffsite,
    delay: RawDelay,
    #[serde(default)]
    node: Vec<NodeConfig>,
}

impl Settings {
    /// Reads and validates the settings file.
    pub fn load(path: &Path) -> Result<Settings, BackupError> {
        let text = fs::read_to_string(path).map_err(|err| {
            BackupError::InvalidConfig(format!(
                "settings file {} is not accessible: {}",
                path.display(),
                err
            ))
        })?;
        info!("Reading settings file '{}'", path.display());
        Self::from_toml(&text)
    }

    /// Parses settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Settings, BackupError> {
        let raw: RawSettings = toml::from_str(text)
            .map_err(|err| BackupError::InvalidConfig(format!("settings parse error: {err}")))?;

        if raw.node.is_empty() {
            return Err(BackupError::InvalidConfig(
                "no nodes configured".to_string(),
            ));
        }

        let settings = Settings {
            support: raw.support_contact,
            backup: BackupConfig {
                path: PathBuf::from(raw.backup.path),
                buffer_size: to_bytes(&raw.backup.buffer_size)?,
                min_backup_size: to_bytes(&raw.backup.min_backup_size)?,
            },
            offsite: OffsiteConfig {
                ip: raw.offsite.ip,
                username: raw.offsite.username,
                dir: raw.offsite.dir,
                key_path: PathBuf::from(raw.offsite.key_path),
            },
            delay: DelayConfig {
                max_delay: to_seconds(&raw.delay.max_delay)?,
            },
            nodes: raw.node,
        };

        // Reject bad prompt patterns up front rather than mid-session.
        for node in &settings.nodes {
            node.prompt_pattern()?;
        }

        info!("The following nodes were defined: {:?}",
            settings.nodes.iter().map(|n| n.hostname.as_str()).collect::<Vec<_>>());

        Ok(settings)
    }

    /// Builds the session tuning shared by every node in this run.
    pub fn tuning(&self) -> SessionTuning {
        SessionTuning {
            connect_timeout: CONNECT_TIMEOUT,
            auth_timeout: CONNECT_TIMEOUT,
            prompt_timeout: PROMPT_TIMEOUT,
            settle_delay: self.delay.max_delay,
            buffer_size: self.backup.buffer_size,
        }
    }
}

/// Timeouts and capacities threaded through a backup session.
///
/// One immutable struct instead of scattered module constants, so tests and
/// callers can tighten or relax the budgets explicitly.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub prompt_timeout: Duration,
    pub settle_delay: Duration,
    pub buffer_size: u64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            auth_timeout: CONNECT_TIMEOUT,
            prompt_timeout: PROMPT_TIMEOUT,
            settle_delay: Duration::from_secs(2),
            buffer_size: 100_000_000,
        }
    }
}

/// Parses a duration string of the form `2s`, `5m` or `3h`.
///
/// The unit is mandatory; an unknown unit or a malformed number is an error,
/// never a silent default.
pub fn to_seconds(duration: &str) -> Result<Duration, BackupError> {
    let trimmed = duration.trim();
    let (value, scale) = if let Some(v) = trimmed.strip_suffix('s') {
        (v, 1.0)
    } else if let Some(v) = trimmed.strip_suffix('m') {
        (v, 60.0)
    } else if let Some(v) = trimmed.strip_suffix('h') {
        (v, 3600.0)
    } else {
        return Err(BackupError::InvalidConfig(format!(
            "invalid time unit in '{duration}' (must be 's', 'm' or 'h')"
        )));
    };
    let value: f64 = value.parse().map_err(|_| {
        BackupError::InvalidConfig(format!(
            "wrong duration format '{duration}' (must be number + time unit, e.g. 3s or 4m)"
        ))
    })?;
    Duration::try_from_secs_f64(value * scale).map_err(|_| {
        BackupError::InvalidConfig(format!(
            "duration '{duration}' is out of range (must be a finite, non-negative time)"
        ))
    })
}

/// Parses a size string of the form `5B`, `2KB`, `100MB` or `1GB`.
pub fn to_bytes(size: &str) -> Result<u64, BackupError> {
    let trimmed = size.trim();
    let (value, scale) = if let Some(v) = trimmed.strip_suffix("KB") {
        (v, 1_000u64)
    } else if let Some(v) = trimmed.strip_suffix("MB") {
        (v, 1_000_000)
    } else if let Some(v) = trimmed.strip_suffix("GB") {
        (v, 1_000_000_000)
    } else if let Some(v) = trimmed.strip_suffix('B') {
        (v, 1)
    } else {
        return Err(BackupError::InvalidConfig(format!(
            "invalid size unit in '{size}' (must be 'B', 'KB', 'MB' or 'GB')"
        )));
    };
    let value: f64 = value.parse().map_err(|_| {
        BackupError::InvalidConfig(format!(
            "wrong size format '{size}' (must be number + size unit, e.g. 1B or 2KB)"
        ))
    })?;
    Ok((value * scale as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [support_contact]
        email_to = "fo-support@example.com"
        email_url = "https://172.31.2.5/v1/emailservice/send"

        [backup]
        path = "/var/backups/network"
        buffer_size = "100MB"
        min_backup_size = "5B"

        [offsite]
        ip = "10.0.2.4"
        username = "backup"
        dir = "/home/backup/backups"
        key_path = "/home/backup/.ssh/id_rsa"

        [delay]
        max_delay = "2s"

        [[node]]
        hostname = "Connectivity_Switch_Test"
        ip = "10.0.2.1"
        type = "connectivitySwitch"
        prompt = "EXOS-VM"
        username = "admin"
        password = "qwerty123"
    "#;

    #[test]
    fn to_seconds_parses_each_unit() {
        assert_eq!(to_seconds("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(to_seconds("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(to_seconds("3h").unwrap(), Duration::from_secs(10_800));
        assert_eq!(to_seconds("1.5m").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn to_seconds_keeps_fractional_seconds() {
        assert_eq!(to_seconds("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(to_seconds("0.25m").unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn to_seconds_rejects_unknown_unit() {
        let err = to_seconds("5x").expect_err("unit 'x' should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn to_seconds_rejects_multibyte_unit() {
        let err = to_seconds("5µ").expect_err("unit 'µ' should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn to_seconds_rejects_negative_duration() {
        let err = to_seconds("-1s").expect_err("negative duration should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn to_seconds_rejects_missing_number() {
        let err = to_seconds("s").expect_err("bare unit should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn to_bytes_parses_each_unit() {
        assert_eq!(to_bytes("5B").unwrap(), 5);
        assert_eq!(to_bytes("2KB").unwrap(), 2_000);
        assert_eq!(to_bytes("100MB").unwrap(), 100_000_000);
        assert_eq!(to_bytes("1GB").unwrap(), 1_000_000_000);
    }

    #[test]
    fn to_bytes_rejects_unknown_unit() {
        let err = to_bytes("7TB").expect_err("unit 'TB' should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn settings_parse_sample_file() {
        let settings = Settings::from_toml(SAMPLE).expect("sample should parse");

        assert_eq!(settings.nodes.len(), 1);
        assert_eq!(settings.nodes[0].node_type, "connectivitySwitch");
        assert_eq!(settings.nodes[0].host(), "admin@10.0.2.1");
        assert_eq!(settings.backup.buffer_size, 100_000_000);
        assert_eq!(settings.backup.min_backup_size, 5);
        assert_eq!(settings.delay.max_delay, Duration::from_secs(2));
        assert_eq!(settings.offsite.host(), "backup@10.0.2.4");
    }

    #[test]
    fn settings_reject_empty_fleet() {
        let text = SAMPLE.split("[[node]]").next().unwrap();
        let err = Settings::from_toml(text).expect_err("empty fleet should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn settings_reject_invalid_prompt_regex() {
        let text = SAMPLE.replace(r#"prompt = "EXOS-VM""#, r#"prompt = "[""#);
        let err = Settings::from_toml(&text).expect_err("bad prompt regex should fail");
        assert!(matches!(err, BackupError::InvalidConfig(_)));
    }

    #[test]
    fn tuning_uses_configured_delay_and_buffer() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        let tuning = settings.tuning();

        assert_eq!(tuning.settle_delay, Duration::from_secs(2));
        assert_eq!(tuning.buffer_size, 100_000_000);
        assert_eq!(tuning.connect_timeout, CONNECT_TIMEOUT);
        assert_eq!(tuning.prompt_timeout, PROMPT_TIMEOUT);
    }
}
