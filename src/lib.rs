//! # netbkp - Network Device Configuration Backup
//!
//! `netbkp` backs up the running configuration of a fleet of network devices
//! over interactive SSH sessions. Devices that only expose a human-oriented
//! CLI are driven the way an operator would drive them: wait for the password
//! prompt, authenticate, disable pagination where the platform needs it, issue
//! the configuration dump command, and capture output until the device's
//! terminal token appears.
//!
//! ## Features
//!
//! - **Expect-style matching**: Streamed output is matched against literal and
//!   regex patterns; the first pattern to appear in the stream wins.
//! - **Per-platform dialects**: Each supported equipment type carries its own
//!   command sequence and capture terminator.
//! - **One artifact per node**: Every session writes exactly one dated backup
//!   file, including on failure, so a run is always auditable.
//! - **Offsite copy and notification**: Finished runs are validated, shipped
//!   offsite over scp, and reported by email.
//! - **Async/Await**: Built on Tokio, with a wide SSH algorithm set for
//!   compatibility with legacy devices.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use netbkp::config::Settings;
//! use netbkp::fleet;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(Path::new("config.toml"))?;
//!     let report = fleet::run_fleet(&settings).await?;
//!     for outcome in &report.outcomes {
//!         println!("{}: {:?}", outcome.hostname, outcome.state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expect;
pub mod fleet;
pub mod notify;
pub mod ssh;
pub mod transfer;
pub mod transport;
pub mod validate;
