//! Command line entry point for the fleet backup run.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use netbkp::config::Settings;
use netbkp::error::BackupError;
use netbkp::fleet::{self, RunReport};
use netbkp::notify::NotificationHandler;
use netbkp::transfer;
use netbkp::validate;

const EXIT_INVALID_SETTINGS: u8 = 2;
const EXIT_BACKUP_FAILED: u8 = 3;
const EXIT_VALIDATION_FAILED: u8 = 4;
const EXIT_TRANSFER_FAILED: u8 = 5;

const REPORT_SENDER: &str = "netbkp";

/// Backs up network device configurations over SSH and ships them offsite.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the settings file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Cannot load settings: {err}");
            return ExitCode::from(EXIT_INVALID_SETTINGS);
        }
    };

    let notifier = match NotificationHandler::new(&settings.support) {
        Ok(notifier) => notifier,
        Err(err) => {
            error!("Cannot set up notifications: {err}");
            return ExitCode::from(EXIT_INVALID_SETTINGS);
        }
    };

    match run(&settings, &notifier).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Runs the fleet backup end to end. Any failure sends an error email and
/// returns the exit code for that stage.
async fn run(settings: &Settings, notifier: &NotificationHandler) -> Result<(), u8> {
    let report = match fleet::run_fleet(settings).await {
        Ok(report) => report,
        Err(err) => {
            report_error(notifier, &[err.to_string()], EXIT_BACKUP_FAILED).await;
            return Err(EXIT_BACKUP_FAILED);
        }
    };

    if !report.all_succeeded() {
        let lines: Vec<String> = report
            .failures()
            .iter()
            .map(|outcome| {
                format!(
                    "{}: {}",
                    outcome.hostname,
                    outcome.error.as_deref().unwrap_or("backup failed")
                )
            })
            .collect();
        report_error(notifier, &lines, EXIT_BACKUP_FAILED).await;
        return Err(EXIT_BACKUP_FAILED);
    }

    if let Err(err) = validate_report(settings, &report) {
        report_error(notifier, &[err.to_string()], EXIT_VALIDATION_FAILED).await;
        return Err(EXIT_VALIDATION_FAILED);
    }

    if let Err(err) = transfer::transfer_run_folder(&report.run_folder, &settings.offsite).await {
        report_error(notifier, &[err.to_string()], EXIT_TRANSFER_FAILED).await;
        return Err(EXIT_TRANSFER_FAILED);
    }

    let lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| format!("{} backed up to {}", outcome.hostname, outcome.artifact.display()))
        .collect();
    if let Err(err) = notifier
        .send_success_email(REPORT_SENDER, "Onsite backup creation finished", &lines)
        .await
    {
        // The backups themselves are fine; a lost success email is logged
        // but does not fail the run.
        error!("Success notification was not delivered: {err}");
    }

    info!("Backup run completed successfully");
    Ok(())
}

fn validate_report(settings: &Settings, report: &RunReport) -> Result<(), BackupError> {
    validate::validate_run(
        &report.run_folder,
        settings.nodes.len(),
        settings.backup.min_backup_size,
    )
}

async fn report_error(notifier: &NotificationHandler, lines: &[String], code: u8) {
    if let Err(err) = notifier
        .send_error_email(
            REPORT_SENDER,
            "Error executing onsite backup creation",
            lines,
            i32::from(code),
        )
        .await
    {
        error!("Error notification was not delivered: {err}");
    }
}
