//! Email notification over an internal HTTP email service.
//!
//! Reports the outcome of a run to the support contact. The service speaks a
//! SendGrid-style JSON payload and usually sits behind a self-signed
//! certificate, so verification is disabled on the client.

use std::time::Duration;

use log::{error, info};
use reqwest::Client;
use serde_json::json;

use crate::config::SupportContact;
use crate::error::BackupError;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const SENDER_DOMAIN: &str = "backup.local";

/// Formats and sends run notifications to the support contact.
pub struct NotificationHandler {
    email_to: String,
    email_url: String,
    client: Client,
}

impl NotificationHandler {
    pub fn new(support: &SupportContact) -> Result<Self, BackupError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|err| BackupError::NotificationFailed {
                recipient: support.email_to.clone(),
                cause: err.to_string(),
            })?;

        Ok(Self {
            email_to: support.email_to.clone(),
            email_url: support.email_url.clone(),
            client,
        })
    }

    /// Reports a completed run, one line per backed-up node.
    pub async fn send_success_email(
        &self,
        sender: &str,
        subject: &str,
        success_lines: &[String],
    ) -> Result<(), BackupError> {
        let body = prepare_email_body(
            "The following operations were successfully finished:<br>",
            success_lines,
            None,
        );
        self.send_mail(sender, subject, &body).await
    }

    /// Reports a failed run, one line per failure, plus the exit code the
    /// process is about to stop with.
    pub async fn send_error_email(
        &self,
        sender: &str,
        subject: &str,
        error_lines: &[String],
        error_code: i32,
    ) -> Result<(), BackupError> {
        error!("{subject} Cause:");
        for line in error_lines {
            error!("{line}");
        }
        let body = prepare_email_body(
            "The following errors happened during this operation:<br>",
            error_lines,
            Some(error_code),
        );
        self.send_mail(sender, subject, &body).await
    }

    async fn send_mail(&self, sender: &str, subject: &str, body: &str) -> Result<(), BackupError> {
        let from_sender = format!("{}@{}", sender.trim().to_lowercase(), SENDER_DOMAIN);
        info!(
            "Sending e-mail from {} to {} with subject '{}'",
            from_sender, self.email_to, subject
        );

        let payload = json!({
            "personalizations": [{"to": [{"email": self.email_to}], "subject": subject}],
            "from": {"email": from_sender},
            "content": [{"type": "text/html", "value": body}],
        });

        let response = self
            .client
            .post(&self.email_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| BackupError::NotificationFailed {
                recipient: self.email_to.clone(),
                cause: err.to_string(),
            })?;

        response
            .error_for_status()
            .map_err(|err| BackupError::NotificationFailed {
                recipient: self.email_to.clone(),
                cause: err.to_string(),
            })?;

        info!("E-mail sent successfully to '{}'", self.email_to);
        Ok(())
    }
}

/// Builds the HTML body: an intro line, one line per message, an optional
/// exit code, and the tool version.
fn prepare_email_body(intro: &str, lines: &[String], error_code: Option<i32>) -> String {
    let mut body = String::new();
    if !lines.is_empty() {
        body.push_str(intro);
    }
    for line in lines {
        if !line.is_empty() {
            body.push_str(line);
            body.push_str("<br>");
        }
    }
    if let Some(code) = error_code {
        body.push_str(&format!("System stopped with error code: {code}."));
    }
    body.push_str("<br><br>");
    body.push_str(&format!(
        "netbkp version: {}",
        env!("CARGO_PKG_VERSION")
    ));
    body
}
