//! Report delivery
//!
//! The finished report is handed to a [`DeliveryTool`] exactly once per run.
//! A failed delivery is reported to the user but never loses the report.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::DeliveryError;

const DEFAULT_SUBJECT: &str = "Research Report";

/// Sends a finished markdown report somewhere.
///
/// Returns a short receipt (a path, a status) that is shown to the user.
#[async_trait]
pub trait DeliveryTool: Send + Sync {
    async fn deliver(&self, body: &str) -> Result<String, DeliveryError>;
}

/// First markdown heading of the report, or a generic subject.
pub fn report_subject(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string())
}

// =============================================================================
// FILE DELIVERY
// =============================================================================

/// Writes each report to a timestamped markdown file.
#[derive(Debug, Clone)]
pub struct FileDelivery {
    dir: PathBuf,
}

impl FileDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name() -> String {
        format!(
            "research-report-{}.md",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        )
    }
}

#[async_trait]
impl DeliveryTool for FileDelivery {
    async fn deliver(&self, body: &str) -> Result<String, DeliveryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name());
        tokio::fs::write(&path, body).await?;

        info!(path = %path.display(), bytes = body.len(), "Report saved");
        Ok(path.display().to_string())
    }
}

// =============================================================================
// WEBHOOK DELIVERY
// =============================================================================

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: String,
    markdown: &'a str,
}

/// POSTs each report as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    url: String,
    client: Client,
    timeout: Duration,
}

impl WebhookDelivery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DeliveryTool for WebhookDelivery {
    async fn deliver(&self, body: &str) -> Result<String, DeliveryError> {
        let payload = WebhookPayload {
            subject: report_subject(body),
            markdown: body,
        };

        debug!(url = %self.url, subject = %payload.subject, "Posting report");

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(status.as_u16(), text));
        }

        info!(url = %self.url, status = status.as_u16(), "Report posted");
        Ok(format!("posted to {} ({})", self.url, status.as_u16()))
    }
}
