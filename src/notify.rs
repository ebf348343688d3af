//! Result notifications.
//!
//! After a run, the full result list is handed to a [`Notifier`] along
//! with the configured addresses. Delivery is fire-and-forget: a failed
//! delivery is logged and never fails the run.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use content_migrator_core::results::ConversionResult;

use crate::config::NotifyConfig;

/// Delivers a run's results to a list of addresses.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, results: &[ConversionResult], addresses: &[String]) -> Result<()>;
}

/// Writes a per-address summary to the log.
pub struct SummaryNotifier;

#[async_trait]
impl Notifier for SummaryNotifier {
    async fn notify(&self, results: &[ConversionResult], addresses: &[String]) -> Result<()> {
        let failed = results.iter().filter(|r| !r.success).count();
        for address in addresses {
            tracing::info!(
                to = %address,
                total = results.len(),
                succeeded = results.len() - failed,
                failed,
                "conversion summary"
            );
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    addresses: &'a [String],
    total: usize,
    succeeded: usize,
    failed: usize,
    results: &'a [ConversionResult],
}

/// POSTs the results as JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, results: &[ConversionResult], addresses: &[String]) -> Result<()> {
        let failed = results.iter().filter(|r| !r.success).count();
        let payload = WebhookPayload {
            addresses,
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
            results,
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook {} returned {}", self.url, status);
        }
        tracing::debug!(url = %self.url, "webhook notification delivered");
        Ok(())
    }
}

/// Notifier for the configured delivery channel.
pub fn notifier_for(config: &NotifyConfig) -> Result<Box<dyn Notifier>> {
    match &config.webhook_url {
        Some(url) => Ok(Box::new(WebhookNotifier::new(url, config.timeout_secs)?)),
        None => Ok(Box::new(SummaryNotifier)),
    }
}

/// Send without letting a delivery failure escape.
pub async fn deliver(notifier: &dyn Notifier, results: &[ConversionResult], addresses: &[String]) {
    if addresses.is_empty() {
        return;
    }
    if let Err(e) = notifier.notify(results, addresses).await {
        tracing::warn!(error = %e, "result notification failed");
    }
}
