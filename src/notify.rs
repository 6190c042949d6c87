//! Operator alerts for failures the next cycle cannot be trusted to clear

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, warn};

use crate::Error;

/// Fire-and-forget notification channel
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Slack incoming-webhook alerts
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl AlertSink for SlackNotifier {
    async fn notify(&self, message: &str) {
        let payload = json!({ "text": message });

        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Alert delivered to Slack");
            }
            Ok(response) => {
                warn!("Slack webhook returned {}", response.status());
            }
            Err(e) => {
                warn!("Failed to deliver Slack alert: {}", e);
            }
        }
    }
}

/// Alerts that only reach the log, for deployments without a webhook
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl AlertSink for LogNotifier {
    async fn notify(&self, message: &str) {
        error!(alert = true, "{}", message);
    }
}

/// Apply the failure policy: retryable errors are logged and left to the
/// next cycle, everything else is also sent to the alert sink
pub async fn report_failure(alerts: &dyn AlertSink, scope: &str, err: &Error) {
    if err.is_retryable() {
        warn!(scope = %scope, "Transient failure, retrying next cycle: {}", err);
        return;
    }

    error!(scope = %scope, "Unexpected failure: {}", err);
    alerts
        .notify(&format!("trailbot {}: unexpected error\n```{}```", scope, err))
        .await;
}
