//! Notification Sinks
//!
//! Fire-and-forget events about a sweep's progress. Delivery failures are
//! logged and swallowed; they never change a record or the run outcome.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("endpoint returned status {0}")]
    Status(u16),
}

/// Event emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SweepEvent {
    /// Discovery finished and a plan was made
    SweepStarted {
        run_id: String,
        owner: String,
        destination: String,
        holdings: usize,
        steps: usize,
    },
    /// One holding was part of a submitted transaction
    TransactionSent {
        run_id: String,
        address: String,
        #[serde(rename = "type")]
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mint: Option<String>,
        symbol: String,
        amount: String,
        signature: String,
    },
    /// A step failed
    StepFailed {
        run_id: String,
        step: usize,
        code: String,
        message: String,
    },
    /// The run reached its outcome
    SweepFinished {
        run_id: String,
        outcome: String,
        submissions: usize,
    },
}

impl SweepEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SweepStarted { .. } => "sweep_started",
            Self::TransactionSent { .. } => "transaction_sent",
            Self::StepFailed { .. } => "step_failed",
            Self::SweepFinished { .. } => "sweep_finished",
        }
    }
}

/// Receives sweep events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &SweepEvent) -> Result<(), NotifyError>;

    /// Sink description for logs
    fn sink_type(&self) -> &'static str;
}

/// Deliver `event`, logging instead of failing
pub async fn notify_quietly(sink: &dyn NotificationSink, event: &SweepEvent) {
    if let Err(e) = sink.notify(event).await {
        tracing::warn!(
            target: "solsweep::notify",
            sink = sink.sink_type(),
            event = event.name(),
            error = %e,
            "Notification failed"
        );
    }
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, event: &SweepEvent) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(event).map_err(|e| NotifyError::Delivery(e.to_string()))?;
        tracing::info!(target: "solsweep::notify", event = event.name(), "{}", payload);
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "log"
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(&self, _event: &SweepEvent) -> Result<(), NotifyError> {
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "noop"
    }
}

/// POSTs events as JSON to `{base_url}/notify`
pub struct WebhookNotifier {
    endpoint: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier for `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/notify", base_url.trim_end_matches('/')),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, event: &SweepEvent) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::debug!(
            target: "solsweep::notify",
            endpoint = %self.endpoint,
            event = event.name(),
            "Notification delivered"
        );
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "webhook"
    }
}
