//! Email provider adapter seam
//!
//! Real delivery is out of scope; the simulated provider keeps the same
//! async boundary, latency, and failure surface a network transport would
//! have, so the dispatch path is exercised end to end.

use async_trait::async_trait;
use chrono::Utc;
use revupulse_common::config::ProviderSettings;
use revupulse_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

/// Rendered payload handed to the provider
#[derive(Debug, Clone)]
pub struct SendPayload {
    pub to: String,
    pub from_email: String,
    pub from_name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Provider acknowledgement of an accepted send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    /// Provider-scoped message id, later matched by webhook callbacks
    pub message_id: String,
}

/// Transport seam for outbound email
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Provider name recorded on each log entry
    fn name(&self) -> &str;

    /// Hand the payload to the provider and wait for acceptance
    async fn send(&self, payload: &SendPayload) -> Result<ProviderReceipt>;
}

/// In-process provider double with configurable latency and failure
pub struct SimulatedProvider {
    name: String,
    latency: Duration,
    send_timeout: Duration,
    failing: AtomicBool,
}

impl SimulatedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Duration::from_millis(5),
            send_timeout: Duration::from_secs(30),
            failing: AtomicBool::new(false),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailProvider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &SendPayload) -> Result<ProviderReceipt> {
        let work = async {
            tokio::time::sleep(self.latency).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::provider(&self.name, "simulated delivery failure"));
            }
            let message_id = format!("<{}.{}@revupulse>", Uuid::new_v4(), Utc::now().timestamp());
            debug!(
                "Simulated {} send to {} accepted ({})",
                self.name, payload.to, message_id
            );
            Ok(ProviderReceipt { message_id })
        };

        match timeout(self.send_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::provider(
                &self.name,
                format!("send timed out after {:?}", self.send_timeout),
            )),
        }
    }
}

/// Build the provider adapter selected by configuration
///
/// Only the SendGrid and Mailgun names are recognized; anything else is a
/// configuration error.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn EmailProvider>> {
    match settings.service_name.to_ascii_lowercase().as_str() {
        "sendgrid" => Ok(Arc::new(
            SimulatedProvider::new("SendGrid")
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
        )),
        "mailgun" => Ok(Arc::new(
            SimulatedProvider::new("Mailgun")
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
        )),
        other => Err(Error::Config(format!(
            "Unknown email provider: {}",
            other
        ))),
    }
}
