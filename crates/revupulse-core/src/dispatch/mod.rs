//! Dispatch facade
//!
//! The single entry point for sending email. Every send passes the rate
//! limiter gate first; admitted sends go to the provider and are logged,
//! refused sends are queued for a later explicit drain. Deferral is an
//! outcome, not an error.

pub mod provider;
pub mod tracking;

pub use provider::{build_provider, EmailProvider, ProviderReceipt, SendPayload, SimulatedProvider};
pub use tracking::TrackingInjector;

use chrono::Utc;
use revupulse_common::config::{ProviderSettings, TrackingSettings};
use revupulse_common::Result;
use revupulse_storage::models::{EmailLogEntry, NewEmailLogEntry, SendRequest};
use revupulse_storage::EmailLogRepository;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::limiter::RateLimiter;

/// Result of one dispatch attempt
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Accepted by the provider and logged
    Sent(EmailLogEntry),
    /// Deferred by the rate limiter; queue size after the append
    Queued { queue_size: usize },
}

/// Orchestrates limiter, provider, and log for every outbound email
pub struct Dispatcher {
    provider: Arc<dyn EmailProvider>,
    limiter: Arc<RateLimiter>,
    log: Arc<EmailLogRepository>,
    from_email: String,
    from_name: String,
    tracking: Option<TrackingInjector>,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        limiter: Arc<RateLimiter>,
        log: Arc<EmailLogRepository>,
        settings: &ProviderSettings,
        tracking: &TrackingSettings,
    ) -> Self {
        Self {
            provider,
            limiter,
            log,
            from_email: settings.from_email.clone(),
            from_name: settings.from_name.clone(),
            tracking: tracking
                .enabled
                .then(|| TrackingInjector::new(tracking.base_url.clone())),
        }
    }

    /// Dispatch one send through the rate limiter gate
    ///
    /// An expired window is reset once and the gate re-evaluated once; a
    /// refused send is queued. Provider failure propagates with nothing
    /// logged, counted, or queued.
    pub async fn dispatch(&self, request: SendRequest) -> Result<DispatchOutcome> {
        let mut permit = self.limiter.can_send().await;
        if permit.reset_needed {
            self.limiter.reset_window().await;
            permit = self.limiter.can_send().await;
        }

        if !permit.can_send {
            let queue_size = self.limiter.enqueue(request).await;
            return Ok(DispatchOutcome::Queued { queue_size });
        }

        let entry = self.send_now(request).await?;
        Ok(DispatchOutcome::Sent(entry))
    }

    /// Drain queued sends while the window has headroom
    ///
    /// Runs only when explicitly invoked. Stops at the first provider
    /// failure; the failed request is consumed, not re-queued, and the
    /// error surfaces to the caller. Returns the entries sent.
    pub async fn drain_queue(&self) -> Result<Vec<EmailLogEntry>> {
        let mut sent = Vec::new();
        while let Some(request) = self.limiter.dequeue_next().await {
            match self.send_now(request).await {
                Ok(entry) => sent.push(entry),
                Err(e) => {
                    warn!("Queue drain stopped on provider failure: {}", e);
                    return Err(e);
                }
            }
        }
        if !sent.is_empty() {
            info!("Drained {} queued emails", sent.len());
        }
        Ok(sent)
    }

    /// Provider send, then log append, then counter increment
    ///
    /// The entry id is allocated up front so tracking URLs baked into the
    /// HTML resolve to the entry that gets logged.
    async fn send_now(&self, request: SendRequest) -> Result<EmailLogEntry> {
        let entry_id = Uuid::new_v4();
        let html = match &self.tracking {
            Some(injector) => injector.process(&request.html, entry_id, Utc::now()),
            None => request.html.clone(),
        };

        let payload = SendPayload {
            to: request.to.clone(),
            from_email: self.from_email.clone(),
            from_name: self.from_name.clone(),
            subject: request.subject.clone(),
            html,
            text: request.text.clone(),
        };

        let receipt = self.provider.send(&payload).await?;

        let entry = self
            .log
            .append_with_id(
                entry_id,
                NewEmailLogEntry {
                    recipient_email: request.to,
                    subject: request.subject,
                    email_type: request.email_type,
                    provider: self.provider.name().to_string(),
                    message_id: Some(receipt.message_id),
                    campaign_id: request.campaign_id,
                    business_id: request.business_id,
                    customer_id: request.customer_id,
                    review_id: request.review_id,
                    template_used: request.template_used,
                },
            )
            .await;
        self.limiter.increment().await;

        info!(
            "Email sent to {} via {} ({})",
            entry.recipient_email, entry.provider, entry.id
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use revupulse_common::types::EmailType;
    use revupulse_storage::{MemoryBlobStore, RateLimitRepository};

    fn request(to: &str) -> SendRequest {
        SendRequest {
            to: to.to_string(),
            subject: "How was your visit?".to_string(),
            html: "<html><body><a href=\"https://reviews.example/r/1\">Review us</a></body></html>"
                .to_string(),
            text: "Leave a review".to_string(),
            email_type: EmailType::ReviewRequest,
            campaign_id: None,
            business_id: None,
            customer_id: None,
            review_id: None,
            template_used: Some("review_request_v1".to_string()),
        }
    }

    async fn fixture(max_per_hour: u32) -> (Dispatcher, Arc<RateLimiter>, Arc<EmailLogRepository>, Arc<SimulatedProvider>) {
        let store: Arc<dyn revupulse_storage::BlobStore> = Arc::new(MemoryBlobStore::new());
        let limiter = Arc::new(RateLimiter::new(Arc::new(
            RateLimitRepository::load(store.clone(), max_per_hour).await,
        )));
        let log = Arc::new(EmailLogRepository::load(store).await);
        let provider = Arc::new(SimulatedProvider::new("SendGrid"));
        let dispatcher = Dispatcher::new(
            provider.clone(),
            limiter.clone(),
            log.clone(),
            &ProviderSettings::default(),
            &TrackingSettings::default(),
        );
        (dispatcher, limiter, log, provider)
    }

    #[tokio::test]
    async fn test_admitted_send_logs_and_counts() {
        let (dispatcher, limiter, log, _) = fixture(300).await;

        let outcome = dispatcher.dispatch(request("a@example.com")).await.unwrap();
        let DispatchOutcome::Sent(entry) = outcome else {
            panic!("expected a sent outcome");
        };

        assert_eq!(entry.recipient_email, "a@example.com");
        assert_eq!(entry.provider, "SendGrid");
        assert!(entry.message_id.is_some());
        assert_eq!(log.len().await, 1);
        assert_eq!(limiter.status().await.current_count, 1);
    }

    #[tokio::test]
    async fn test_overflow_is_queued_not_an_error() {
        let (dispatcher, limiter, log, _) = fixture(1).await;

        dispatcher.dispatch(request("a@example.com")).await.unwrap();
        let outcome = dispatcher.dispatch(request("b@example.com")).await.unwrap();

        let DispatchOutcome::Queued { queue_size } = outcome else {
            panic!("expected a queued outcome");
        };
        assert_eq!(queue_size, 1);
        assert_eq!(log.len().await, 1);
        assert_eq!(limiter.status().await.current_count, 1);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_trace() {
        let (dispatcher, limiter, log, provider) = fixture(300).await;
        provider.set_failing(true);

        let err = dispatcher.dispatch(request("a@example.com")).await.unwrap_err();
        assert!(err.is_provider_failure());
        assert!(log.is_empty().await);
        let status = limiter.status().await;
        assert_eq!(status.current_count, 0);
        assert_eq!(status.queue_size, 0);
    }

    #[tokio::test]
    async fn test_drain_sends_queued_in_order() {
        let (dispatcher, limiter, log, _) = fixture(1).await;

        dispatcher.dispatch(request("a@example.com")).await.unwrap();
        dispatcher.dispatch(request("b@example.com")).await.unwrap();
        dispatcher.dispatch(request("c@example.com")).await.unwrap();
        assert_eq!(limiter.status().await.queue_size, 2);

        limiter.reset_window().await;
        let drained = dispatcher.drain_queue().await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].recipient_email, "b@example.com");
        assert_eq!(drained[1].recipient_email, "c@example.com");
        assert_eq!(log.len().await, 3);
        assert_eq!(limiter.status().await.queue_size, 0);
    }

    #[tokio::test]
    async fn test_stale_window_resets_before_admission() {
        let (dispatcher, limiter, _, _) = fixture(1).await;

        // Fill a window anchored more than an hour in the past
        limiter
            .reset_window_at(Utc::now() - chrono::Duration::minutes(61))
            .await;
        limiter.increment().await;

        let outcome = dispatcher.dispatch(request("a@example.com")).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Sent(_)));
        assert_eq!(limiter.status().await.current_count, 1);
    }

    #[tokio::test]
    async fn test_drain_respects_the_limit() {
        let (dispatcher, limiter, _, _) = fixture(2).await;

        dispatcher.dispatch(request("a@example.com")).await.unwrap();
        dispatcher.dispatch(request("b@example.com")).await.unwrap();
        limiter.enqueue(request("c@example.com")).await;
        limiter.enqueue(request("d@example.com")).await;

        let drained = dispatcher.drain_queue().await.unwrap();
        assert!(drained.is_empty());
        assert_eq!(limiter.status().await.queue_size, 2);
    }

    #[tokio::test]
    async fn test_tracking_urls_resolve_to_logged_entry() {
        let (dispatcher, _, log, _) = fixture(300).await;

        let outcome = dispatcher.dispatch(request("a@example.com")).await.unwrap();
        let DispatchOutcome::Sent(entry) = outcome else {
            panic!("expected a sent outcome");
        };

        // The pixel ingress keys on the entry id; replaying it must hit
        // the entry that was logged for this send.
        log.track_event_by_id(
            entry.id,
            revupulse_common::types::EngagementEvent::Opened,
            revupulse_storage::models::EventData::default(),
            Utc::now(),
        )
        .await;
        assert!(log.entries().await[0].opened);
    }
}
