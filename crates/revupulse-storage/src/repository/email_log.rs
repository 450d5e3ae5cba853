//! Email log repository
//!
//! Append-only record of send attempts. Entries are stored most-recent-first
//! by append order; historical entries are only touched by tracking-event
//! and status-update calls, never deleted.

use chrono::{DateTime, Utc};
use revupulse_common::rates::percentage;
use revupulse_common::types::{DeliveryStatus, EmailLogId, EngagementEvent};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ClickedLink, EmailLogEntry, EmailStats, EventData, NewEmailLogEntry};
use crate::store::BlobStore;

const BLOB_KEY: &str = "email_logs";

/// Email log repository
pub struct EmailLogRepository {
    store: Arc<dyn BlobStore>,
    entries: RwLock<Vec<EmailLogEntry>>,
}

impl EmailLogRepository {
    /// Load the log from storage; a missing or corrupt blob yields an
    /// empty log rather than an error
    pub async fn load(store: Arc<dyn BlobStore>) -> Self {
        let entries = match store.load(BLOB_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<EmailLogEntry>>(&blob) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Corrupt email log blob, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load email log, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            store,
            entries: RwLock::new(entries),
        }
    }

    async fn persist(&self, entries: &[EmailLogEntry]) {
        let blob = match serde_json::to_string(entries) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Failed to serialize email log: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(BLOB_KEY, &blob).await {
            warn!("Email log not persisted, continuing in memory: {}", e);
        }
    }

    /// Append a new entry, assigning id and timestamp
    pub async fn append(&self, new: NewEmailLogEntry) -> EmailLogEntry {
        self.append_with_id(Uuid::new_v4(), new).await
    }

    /// Append a new entry under a caller-allocated id
    ///
    /// Used by the dispatch facade, which allocates the id before the
    /// provider call so tracking URLs baked into the payload resolve to
    /// the logged entry.
    pub async fn append_with_id(&self, id: EmailLogId, new: NewEmailLogEntry) -> EmailLogEntry {
        let entry = EmailLogEntry {
            id,
            timestamp: Utc::now(),
            recipient_email: new.recipient_email,
            subject: new.subject,
            email_type: new.email_type,
            provider: new.provider,
            delivery_status: DeliveryStatus::Sent,
            message_id: new.message_id,
            opened: false,
            clicked: false,
            bounced: false,
            clicked_links: Vec::new(),
            device_type: None,
            location: None,
            user_agent: None,
            campaign_id: new.campaign_id,
            business_id: new.business_id,
            customer_id: new.customer_id,
            review_id: new.review_id,
            template_used: new.template_used,
            last_updated: None,
        };

        let mut entries = self.entries.write().await;
        // Most-recent-first is the externally observed order
        entries.insert(0, entry.clone());
        self.persist(&entries).await;
        entry
    }

    /// Overwrite the delivery status of the entry matching `message_id`
    ///
    /// Status only moves forward; a stale webhook reporting an earlier
    /// stage is ignored. An unknown message id is a no-op, not an error.
    pub async fn update_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
        timestamp: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.message_id.as_deref() == Some(message_id))
        else {
            debug!("Status update for unknown message id {}", message_id);
            return;
        };

        if status.rank() >= entry.delivery_status.rank() {
            entry.delivery_status = status;
        }
        entry.last_updated = Some(timestamp);
        self.persist(&entries).await;
    }

    /// Record an engagement event against the entry matching `message_id`
    ///
    /// Idempotent on the flags: re-reporting an event leaves them true and
    /// only refreshes `last_updated`. An unknown message id is a no-op.
    pub async fn track_event(
        &self,
        message_id: &str,
        event: EngagementEvent,
        data: EventData,
        timestamp: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.message_id.as_deref() == Some(message_id))
        else {
            debug!("Tracking event for unknown message id {}", message_id);
            return;
        };
        apply_event(entry, event, data, timestamp);
        self.persist(&entries).await;
    }

    /// Record an engagement event against the entry with the given id
    ///
    /// The pixel/click ingress keys on the entry id carried in tracking
    /// URLs; webhooks key on the provider message id.
    pub async fn track_event_by_id(
        &self,
        id: EmailLogId,
        event: EngagementEvent,
        data: EventData,
        timestamp: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            debug!("Tracking event for unknown entry id {}", id);
            return;
        };
        apply_event(entry, event, data, timestamp);
        self.persist(&entries).await;
    }

    /// Aggregate statistics over the whole log, zero-guarded
    pub async fn stats(&self) -> EmailStats {
        let entries = self.entries.read().await;
        let total = entries.len() as u64;
        let sent = entries
            .iter()
            .filter(|e| e.delivery_status == DeliveryStatus::Sent)
            .count() as u64;
        let bounced = entries.iter().filter(|e| e.bounced).count() as u64;
        let opened = entries.iter().filter(|e| e.opened).count() as u64;
        let clicked = entries.iter().filter(|e| e.clicked).count() as u64;

        EmailStats {
            total,
            sent,
            bounced,
            opened,
            clicked,
            bounce_rate: percentage(bounced, total),
            open_rate: percentage(opened, total),
            click_rate: percentage(clicked, total),
        }
    }

    /// Snapshot of all entries, most recent first
    pub async fn entries(&self) -> Vec<EmailLogEntry> {
        self.entries.read().await.clone()
    }

    /// Snapshot of the `n` most recent entries
    pub async fn recent(&self, n: usize) -> Vec<EmailLogEntry> {
        self.entries.read().await.iter().take(n).cloned().collect()
    }

    /// Snapshot of entries linked to a campaign
    pub async fn by_campaign(
        &self,
        campaign_id: revupulse_common::types::CampaignId,
    ) -> Vec<EmailLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.campaign_id == Some(campaign_id))
            .cloned()
            .collect()
    }

    /// Number of logged attempts
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been logged
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn apply_event(
    entry: &mut EmailLogEntry,
    event: EngagementEvent,
    data: EventData,
    timestamp: DateTime<Utc>,
) {
    let promoted = match event {
        EngagementEvent::Opened => {
            entry.opened = true;
            DeliveryStatus::Opened
        }
        EngagementEvent::Clicked => {
            entry.clicked = true;
            if let Some(url) = &data.url {
                entry.clicked_links.push(ClickedLink {
                    url: url.clone(),
                    timestamp,
                });
            }
            DeliveryStatus::Clicked
        }
        EngagementEvent::Bounced => {
            entry.bounced = true;
            DeliveryStatus::Bounced
        }
    };

    // Precedence: bounced > clicked > opened > unchanged
    if promoted.rank() > entry.delivery_status.rank() {
        entry.delivery_status = promoted;
    }

    // Each callback may overwrite enrichment with its own data
    if data.device_type.is_some() {
        entry.device_type = data.device_type;
    }
    if data.location.is_some() {
        entry.location = data.location;
    }
    if data.user_agent.is_some() {
        entry.user_agent = data.user_agent;
    }

    entry.last_updated = Some(timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use pretty_assertions::assert_eq;
    use revupulse_common::types::{DeviceType, EmailType};

    fn new_entry(to: &str, message_id: &str) -> NewEmailLogEntry {
        NewEmailLogEntry {
            recipient_email: to.to_string(),
            subject: "How was your experience?".to_string(),
            email_type: EmailType::ReviewRequest,
            provider: "SendGrid".to_string(),
            message_id: Some(message_id.to_string()),
            campaign_id: None,
            business_id: None,
            customer_id: None,
            review_id: None,
            template_used: Some("review_request_v1".to_string()),
        }
    }

    async fn repo() -> EmailLogRepository {
        EmailLogRepository::load(Arc::new(MemoryBlobStore::new())).await
    }

    #[tokio::test]
    async fn test_append_assigns_fields_and_orders_recent_first() {
        let repo = repo().await;

        let a = repo.append(new_entry("a@example.com", "m1")).await;
        let b = repo.append(new_entry("b@example.com", "m2")).await;

        assert_eq!(a.delivery_status, DeliveryStatus::Sent);
        assert!(!a.opened && !a.clicked && !a.bounced);
        assert_ne!(a.id, b.id);

        let entries = repo.entries().await;
        assert_eq!(entries[0].recipient_email, "b@example.com");
        assert_eq!(entries[1].recipient_email, "a@example.com");
    }

    #[tokio::test]
    async fn test_track_event_is_idempotent() {
        let repo = repo().await;
        repo.append(new_entry("a@example.com", "m1")).await;

        let now = Utc::now();
        repo.track_event("m1", EngagementEvent::Opened, EventData::default(), now)
            .await;
        repo.track_event("m1", EngagementEvent::Opened, EventData::default(), now)
            .await;

        let entry = &repo.entries().await[0];
        assert!(entry.opened);
        assert_eq!(entry.delivery_status, DeliveryStatus::Opened);
        assert!(entry.clicked_links.is_empty());
    }

    #[tokio::test]
    async fn test_clicked_appends_links_per_call() {
        let repo = repo().await;
        repo.append(new_entry("a@example.com", "m1")).await;

        let now = Utc::now();
        let data = EventData {
            url: Some("https://reviews.example/r/1".to_string()),
            ..Default::default()
        };
        repo.track_event("m1", EngagementEvent::Clicked, data.clone(), now)
            .await;
        repo.track_event("m1", EngagementEvent::Clicked, data, now)
            .await;

        let entry = &repo.entries().await[0];
        assert!(entry.clicked);
        assert_eq!(entry.clicked_links.len(), 2);
        assert_eq!(entry.clicked_links[0].url, "https://reviews.example/r/1");
    }

    #[tokio::test]
    async fn test_bounce_takes_precedence_over_open() {
        let repo = repo().await;
        repo.append(new_entry("a@example.com", "m1")).await;

        let now = Utc::now();
        repo.track_event("m1", EngagementEvent::Bounced, EventData::default(), now)
            .await;
        repo.track_event("m1", EngagementEvent::Opened, EventData::default(), now)
            .await;

        let entry = &repo.entries().await[0];
        assert!(entry.bounced);
        assert!(entry.opened);
        assert_eq!(entry.delivery_status, DeliveryStatus::Bounced);
    }

    #[tokio::test]
    async fn test_unknown_message_id_is_noop() {
        let repo = repo().await;
        repo.append(new_entry("a@example.com", "m1")).await;

        repo.track_event(
            "missing",
            EngagementEvent::Opened,
            EventData::default(),
            Utc::now(),
        )
        .await;
        repo.update_status("missing", DeliveryStatus::Delivered, Utc::now())
            .await;

        let entry = &repo.entries().await[0];
        assert!(!entry.opened);
        assert_eq!(entry.delivery_status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_update_status_never_moves_backward() {
        let repo = repo().await;
        repo.append(new_entry("a@example.com", "m1")).await;

        let now = Utc::now();
        repo.track_event("m1", EngagementEvent::Clicked, EventData::default(), now)
            .await;
        repo.update_status("m1", DeliveryStatus::Delivered, now).await;

        let entry = &repo.entries().await[0];
        assert_eq!(entry.delivery_status, DeliveryStatus::Clicked);
        assert_eq!(entry.last_updated, Some(now));
    }

    #[tokio::test]
    async fn test_enrichment_overwrites_per_call() {
        let repo = repo().await;
        repo.append(new_entry("a@example.com", "m1")).await;

        let now = Utc::now();
        repo.track_event(
            "m1",
            EngagementEvent::Opened,
            EventData {
                device_type: Some(DeviceType::Mobile),
                ..Default::default()
            },
            now,
        )
        .await;
        repo.track_event(
            "m1",
            EngagementEvent::Clicked,
            EventData {
                device_type: Some(DeviceType::Desktop),
                ..Default::default()
            },
            now,
        )
        .await;

        let entry = &repo.entries().await[0];
        assert_eq!(entry.device_type, Some(DeviceType::Desktop));
    }

    #[tokio::test]
    async fn test_stats_zero_guard_on_empty_log() {
        let repo = repo().await;
        let stats = repo.stats().await;

        assert_eq!(stats.total, 0);
        assert_eq!(stats.open_rate, 0.0);
        assert_eq!(stats.click_rate, 0.0);
        assert_eq!(stats.bounce_rate, 0.0);
    }

    #[tokio::test]
    async fn test_stats_rates() {
        let repo = repo().await;
        for i in 0..4 {
            repo.append(new_entry(&format!("u{}@example.com", i), &format!("m{}", i)))
                .await;
        }
        let now = Utc::now();
        repo.track_event("m0", EngagementEvent::Opened, EventData::default(), now)
            .await;
        repo.track_event("m1", EngagementEvent::Opened, EventData::default(), now)
            .await;
        repo.track_event("m1", EngagementEvent::Clicked, EventData::default(), now)
            .await;

        let stats = repo.stats().await;
        assert_eq!(stats.total, 4);
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.clicked, 1);
        assert_eq!(stats.open_rate, 50.0);
        assert_eq!(stats.click_rate, 25.0);
        // Two entries were promoted past Sent by engagement events
        assert_eq!(stats.sent, 2);
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let repo = EmailLogRepository::load(store.clone()).await;
        repo.append(new_entry("a@example.com", "m1")).await;
        repo.append(new_entry("b@example.com", "m2")).await;
        repo.track_event(
            "m1",
            EngagementEvent::Opened,
            EventData::default(),
            Utc::now(),
        )
        .await;

        let reloaded = EmailLogRepository::load(store).await;
        let entries = reloaded.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].recipient_email, "b@example.com");
        assert!(entries[1].opened);
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_empty() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        store.save("email_logs", "{not json").await.unwrap();

        let repo = EmailLogRepository::load(store).await;
        assert!(repo.is_empty().await);
    }
}
