//! Campaign lifecycle and per-campaign analytics
//!
//! Campaign rates are never stored; they are derived on demand from the
//! email log filtered by campaign id, so a late webhook is reflected the
//! next time anyone looks.

use chrono::{DateTime, Utc};
use revupulse_common::rates::percentage;
use revupulse_common::types::{CampaignId, DeliveryStatus};
use revupulse_common::Result;
use revupulse_storage::models::{
    Campaign, CampaignMetricsUpdate, CampaignStatus, CreateCampaign,
};
use revupulse_storage::{CampaignRepository, EmailLogRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One row of a campaign's engagement timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    /// Strongest engagement recorded for the entry: opened, clicked,
    /// bounced, or plain sent
    pub event: String,
    pub recipient_email: String,
}

/// Derived per-campaign metrics plus the engagement timeline
#[derive(Debug, Clone, Serialize)]
pub struct CampaignAnalytics {
    pub campaign: Campaign,
    pub emails_sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
    /// Most recent first
    pub timeline: Vec<TimelineEvent>,
}

/// Campaign lifecycle over the repository plus log-derived analytics
pub struct CampaignManager {
    campaigns: Arc<CampaignRepository>,
    log: Arc<EmailLogRepository>,
}

impl CampaignManager {
    pub fn new(campaigns: Arc<CampaignRepository>, log: Arc<EmailLogRepository>) -> Self {
        Self { campaigns, log }
    }

    pub async fn create(&self, input: CreateCampaign) -> Campaign {
        let campaign = self.campaigns.create(input).await;
        info!("Campaign {} created ({})", campaign.name, campaign.id);
        campaign
    }

    pub async fn get(&self, id: CampaignId) -> Option<Campaign> {
        self.campaigns.get(id).await
    }

    pub async fn list(&self) -> Vec<Campaign> {
        self.campaigns.list().await
    }

    pub async fn schedule(&self, id: CampaignId) -> Result<Campaign> {
        self.campaigns
            .update_status(id, CampaignStatus::Scheduled)
            .await
    }

    pub async fn start(&self, id: CampaignId) -> Result<Campaign> {
        self.campaigns
            .update_status(id, CampaignStatus::Sending)
            .await
    }

    pub async fn pause(&self, id: CampaignId) -> Result<Campaign> {
        self.campaigns.update_status(id, CampaignStatus::Paused).await
    }

    pub async fn resume(&self, id: CampaignId) -> Result<Campaign> {
        self.campaigns
            .update_status(id, CampaignStatus::Sending)
            .await
    }

    pub async fn complete(&self, id: CampaignId) -> Result<Campaign> {
        self.campaigns
            .update_status(id, CampaignStatus::Completed)
            .await
    }

    /// Refresh a campaign's stored counters from the email log
    pub async fn sync_metrics(&self, id: CampaignId) -> Result<Campaign> {
        let entries = self.log.by_campaign(id).await;
        let update = CampaignMetricsUpdate {
            total_recipients: None,
            emails_sent: Some(entries.len() as u64),
            delivered: Some(
                entries
                    .iter()
                    .filter(|e| e.delivery_status == DeliveryStatus::Delivered)
                    .count() as u64,
            ),
            opened: Some(entries.iter().filter(|e| e.opened).count() as u64),
            clicked: Some(entries.iter().filter(|e| e.clicked).count() as u64),
            bounced: Some(entries.iter().filter(|e| e.bounced).count() as u64),
            unsubscribed: None,
        };
        self.campaigns.update_metrics(id, update).await
    }

    /// Derive rates and timeline for a campaign from the email log
    pub async fn campaign_analytics(&self, id: CampaignId) -> Option<CampaignAnalytics> {
        let campaign = self.campaigns.get(id).await?;
        let entries = self.log.by_campaign(id).await;

        let emails_sent = entries.len() as u64;
        let delivered = entries
            .iter()
            .filter(|e| e.delivery_status == DeliveryStatus::Delivered)
            .count() as u64;
        let opened = entries.iter().filter(|e| e.opened).count() as u64;
        let clicked = entries.iter().filter(|e| e.clicked).count() as u64;
        let bounced = entries.iter().filter(|e| e.bounced).count() as u64;

        let mut timeline: Vec<TimelineEvent> = entries
            .iter()
            .map(|e| TimelineEvent {
                timestamp: e.timestamp,
                event: if e.opened {
                    "opened"
                } else if e.clicked {
                    "clicked"
                } else if e.bounced {
                    "bounced"
                } else {
                    "sent"
                }
                .to_string(),
                recipient_email: e.recipient_email.clone(),
            })
            .collect();
        timeline.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Some(CampaignAnalytics {
            campaign,
            emails_sent,
            delivered,
            opened,
            clicked,
            bounced,
            open_rate: percentage(opened, emails_sent),
            click_rate: percentage(clicked, emails_sent),
            bounce_rate: percentage(bounced, emails_sent),
            timeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use revupulse_common::types::{EmailType, EngagementEvent};
    use revupulse_storage::models::{EventData, NewEmailLogEntry, TargetAudience};
    use revupulse_storage::MemoryBlobStore;
    use uuid::Uuid;

    async fn manager() -> (CampaignManager, Arc<EmailLogRepository>) {
        let store: Arc<dyn revupulse_storage::BlobStore> = Arc::new(MemoryBlobStore::new());
        let campaigns = Arc::new(CampaignRepository::load(store.clone()).await);
        let log = Arc::new(EmailLogRepository::load(store).await);
        (CampaignManager::new(campaigns, log.clone()), log)
    }

    fn create_input() -> CreateCampaign {
        CreateCampaign {
            name: "Spring push".to_string(),
            description: "Follow-up review requests".to_string(),
            template_id: Some("review_request_v1".to_string()),
            target_audience: TargetAudience::RecentCustomers,
            scheduled_time: None,
            created_by: None,
        }
    }

    async fn log_send(
        log: &EmailLogRepository,
        campaign_id: CampaignId,
        to: &str,
        message_id: &str,
    ) {
        log.append(NewEmailLogEntry {
            recipient_email: to.to_string(),
            subject: "How was your visit?".to_string(),
            email_type: EmailType::ReviewRequest,
            provider: "SendGrid".to_string(),
            message_id: Some(message_id.to_string()),
            campaign_id: Some(campaign_id),
            business_id: None,
            customer_id: None,
            review_id: None,
            template_used: None,
        })
        .await;
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (manager, _) = manager().await;
        let campaign = manager.create(create_input()).await;
        assert_eq!(campaign.status, CampaignStatus::Draft);

        manager.schedule(campaign.id).await.unwrap();
        manager.start(campaign.id).await.unwrap();
        manager.pause(campaign.id).await.unwrap();
        manager.resume(campaign.id).await.unwrap();
        let done = manager.complete(campaign.id).await.unwrap();
        assert_eq!(done.status, CampaignStatus::Completed);
    }

    #[tokio::test]
    async fn test_campaign_analytics_derives_from_log() {
        let (manager, log) = manager().await;
        let campaign = manager.create(create_input()).await;

        log_send(&log, campaign.id, "a@example.com", "m1").await;
        log_send(&log, campaign.id, "b@example.com", "m2").await;
        // A send outside this campaign stays out of its numbers
        log_send(&log, Uuid::new_v4(), "c@example.com", "m3").await;

        log.track_event("m1", EngagementEvent::Opened, EventData::default(), Utc::now())
            .await;

        let analytics = manager.campaign_analytics(campaign.id).await.unwrap();
        assert_eq!(analytics.emails_sent, 2);
        assert_eq!(analytics.opened, 1);
        assert_eq!(analytics.open_rate, 50.0);
        assert_eq!(analytics.timeline.len(), 2);
    }

    #[tokio::test]
    async fn test_timeline_is_most_recent_first() {
        let (manager, log) = manager().await;
        let campaign = manager.create(create_input()).await;
        log_send(&log, campaign.id, "a@example.com", "m1").await;
        log_send(&log, campaign.id, "b@example.com", "m2").await;

        // Push the first send earlier to make the ordering observable
        let analytics = manager.campaign_analytics(campaign.id).await.unwrap();
        assert!(analytics.timeline[0].timestamp >= analytics.timeline[1].timestamp);
        assert_eq!(analytics.timeline[0].recipient_email, "b@example.com");
    }

    #[tokio::test]
    async fn test_unknown_campaign_has_no_analytics() {
        let (manager, _) = manager().await;
        assert!(manager.campaign_analytics(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_sync_metrics_counts_engagement() {
        let (manager, log) = manager().await;
        let campaign = manager.create(create_input()).await;
        log_send(&log, campaign.id, "a@example.com", "m1").await;
        log_send(&log, campaign.id, "b@example.com", "m2").await;
        log.track_event("m2", EngagementEvent::Bounced, EventData::default(), Utc::now())
            .await;

        let updated = manager.sync_metrics(campaign.id).await.unwrap();
        assert_eq!(updated.metrics.emails_sent, 2);
        assert_eq!(updated.metrics.bounced, 1);
        assert_eq!(updated.metrics.opened, 0);
    }

    #[tokio::test]
    async fn test_timeline_event_precedence() {
        let (manager, log) = manager().await;
        let campaign = manager.create(create_input()).await;
        log_send(&log, campaign.id, "a@example.com", "m1").await;

        let now = Utc::now() + Duration::seconds(1);
        log.track_event("m1", EngagementEvent::Clicked, EventData::default(), now)
            .await;
        log.track_event("m1", EngagementEvent::Opened, EventData::default(), now)
            .await;

        let analytics = manager.campaign_analytics(campaign.id).await.unwrap();
        // Opened outranks clicked in the timeline label
        assert_eq!(analytics.timeline[0].event, "opened");
    }
}
