//! Campaign repository

use chrono::Utc;
use revupulse_common::types::CampaignId;
use revupulse_common::{Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Campaign, CampaignMetrics, CampaignMetricsUpdate, CampaignStatus, CreateCampaign};
use crate::store::BlobStore;

const BLOB_KEY: &str = "campaigns";

/// Campaign repository
pub struct CampaignRepository {
    store: Arc<dyn BlobStore>,
    campaigns: RwLock<Vec<Campaign>>,
}

impl CampaignRepository {
    /// Load campaigns from storage; missing or corrupt data yields an
    /// empty set
    pub async fn load(store: Arc<dyn BlobStore>) -> Self {
        let campaigns = match store.load(BLOB_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<Campaign>>(&blob) {
                Ok(campaigns) => campaigns,
                Err(e) => {
                    warn!("Corrupt campaign blob, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load campaigns, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            store,
            campaigns: RwLock::new(campaigns),
        }
    }

    async fn persist(&self, campaigns: &[Campaign]) {
        let blob = match serde_json::to_string(campaigns) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Failed to serialize campaigns: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(BLOB_KEY, &blob).await {
            warn!("Campaigns not persisted, continuing in memory: {}", e);
        }
    }

    /// Create a new draft campaign
    pub async fn create(&self, input: CreateCampaign) -> Campaign {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            template_id: input.template_id,
            target_audience: input.target_audience,
            scheduled_time: input.scheduled_time,
            status: CampaignStatus::Draft,
            created_at: Utc::now(),
            created_by: input.created_by.unwrap_or_else(|| "admin".to_string()),
            metrics: CampaignMetrics::default(),
        };

        let mut campaigns = self.campaigns.write().await;
        campaigns.push(campaign.clone());
        self.persist(&campaigns).await;
        campaign
    }

    /// Get a campaign by id
    pub async fn get(&self, id: CampaignId) -> Option<Campaign> {
        self.campaigns
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// List all campaigns, newest first
    pub async fn list(&self) -> Vec<Campaign> {
        let mut campaigns = self.campaigns.read().await.clone();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    /// Advance a campaign's status, validating the transition
    pub async fn update_status(&self, id: CampaignId, next: CampaignStatus) -> Result<Campaign> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("campaign {}", id)))?;

        if !campaign.status.can_transition_to(next) {
            return Err(Error::Validation(format!(
                "Campaign cannot move from {} to {}",
                campaign.status, next
            )));
        }

        campaign.status = next;
        let updated = campaign.clone();
        self.persist(&campaigns).await;
        Ok(updated)
    }

    /// Merge a partial metrics update into a campaign's stored counters
    pub async fn update_metrics(
        &self,
        id: CampaignId,
        update: CampaignMetricsUpdate,
    ) -> Result<Campaign> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("campaign {}", id)))?;

        let m = &mut campaign.metrics;
        if let Some(v) = update.total_recipients {
            m.total_recipients = v;
        }
        if let Some(v) = update.emails_sent {
            m.emails_sent = v;
        }
        if let Some(v) = update.delivered {
            m.delivered = v;
        }
        if let Some(v) = update.opened {
            m.opened = v;
        }
        if let Some(v) = update.clicked {
            m.clicked = v;
        }
        if let Some(v) = update.bounced {
            m.bounced = v;
        }
        if let Some(v) = update.unsubscribed {
            m.unsubscribed = v;
        }

        let updated = campaign.clone();
        self.persist(&campaigns).await;
        Ok(updated)
    }
}
