//! Persisted models

use chrono::{DateTime, Utc};
use revupulse_common::types::{
    BusinessId, CampaignId, CustomerId, DeliveryStatus, DeviceType, EmailLogId, EmailType,
    GeoLocation, ReviewId,
};
use serde::{Deserialize, Serialize};

/// A link click recorded against a log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickedLink {
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// One record per send attempt, mutated only by tracking callbacks and
/// status updates after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLogEntry {
    pub id: EmailLogId,
    pub timestamp: DateTime<Utc>,
    pub recipient_email: String,
    pub subject: String,
    pub email_type: EmailType,
    pub provider: String,
    pub delivery_status: DeliveryStatus,
    pub message_id: Option<String>,

    // Engagement flags, one-way false -> true
    pub opened: bool,
    pub clicked: bool,
    pub bounced: bool,
    #[serde(default)]
    pub clicked_links: Vec<ClickedLink>,

    // Enrichment set post-hoc by tracking callbacks
    pub device_type: Option<DeviceType>,
    pub location: Option<GeoLocation>,
    pub user_agent: Option<String>,

    // Optional linkage
    pub campaign_id: Option<CampaignId>,
    pub business_id: Option<BusinessId>,
    pub customer_id: Option<CustomerId>,
    pub review_id: Option<ReviewId>,
    pub template_used: Option<String>,

    pub last_updated: Option<DateTime<Utc>>,
}

/// Create input for a log entry; id, timestamp, and flags are assigned by
/// the repository on append
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmailLogEntry {
    pub recipient_email: String,
    pub subject: String,
    pub email_type: EmailType,
    pub provider: String,
    pub message_id: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub business_id: Option<BusinessId>,
    pub customer_id: Option<CustomerId>,
    pub review_id: Option<ReviewId>,
    pub template_used: Option<String>,
}

/// Enrichment payload attached to a tracking event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventData {
    pub url: Option<String>,
    pub device_type: Option<DeviceType>,
    pub location: Option<GeoLocation>,
    pub user_agent: Option<String>,
}

/// Aggregate statistics over the whole log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailStats {
    pub total: u64,
    pub sent: u64,
    pub bounced: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounce_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
}

/// A fully-rendered send request, also the payload queued on rate-limit
/// deferral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub email_type: EmailType,
    pub campaign_id: Option<CampaignId>,
    pub business_id: Option<BusinessId>,
    pub customer_id: Option<CustomerId>,
    pub review_id: Option<ReviewId>,
    pub template_used: Option<String>,
}

/// A deferred send waiting in the rate-limit queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSend {
    pub request: SendRequest,
    pub queued_at: DateTime<Utc>,
}

/// Singleton rate limiter state
///
/// The gate enforces `current_hour_count < max_per_hour` at dispatch time;
/// the stored count itself may equal the ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitState {
    pub max_per_hour: u32,
    pub current_hour_count: u32,
    pub hour_start_time: DateTime<Utc>,
    #[serde(default)]
    pub queued_emails: Vec<QueuedSend>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            max_per_hour: 300,
            current_hour_count: 0,
            hour_start_time: Utc::now(),
            queued_emails: Vec::new(),
        }
    }
}

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Paused,
}

impl CampaignStatus {
    /// Whether the status may advance to `next`
    ///
    /// Progression is monotonic draft -> scheduled -> sending -> completed;
    /// a sending campaign may be paused and later resumed.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Sending)
                | (Scheduled, Sending)
                | (Sending, Completed)
                | (Sending, Paused)
                | (Paused, Sending)
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "completed" => Ok(CampaignStatus::Completed),
            "paused" => Ok(CampaignStatus::Paused),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Audience selector for a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    AllCustomers,
    RecentCustomers,
    NonResponders,
    Custom(String),
}

/// Stored per-campaign counters
///
/// Derived rates are never stored; they are recomputed from the email log
/// filtered by campaign id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub total_recipients: u64,
    pub emails_sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub unsubscribed: u64,
}

/// Partial metrics update; present fields replace stored counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignMetricsUpdate {
    pub total_recipients: Option<u64>,
    pub emails_sent: Option<u64>,
    pub delivered: Option<u64>,
    pub opened: Option<u64>,
    pub clicked: Option<u64>,
    pub bounced: Option<u64>,
    pub unsubscribed: Option<u64>,
}

/// A named, trackable batch of sends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub description: String,
    pub template_id: Option<String>,
    pub target_audience: TargetAudience,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub metrics: CampaignMetrics,
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub description: String,
    pub template_id: Option<String>,
    pub target_audience: TargetAudience,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}
