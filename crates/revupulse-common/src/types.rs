//! Common types for RevuPulse

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for email log entries
pub type EmailLogId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for businesses
pub type BusinessId = Uuid;

/// Unique identifier for customers
pub type CustomerId = Uuid;

/// Unique identifier for reviews
pub type ReviewId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Delivery status of a logged send attempt
///
/// Transitions only move forward: Pending -> Sent -> {Delivered, Opened,
/// Clicked, Bounced}. Engagement events promote the status per the fixed
/// precedence bounced > clicked > opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
}

impl DeliveryStatus {
    /// Rank used to keep status transitions forward-only
    pub fn rank(&self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Opened => 3,
            DeliveryStatus::Clicked => 4,
            DeliveryStatus::Bounced => 5,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "Pending"),
            DeliveryStatus::Sent => write!(f, "Sent"),
            DeliveryStatus::Delivered => write!(f, "Delivered"),
            DeliveryStatus::Opened => write!(f, "Opened"),
            DeliveryStatus::Clicked => write!(f, "Clicked"),
            DeliveryStatus::Bounced => write!(f, "Bounced"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(DeliveryStatus::Pending),
            "Sent" => Ok(DeliveryStatus::Sent),
            "Delivered" => Ok(DeliveryStatus::Delivered),
            "Opened" => Ok(DeliveryStatus::Opened),
            "Clicked" => Ok(DeliveryStatus::Clicked),
            "Bounced" => Ok(DeliveryStatus::Bounced),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }
}

/// Category tag for an outbound email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    ReviewRequest,
    ReviewReminder,
    ThankYou,
    FeedbackResponse,
    Other(String),
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailType::ReviewRequest => write!(f, "review_request"),
            EmailType::ReviewReminder => write!(f, "review_reminder"),
            EmailType::ThankYou => write!(f, "thank_you"),
            EmailType::FeedbackResponse => write!(f, "feedback_response"),
            EmailType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Engagement event reported by tracking callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementEvent {
    Opened,
    Clicked,
    Bounced,
}

impl std::fmt::Display for EngagementEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngagementEvent::Opened => write!(f, "opened"),
            EngagementEvent::Clicked => write!(f, "clicked"),
            EngagementEvent::Bounced => write!(f, "bounced"),
        }
    }
}

impl std::str::FromStr for EngagementEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(EngagementEvent::Opened),
            "clicked" => Ok(EngagementEvent::Clicked),
            "bounced" => Ok(EngagementEvent::Bounced),
            _ => Err(format!("Invalid engagement event: {}", s)),
        }
    }
}

/// Device class derived from a tracking callback's user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceType {
    /// Classify a user agent string into a device class
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        let is_mobile = ["mobile", "iphone", "ipod", "blackberry", "iemobile", "opera mini"]
            .iter()
            .any(|m| ua.contains(m));
        let is_tablet = ua.contains("tablet") || ua.contains("ipad");

        if is_tablet || (ua.contains("android") && !ua.contains("mobile")) {
            DeviceType::Tablet
        } else if is_mobile || ua.contains("android") {
            DeviceType::Mobile
        } else if ua.is_empty() {
            DeviceType::Unknown
        } else {
            DeviceType::Desktop
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Mobile => write!(f, "mobile"),
            DeviceType::Tablet => write!(f, "tablet"),
            DeviceType::Desktop => write!(f, "desktop"),
            DeviceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Geographic enrichment from a tracking callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

/// Validate an email address format (loose, format-level only)
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
