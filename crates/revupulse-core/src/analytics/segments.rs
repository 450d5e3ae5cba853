//! Recipient engagement segmentation
//!
//! Folds the log per recipient, then assigns each recipient to exactly
//! one behavioral segment. Rules are evaluated in a fixed precedence
//! order and the first match wins.

use chrono::{DateTime, Duration, Utc};
use revupulse_common::rates::round1;
use revupulse_storage::models::EmailLogEntry;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-recipient engagement summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberProfile {
    pub email: String,
    /// One-decimal percentage of received emails opened
    pub open_rate: f64,
    /// One-decimal percentage of received emails clicked
    pub click_rate: f64,
    pub emails_received: u64,
    pub days_since_last_engagement: Option<i64>,
    pub days_since_first_email: i64,
}

/// Recipients bucketed by behavior, one bucket per recipient
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngagementSegments {
    pub champions: Vec<SubscriberProfile>,
    pub loyalists: Vec<SubscriberProfile>,
    pub new_subscribers: Vec<SubscriberProfile>,
    pub potential_loyalists: Vec<SubscriberProfile>,
    pub cannot_lose_them_potential: Vec<SubscriberProfile>,
    pub hibernating: Vec<SubscriberProfile>,
    pub at_risk: Vec<SubscriberProfile>,
}

struct RecipientFold {
    received: u64,
    opened: u64,
    clicked: u64,
    first_email: DateTime<Utc>,
    last_engagement: Option<DateTime<Utc>>,
}

/// Classify every recipient in the log as of `now`
pub fn classify_subscribers(entries: &[EmailLogEntry], now: DateTime<Utc>) -> EngagementSegments {
    let mut folds: BTreeMap<String, RecipientFold> = BTreeMap::new();

    for entry in entries {
        let fold = folds
            .entry(entry.recipient_email.clone())
            .or_insert_with(|| RecipientFold {
                received: 0,
                opened: 0,
                clicked: 0,
                first_email: entry.timestamp,
                last_engagement: None,
            });
        fold.received += 1;
        fold.first_email = fold.first_email.min(entry.timestamp);
        if entry.opened {
            fold.opened += 1;
        }
        if entry.clicked {
            fold.clicked += 1;
        }
        if entry.opened || entry.clicked {
            fold.last_engagement = Some(match fold.last_engagement {
                Some(existing) => existing.max(entry.timestamp),
                None => entry.timestamp,
            });
        }
    }

    let thirty_days_ago = now - Duration::days(30);
    let mut segments = EngagementSegments::default();

    for (email, fold) in folds {
        let open_ratio = fold.opened as f64 / fold.received as f64;
        let click_ratio = fold.clicked as f64 / fold.received as f64;
        let days_since_first = (now - fold.first_email).num_days();

        let profile = SubscriberProfile {
            email,
            open_rate: round1(open_ratio * 100.0),
            click_rate: round1(click_ratio * 100.0),
            emails_received: fold.received,
            days_since_last_engagement: fold.last_engagement.map(|t| (now - t).num_days()),
            days_since_first_email: days_since_first,
        };

        // First matching rule wins
        let bucket = if open_ratio >= 0.8 && click_ratio >= 0.3 {
            &mut segments.champions
        } else if open_ratio >= 0.6 && click_ratio >= 0.1 {
            &mut segments.loyalists
        } else if days_since_first <= 30 {
            &mut segments.new_subscribers
        } else if open_ratio >= 0.4 && days_since_first <= 90 {
            &mut segments.potential_loyalists
        } else if fold
            .last_engagement
            .is_some_and(|t| t < thirty_days_ago)
            && open_ratio >= 0.3
        {
            &mut segments.cannot_lose_them_potential
        } else if fold
            .last_engagement
            .map_or(true, |t| t < thirty_days_ago)
        {
            &mut segments.hibernating
        } else {
            &mut segments.at_risk
        };
        bucket.push(profile);
    }

    segments
}
