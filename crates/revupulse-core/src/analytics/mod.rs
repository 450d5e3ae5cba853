//! Analytics engine
//!
//! Pure folds over the email log. Every public function takes a slice of
//! entries and an explicit clock where time matters; the [`AnalyticsEngine`]
//! wrapper snapshots the repository and applies the current time. All
//! outward rates are one-decimal percentages, zero-guarded.

pub mod insights;
pub mod segments;

pub use insights::{
    cohorts, deliverability_score, performance_insights, send_time_performance, CohortPeriod,
    CohortStats, Insight, InsightKind, SendTimePerformance, TimeSlotStats,
};
pub use segments::{classify_subscribers, EngagementSegments, SubscriberProfile};

use chrono::{DateTime, Duration, Timelike, Utc};
use revupulse_common::rates::{percentage, round1};
use revupulse_common::types::{DeviceType, EmailType};
use revupulse_storage::models::EmailLogEntry;
use revupulse_storage::EmailLogRepository;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-template counters and rates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateStats {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

/// Send and engagement counts for one hour of the day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HourlyBucket {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
}

/// One day of the zero-filled daily series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    /// Day key, `YYYY-MM-DD`
    pub date: String,
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

/// Opens and clicks attributed to one device class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStats {
    pub device: DeviceType,
    pub opens: u64,
    pub clicks: u64,
    /// Clicks as a share of opens
    pub click_through_rate: f64,
}

/// Opens and clicks attributed to one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStats {
    pub country: String,
    pub opens: u64,
    pub clicks: u64,
}

/// One recorded link click, flattened out of its log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkClick {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub email_type: EmailType,
    pub template_used: Option<String>,
}

/// Window-wide counters and rates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TotalMetrics {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

/// Everything the dashboard renders for one trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub template_performance: BTreeMap<String, TemplateStats>,
    /// Index is the hour of day, 0 through 23
    pub hourly: Vec<HourlyBucket>,
    /// Hour with the best opened/sent ratio; earliest hour wins ties
    pub best_hour: Option<u32>,
    pub daily: Vec<DailyPoint>,
    pub devices: Vec<DeviceStats>,
    pub locations: Vec<LocationStats>,
    pub link_clicks: Vec<LinkClick>,
    pub engagement_score: f64,
    pub totals: TotalMetrics,
}

/// Entries whose timestamp falls within the trailing `days`-day window
pub fn window(entries: &[EmailLogEntry], days: i64, now: DateTime<Utc>) -> Vec<EmailLogEntry> {
    let cutoff = now - Duration::days(days);
    entries
        .iter()
        .filter(|e| e.timestamp >= cutoff)
        .cloned()
        .collect()
}

/// Fold entries by template; entries without a template land in "Unknown"
pub fn template_performance(entries: &[EmailLogEntry]) -> BTreeMap<String, TemplateStats> {
    let mut templates: BTreeMap<String, TemplateStats> = BTreeMap::new();
    for entry in entries {
        let key = entry
            .template_used
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        let stats = templates.entry(key).or_default();
        stats.sent += 1;
        if entry.opened {
            stats.opened += 1;
        }
        if entry.clicked {
            stats.clicked += 1;
        }
        if entry.bounced {
            stats.bounced += 1;
        }
    }
    for stats in templates.values_mut() {
        stats.open_rate = percentage(stats.opened, stats.sent);
        stats.click_rate = percentage(stats.clicked, stats.sent);
        stats.bounce_rate = percentage(stats.bounced, stats.sent);
    }
    templates
}

/// Fold entries into the 24 hour-of-day buckets
///
/// Hours are UTC; timestamps carry no sender timezone.
pub fn hourly_distribution(entries: &[EmailLogEntry]) -> Vec<HourlyBucket> {
    let mut buckets = vec![HourlyBucket::default(); 24];
    for entry in entries {
        let bucket = &mut buckets[entry.timestamp.hour() as usize];
        bucket.sent += 1;
        if entry.opened {
            bucket.opened += 1;
        }
        if entry.clicked {
            bucket.clicked += 1;
        }
    }
    buckets
}

/// Hour with the highest opened/sent ratio among hours with sends
pub fn best_hour(buckets: &[HourlyBucket]) -> Option<u32> {
    let mut best: Option<(u32, f64)> = None;
    for (hour, bucket) in buckets.iter().enumerate() {
        if bucket.sent == 0 {
            continue;
        }
        let ratio = bucket.opened as f64 / bucket.sent as f64;
        // Strictly-greater keeps the earliest hour on ties
        if best.map_or(true, |(_, r)| ratio > r) {
            best = Some((hour as u32, ratio));
        }
    }
    best.map(|(hour, _)| hour)
}

/// Zero-filled per-day series covering `[today - days + 1, today]`
pub fn daily_series(entries: &[EmailLogEntry], days: i64, now: DateTime<Utc>) -> Vec<DailyPoint> {
    let today = now.date_naive();
    let mut counts: BTreeMap<String, (u64, u64, u64, u64)> = BTreeMap::new();
    for offset in (0..days).rev() {
        let date = today - Duration::days(offset);
        counts.insert(date.format("%Y-%m-%d").to_string(), (0, 0, 0, 0));
    }

    for entry in entries {
        let key = entry.timestamp.date_naive().format("%Y-%m-%d").to_string();
        let Some((sent, opened, clicked, bounced)) = counts.get_mut(&key) else {
            continue;
        };
        *sent += 1;
        if entry.opened {
            *opened += 1;
        }
        if entry.clicked {
            *clicked += 1;
        }
        if entry.bounced {
            *bounced += 1;
        }
    }

    counts
        .into_iter()
        .map(|(date, (sent, opened, clicked, bounced))| DailyPoint {
            date,
            sent,
            opened,
            clicked,
            bounced,
            open_rate: percentage(opened, sent),
            click_rate: percentage(clicked, sent),
            bounce_rate: percentage(bounced, sent),
        })
        .collect()
}

/// Opens and clicks per device class, for entries with a known device
pub fn device_stats(entries: &[EmailLogEntry]) -> Vec<DeviceStats> {
    let order = [
        DeviceType::Mobile,
        DeviceType::Tablet,
        DeviceType::Desktop,
        DeviceType::Unknown,
    ];
    order
        .into_iter()
        .filter_map(|device| {
            let mut opens = 0u64;
            let mut clicks = 0u64;
            let mut seen = false;
            for entry in entries.iter().filter(|e| e.device_type == Some(device)) {
                seen = true;
                if entry.opened {
                    opens += 1;
                }
                if entry.clicked {
                    clicks += 1;
                }
            }
            seen.then_some(DeviceStats {
                device,
                opens,
                clicks,
                click_through_rate: percentage(clicks, opens),
            })
        })
        .collect()
}

/// Opens and clicks per country, busiest locations first
pub fn location_stats(entries: &[EmailLogEntry]) -> Vec<LocationStats> {
    let mut countries: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for entry in entries {
        let Some(location) = &entry.location else {
            continue;
        };
        let key = location
            .country
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        let (opens, clicks) = countries.entry(key).or_default();
        if entry.opened {
            *opens += 1;
        }
        if entry.clicked {
            *clicks += 1;
        }
    }

    let mut stats: Vec<LocationStats> = countries
        .into_iter()
        .map(|(country, (opens, clicks))| LocationStats {
            country,
            opens,
            clicks,
        })
        .collect();
    stats.sort_by(|a, b| (b.opens + b.clicks).cmp(&(a.opens + a.clicks)));
    stats
}

/// Every recorded link click, flattened with its entry's context
pub fn link_clicks(entries: &[EmailLogEntry]) -> Vec<LinkClick> {
    entries
        .iter()
        .flat_map(|entry| {
            entry.clicked_links.iter().map(|link| LinkClick {
                url: link.url.clone(),
                timestamp: link.timestamp,
                email_type: entry.email_type.clone(),
                template_used: entry.template_used.clone(),
            })
        })
        .collect()
}

/// Weighted engagement score: opens count once, clicks twice, scaled to 100
///
/// Capped at 100; an entry that is both opened and clicked would otherwise
/// push the raw ratio past the maximum.
pub fn engagement_score(entries: &[EmailLogEntry]) -> f64 {
    let sent = entries.len() as u64;
    if sent == 0 {
        return 0.0;
    }
    let opened = entries.iter().filter(|e| e.opened).count() as u64;
    let clicked = entries.iter().filter(|e| e.clicked).count() as u64;
    let raw = (opened + 2 * clicked) as f64 / (2 * sent) as f64 * 100.0;
    round1(raw.min(100.0))
}

/// Window-wide counters with zero-guarded rates
pub fn totals(entries: &[EmailLogEntry]) -> TotalMetrics {
    let sent = entries.len() as u64;
    let opened = entries.iter().filter(|e| e.opened).count() as u64;
    let clicked = entries.iter().filter(|e| e.clicked).count() as u64;
    let bounced = entries.iter().filter(|e| e.bounced).count() as u64;
    TotalMetrics {
        sent,
        opened,
        clicked,
        bounced,
        open_rate: percentage(opened, sent),
        click_rate: percentage(clicked, sent),
        bounce_rate: percentage(bounced, sent),
    }
}

/// Build the full report for the trailing window as of `now`
pub fn report_at(entries: &[EmailLogEntry], days: i64, now: DateTime<Utc>) -> AnalyticsReport {
    let recent = window(entries, days, now);
    let hourly = hourly_distribution(&recent);
    let best_hour = best_hour(&hourly);
    AnalyticsReport {
        template_performance: template_performance(&recent),
        hourly,
        best_hour,
        daily: daily_series(&recent, days, now),
        devices: device_stats(&recent),
        locations: location_stats(&recent),
        link_clicks: link_clicks(&recent),
        engagement_score: engagement_score(&recent),
        totals: totals(&recent),
    }
}

/// Analytics over the live email log
pub struct AnalyticsEngine {
    log: Arc<EmailLogRepository>,
}

impl AnalyticsEngine {
    pub fn new(log: Arc<EmailLogRepository>) -> Self {
        Self { log }
    }

    /// Full dashboard report for the trailing `days`-day window
    pub async fn report(&self, days: i64) -> AnalyticsReport {
        let entries = self.log.entries().await;
        report_at(&entries, days, Utc::now())
    }

    /// Per-recipient engagement segmentation over the whole log
    pub async fn segments(&self) -> EngagementSegments {
        let entries = self.log.entries().await;
        classify_subscribers(&entries, Utc::now())
    }

    /// Benchmark comparison insights over the whole log
    pub async fn insights(&self) -> Vec<Insight> {
        let entries = self.log.entries().await;
        performance_insights(&entries)
    }

    /// Hour-of-day and weekday performance folds
    pub async fn send_time(&self) -> SendTimePerformance {
        let entries = self.log.entries().await;
        send_time_performance(&entries)
    }

    /// Cohort analysis keyed by the requested period
    pub async fn cohorts(&self, period: CohortPeriod) -> BTreeMap<String, CohortStats> {
        let entries = self.log.entries().await;
        cohorts(&entries, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use revupulse_common::types::{DeliveryStatus, GeoLocation};
    use uuid::Uuid;

    pub(crate) fn entry_at(timestamp: DateTime<Utc>, template: Option<&str>) -> EmailLogEntry {
        EmailLogEntry {
            id: Uuid::new_v4(),
            timestamp,
            recipient_email: "a@example.com".to_string(),
            subject: "How was your visit?".to_string(),
            email_type: EmailType::ReviewRequest,
            provider: "SendGrid".to_string(),
            delivery_status: DeliveryStatus::Sent,
            message_id: None,
            opened: false,
            clicked: false,
            bounced: false,
            clicked_links: Vec::new(),
            device_type: None,
            location: None,
            user_agent: None,
            campaign_id: None,
            business_id: None,
            customer_id: None,
            review_id: None,
            template_used: template.map(str::to_string),
            last_updated: None,
        }
    }

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_template_performance_ab() {
        let now = ts(2026, 8, 30, 12);
        let mut entries = Vec::new();
        // Template A: 2 sent, 1 opened
        let mut a1 = entry_at(now, Some("A"));
        a1.opened = true;
        entries.push(a1);
        entries.push(entry_at(now, Some("A")));
        // Template B: 1 sent, 1 opened and clicked
        let mut b1 = entry_at(now, Some("B"));
        b1.opened = true;
        b1.clicked = true;
        entries.push(b1);

        let perf = template_performance(&entries);
        assert_eq!(perf["A"].sent, 2);
        assert_eq!(perf["A"].open_rate, 50.0);
        assert_eq!(perf["B"].open_rate, 100.0);
        assert_eq!(perf["B"].click_rate, 100.0);

        // Best template by open rate
        let best = perf
            .iter()
            .max_by(|a, b| a.1.open_rate.partial_cmp(&b.1.open_rate).unwrap())
            .map(|(name, _)| name.clone());
        assert_eq!(best.as_deref(), Some("B"));
    }

    #[test]
    fn test_missing_template_counts_as_unknown() {
        let entries = vec![entry_at(ts(2026, 8, 30, 12), None)];
        let perf = template_performance(&entries);
        assert_eq!(perf["Unknown"].sent, 1);
    }

    #[test]
    fn test_hourly_distribution_and_best_hour() {
        let mut entries = Vec::new();
        // Hour 9: 2 sent, 2 opened. Hour 14: 2 sent, 1 opened.
        for _ in 0..2 {
            let mut e = entry_at(ts(2026, 8, 30, 9), None);
            e.opened = true;
            entries.push(e);
        }
        let mut e = entry_at(ts(2026, 8, 30, 14), None);
        e.opened = true;
        entries.push(e);
        entries.push(entry_at(ts(2026, 8, 30, 14), None));

        let hourly = hourly_distribution(&entries);
        assert_eq!(hourly[9].sent, 2);
        assert_eq!(hourly[9].opened, 2);
        assert_eq!(hourly[14].sent, 2);
        assert_eq!(best_hour(&hourly), Some(9));
    }

    #[test]
    fn test_best_hour_tie_goes_to_earliest() {
        let mut entries = Vec::new();
        for hour in [8, 16] {
            let mut e = entry_at(ts(2026, 8, 30, hour), None);
            e.opened = true;
            entries.push(e);
        }
        assert_eq!(best_hour(&hourly_distribution(&entries)), Some(8));
    }

    #[test]
    fn test_best_hour_empty_log() {
        assert_eq!(best_hour(&hourly_distribution(&[])), None);
    }

    #[test]
    fn test_daily_series_zero_filled() {
        let now = ts(2026, 8, 30, 12);
        let mut opened = entry_at(ts(2026, 8, 28, 9), None);
        opened.opened = true;
        let entries = vec![opened, entry_at(ts(2026, 8, 30, 10), None)];

        let series = daily_series(&entries, 7, now);
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, "2026-08-24");
        assert_eq!(series[6].date, "2026-08-30");

        let by_date: BTreeMap<&str, &DailyPoint> =
            series.iter().map(|p| (p.date.as_str(), p)).collect();
        assert_eq!(by_date["2026-08-28"].sent, 1);
        assert_eq!(by_date["2026-08-28"].open_rate, 100.0);
        assert_eq!(by_date["2026-08-25"].sent, 0);
        assert_eq!(by_date["2026-08-25"].open_rate, 0.0);
    }

    #[test]
    fn test_window_excludes_old_entries() {
        let now = ts(2026, 8, 30, 12);
        let entries = vec![
            entry_at(now - Duration::days(40), None),
            entry_at(now - Duration::days(5), None),
        ];
        assert_eq!(window(&entries, 30, now).len(), 1);
    }

    #[test]
    fn test_device_and_location_stats() {
        let now = ts(2026, 8, 30, 12);
        let mut mobile = entry_at(now, None);
        mobile.device_type = Some(DeviceType::Mobile);
        mobile.opened = true;
        mobile.clicked = true;
        mobile.location = Some(GeoLocation {
            country: Some("Japan".to_string()),
            region: None,
            city: None,
            timezone: None,
        });
        let mut desktop = entry_at(now, None);
        desktop.device_type = Some(DeviceType::Desktop);
        desktop.opened = true;
        desktop.location = Some(GeoLocation {
            country: None,
            region: None,
            city: None,
            timezone: None,
        });
        let untracked = entry_at(now, None);
        let entries = vec![mobile, desktop, untracked];

        let devices = device_stats(&entries);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device, DeviceType::Mobile);
        assert_eq!(devices[0].click_through_rate, 100.0);
        assert_eq!(devices[1].device, DeviceType::Desktop);
        assert_eq!(devices[1].click_through_rate, 0.0);

        let locations = location_stats(&entries);
        assert_eq!(locations[0].country, "Japan");
        assert_eq!(locations[0].opens, 1);
        assert_eq!(locations[0].clicks, 1);
        assert_eq!(locations[1].country, "Unknown");
    }

    #[test]
    fn test_engagement_score_boundaries() {
        assert_eq!(engagement_score(&[]), 0.0);

        let now = ts(2026, 8, 30, 12);
        let mut all_in = entry_at(now, None);
        all_in.opened = true;
        all_in.clicked = true;
        // Fully engaged log pegs the score at the cap
        assert_eq!(engagement_score(std::slice::from_ref(&all_in)), 100.0);

        let mut opened_only = entry_at(now, None);
        opened_only.opened = true;
        assert_eq!(engagement_score(&[opened_only]), 50.0);

        assert_eq!(engagement_score(&[entry_at(now, None)]), 0.0);
    }

    #[test]
    fn test_totals_zero_guard() {
        let t = totals(&[]);
        assert_eq!(t.sent, 0);
        assert_eq!(t.open_rate, 0.0);
        assert_eq!(t.click_rate, 0.0);
        assert_eq!(t.bounce_rate, 0.0);
    }

    #[test]
    fn test_link_clicks_flatten_with_context() {
        let now = ts(2026, 8, 30, 12);
        let mut entry = entry_at(now, Some("review_request_v1"));
        entry.clicked = true;
        entry.clicked_links.push(revupulse_storage::models::ClickedLink {
            url: "https://reviews.example/r/1".to_string(),
            timestamp: now,
        });
        entry.clicked_links.push(revupulse_storage::models::ClickedLink {
            url: "https://reviews.example/r/2".to_string(),
            timestamp: now,
        });

        let clicks = link_clicks(&[entry]);
        assert_eq!(clicks.len(), 2);
        assert_eq!(clicks[0].url, "https://reviews.example/r/1");
        assert_eq!(clicks[0].template_used.as_deref(), Some("review_request_v1"));
    }
}
