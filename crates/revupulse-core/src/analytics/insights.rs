//! Benchmark insights, deliverability scoring, send-time folds, cohorts

use chrono::{Datelike, Duration, Timelike};
use revupulse_common::rates::{percentage, round1};
use revupulse_storage::models::EmailLogEntry;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Industry reference rates the aggregate metrics are compared against
pub const BENCHMARK_OPEN_RATE: f64 = 21.33;
pub const BENCHMARK_CLICK_RATE: f64 = 2.62;
pub const BENCHMARK_BOUNCE_RATE: f64 = 2.0;

/// Qualitative weight of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Positive,
    Warning,
    Critical,
}

/// One benchmark comparison result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub metric: String,
    pub message: String,
}

/// Compare aggregate rates against the fixed benchmarks
///
/// Above benchmark reads positive, below 80% of benchmark reads warning,
/// and a bounce rate past twice the benchmark is critical. Metrics in the
/// gray zone between produce no insight.
pub fn performance_insights(entries: &[EmailLogEntry]) -> Vec<Insight> {
    let sent = entries.len() as u64;
    let opened = entries.iter().filter(|e| e.opened).count() as u64;
    let clicked = entries.iter().filter(|e| e.clicked).count() as u64;
    let bounced = entries.iter().filter(|e| e.bounced).count() as u64;

    let open_rate = percentage(opened, sent);
    let click_rate = percentage(clicked, sent);
    let bounce_rate = percentage(bounced, sent);

    let mut insights = Vec::new();

    if open_rate > BENCHMARK_OPEN_RATE {
        insights.push(Insight {
            kind: InsightKind::Positive,
            metric: "Open Rate".to_string(),
            message: format!(
                "Your open rate of {:.1}% is above industry average ({}%)",
                open_rate, BENCHMARK_OPEN_RATE
            ),
        });
    } else if open_rate < BENCHMARK_OPEN_RATE * 0.8 {
        insights.push(Insight {
            kind: InsightKind::Warning,
            metric: "Open Rate".to_string(),
            message: format!(
                "Your open rate of {:.1}% is below industry average. Consider improving subject lines.",
                open_rate
            ),
        });
    }

    if click_rate > BENCHMARK_CLICK_RATE {
        insights.push(Insight {
            kind: InsightKind::Positive,
            metric: "Click Rate".to_string(),
            message: format!(
                "Your click rate of {:.1}% is above industry average ({}%)",
                click_rate, BENCHMARK_CLICK_RATE
            ),
        });
    } else if click_rate < BENCHMARK_CLICK_RATE * 0.8 {
        insights.push(Insight {
            kind: InsightKind::Warning,
            metric: "Click Rate".to_string(),
            message: format!(
                "Your click rate of {:.1}% is below average. Focus on improving email content and CTAs.",
                click_rate
            ),
        });
    }

    if bounce_rate > BENCHMARK_BOUNCE_RATE * 2.0 {
        insights.push(Insight {
            kind: InsightKind::Critical,
            metric: "Bounce Rate".to_string(),
            message: format!(
                "Your bounce rate of {:.1}% is high. Clean your email list to improve deliverability.",
                bounce_rate
            ),
        });
    }

    insights
}

/// Deliverability score out of 100
///
/// Delivered share of sends, with spam complaints penalized at double
/// weight. An empty log scores a clean 100.
pub fn deliverability_score(sent: u64, bounced: u64, spam_complaints: u64) -> f64 {
    if sent == 0 {
        return 100.0;
    }
    let delivered_rate = (sent - bounced.min(sent)) as f64 / sent as f64 * 100.0;
    let spam_rate = spam_complaints as f64 / sent as f64 * 100.0;
    round1((delivered_rate - spam_rate * 2.0).max(0.0))
}

/// Counters and rates for one hour or weekday slot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSlotStats {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
    pub open_rate: f64,
    pub click_rate: f64,
}

/// Send performance folded by hour of day and day of week, in UTC
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SendTimePerformance {
    /// Keyed by hour of day, 0 through 23; only hours with sends appear
    pub hourly: BTreeMap<u32, TimeSlotStats>,
    /// Keyed by weekday with Sunday as 0; only days with sends appear
    pub weekday: BTreeMap<u32, TimeSlotStats>,
}

pub fn send_time_performance(entries: &[EmailLogEntry]) -> SendTimePerformance {
    let mut perf = SendTimePerformance::default();

    for entry in entries {
        let hour = entry.timestamp.hour();
        let day = entry.timestamp.weekday().num_days_from_sunday();
        for slot in [
            perf.hourly.entry(hour).or_default(),
            perf.weekday.entry(day).or_default(),
        ] {
            slot.sent += 1;
            if entry.opened {
                slot.opened += 1;
            }
            if entry.clicked {
                slot.clicked += 1;
            }
        }
    }

    for slot in perf.hourly.values_mut().chain(perf.weekday.values_mut()) {
        slot.open_rate = percentage(slot.opened, slot.sent);
        slot.click_rate = percentage(slot.clicked, slot.sent);
    }
    perf
}

/// Cohort granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortPeriod {
    Daily,
    Weekly,
    Monthly,
}

/// Counters for one cohort bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortStats {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub unique_recipients: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

/// Fold entries into cohorts keyed by their send period
///
/// Weekly cohorts are keyed by the Sunday that starts the week, daily by
/// the send date, monthly by `YYYY-MM`.
pub fn cohorts(entries: &[EmailLogEntry], period: CohortPeriod) -> BTreeMap<String, CohortStats> {
    let mut buckets: BTreeMap<String, (CohortStats, HashSet<String>)> = BTreeMap::new();

    for entry in entries {
        let date = entry.timestamp.date_naive();
        let key = match period {
            CohortPeriod::Daily => date.format("%Y-%m-%d").to_string(),
            CohortPeriod::Weekly => {
                let week_start =
                    date - Duration::days(entry.timestamp.weekday().num_days_from_sunday() as i64);
                week_start.format("%Y-%m-%d").to_string()
            }
            CohortPeriod::Monthly => date.format("%Y-%m").to_string(),
        };

        let (stats, recipients) = buckets.entry(key).or_default();
        stats.sent += 1;
        recipients.insert(entry.recipient_email.clone());
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

    buckets
        .into_iter()
        .map(|(key, (mut stats, recipients))| {
            stats.unique_recipients = recipients.len() as u64;
            stats.open_rate = percentage(stats.opened, stats.sent);
            stats.click_rate = percentage(stats.clicked, stats.sent);
            stats.bounce_rate = percentage(stats.bounced, stats.sent);
            (key, stats)
        })
        .collect()
}
