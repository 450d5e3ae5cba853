//! Percentage helpers shared by stats and analytics
//!
//! All outward-facing rates are percentages rounded to one decimal place
//! and zero-guarded: a zero denominator yields 0, never NaN.

/// Percentage of `count` over `total`, one decimal, 0 when `total` is 0
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(count as f64 / total as f64 * 100.0)
}

/// Round to one decimal place (matches the dashboard's display precision)
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
