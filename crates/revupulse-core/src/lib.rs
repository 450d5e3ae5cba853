//! RevuPulse Core - dispatch, rate limiting, and engagement analytics
//!
//! This crate provides the core services for RevuPulse: the hourly
//! fixed-window rate limiter with its deferred-send queue, the dispatch
//! facade over pluggable email providers, webhook event translation, and
//! the analytics engine that folds the email log into dashboard metrics.

pub mod analytics;
pub mod campaigns;
pub mod dispatch;
pub mod events;
pub mod limiter;

pub use analytics::AnalyticsEngine;
pub use campaigns::CampaignManager;
pub use dispatch::{DispatchOutcome, Dispatcher, EmailProvider, ProviderReceipt, SendPayload, SimulatedProvider};
pub use events::WebhookProcessor;
pub use limiter::{ExpiryTaskHandle, RateLimitStatus, RateLimiter, SendPermit};
