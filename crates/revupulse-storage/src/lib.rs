//! RevuPulse Storage - Blob store and repositories
//!
//! This crate provides the keyed JSON blob store (the browser local-storage
//! equivalent) and the repositories built on top of it: email log, rate
//! limit state, and campaigns.

pub mod models;
pub mod repository;
pub mod store;

pub use models::*;
pub use repository::{CampaignRepository, EmailLogRepository, RateLimitRepository};
pub use store::{BlobStore, LocalBlobStore, MemoryBlobStore};
