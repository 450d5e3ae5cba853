//! Repository layer
//!
//! Each repository owns one blob key, keeps the working copy in memory
//! behind a lock, and writes the whole blob back after every mutation.
//! A failed write degrades to unpersisted in-memory operation instead of
//! failing the caller.

pub mod campaigns;
pub mod email_log;
pub mod rate_limit;

pub use campaigns::CampaignRepository;
pub use email_log::EmailLogRepository;
pub use rate_limit::RateLimitRepository;
