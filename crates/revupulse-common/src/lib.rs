//! RevuPulse Common - Shared types and utilities
//!
//! This crate provides the types, error taxonomy, configuration, and
//! credential handling shared by the RevuPulse storage and core crates.

pub mod config;
pub mod credentials;
pub mod error;
pub mod rates;
pub mod types;

pub use config::Config;
pub use credentials::CredentialSealer;
pub use error::{Error, Result};
