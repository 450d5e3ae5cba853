//! Configuration for RevuPulse

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Email provider configuration
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Persistent storage configuration
    #[serde(default)]
    pub storage: StorageSettings,

    /// Open/click tracking configuration
    #[serde(default)]
    pub tracking: TrackingSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            rate_limit: RateLimitSettings::default(),
            storage: StorageSettings::default(),
            tracking: TrackingSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Email provider settings
///
/// `api_key` is expected to be sealed at rest (see
/// [`crate::credentials::CredentialSealer`]) and opened only when the
/// dispatch facade parametrizes the provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider name: "SendGrid" or "Mailgun"
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Sealed API key
    #[serde(default)]
    pub api_key: String,

    /// Sender address
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// Sender display name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Sending domain (Mailgun)
    pub domain: Option<String>,

    /// Provider region (Mailgun EU, etc.)
    pub region: Option<String>,

    /// Send timeout in seconds
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            domain: None,
            region: None,
            timeout_secs: default_send_timeout(),
        }
    }
}

fn default_service_name() -> String {
    "SendGrid".to_string()
}

fn default_from_email() -> String {
    "reviews@localhost".to_string()
}

fn default_from_name() -> String {
    "RevuPulse".to_string()
}

fn default_send_timeout() -> u64 {
    30
}

/// Rate limiting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum sends per hourly window
    #[serde(default = "default_max_per_hour")]
    pub max_per_hour: u32,

    /// Interval of the background window-expiry check, in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_per_hour: default_max_per_hour(),
            tick_interval_secs: default_tick_interval(),
        }
    }
}

fn default_max_per_hour() -> u32 {
    300
}

fn default_tick_interval() -> u64 {
    60
}

/// Persistent storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the keyed JSON blobs
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./revupulse-data")
}

/// Tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Enable open-pixel and click-link rewriting
    #[serde(default = "default_tracking_enabled")]
    pub enabled: bool,

    /// Base URL of the tracking ingress
    #[serde(default = "default_tracking_base_url")]
    pub base_url: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: default_tracking_enabled(),
            base_url: default_tracking_base_url(),
        }
    }
}

fn default_tracking_enabled() -> bool {
    true
}

fn default_tracking_base_url() -> String {
    "http://localhost/api/tracking".to_string()
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations, falling back to defaults
    pub fn load() -> Self {
        let paths = [
            std::path::PathBuf::from("./revupulse.toml"),
            std::path::PathBuf::from("./config.toml"),
        ];

        for path in paths {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    }
                }
            }
        }

        Config::default()
    }

    /// Validate fields the dispatch facade depends on
    pub fn validate(&self) -> crate::Result<()> {
        if !crate::types::is_valid_email(&self.provider.from_email) {
            return Err(crate::Error::Validation(format!(
                "Invalid from_email: {}",
                self.provider.from_email
            )));
        }
        if self.rate_limit.max_per_hour == 0 {
            return Err(crate::Error::Validation(
                "max_per_hour must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_per_hour, 300);
        assert_eq!(config.rate_limit.tick_interval_secs, 60);
        assert_eq!(config.provider.service_name, "SendGrid");
        assert_eq!(config.provider.timeout_secs, 30);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[provider]
service_name = "Mailgun"
from_email = "reviews@acme.example"
from_name = "Acme Reviews"
domain = "mg.acme.example"

[rate_limit]
max_per_hour = 120

[storage]
path = "/data/revupulse"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.provider.service_name, "Mailgun");
        assert_eq!(config.provider.domain.as_deref(), Some("mg.acme.example"));
        assert_eq!(config.rate_limit.max_per_hour, 120);
        assert_eq!(config.rate_limit.tick_interval_secs, 60);
        assert_eq!(config.storage.path, PathBuf::from("/data/revupulse"));
    }

    #[test]
    fn test_validate_rejects_bad_from_email() {
        let mut config = Config::default();
        config.provider.from_email = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = Config::default();
        config.provider.from_email = "reviews@acme.example".to_string();
        config.rate_limit.max_per_hour = 0;
        assert!(config.validate().is_err());
    }
}
