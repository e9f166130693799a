use crate::error::Result;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Participant runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub subscription: SubscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Controls how arriving media is matched to publications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Delay between correlation attempts for an unmatched media track
    pub retry_interval_ms: u64,
    /// Number of retries after the initial attempt
    pub retry_budget: u32,
    /// Prefix of server issued track sids. Arrivals without it may be
    /// matched by kind instead.
    pub server_track_sid_prefix: String,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 150,
            retry_budget: 20,
            server_track_sid_prefix: "TR".to_string(),
        }
    }
}

impl SubscriptionConfig {
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided and present)
    /// 3. Defaults
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // LIVESYNC_SUBSCRIPTION__RETRY_BUDGET=40, LIVESYNC_LOGGING__LEVEL=debug
        builder = builder.add_source(
            Environment::with_prefix("LIVESYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_defaults() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.retry_interval(), Duration::from_millis(150));
        assert_eq!(config.retry_budget, 20);
        assert_eq!(config.server_track_sid_prefix, "TR");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Some("/nonexistent/livesync.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.subscription.retry_interval_ms, 150);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("livesync-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[subscription]\nretry_interval_ms = 50\nretry_budget = 3\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.subscription.retry_interval_ms, 50);
        assert_eq!(config.subscription.retry_budget, 3);
        assert_eq!(config.subscription.server_track_sid_prefix, "TR");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }
}
