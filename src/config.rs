//! Configuration module for loading and parsing TOML configuration files.

use crate::notifier::DeliveryError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable pointing at the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Dispatcher tunables.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Outbound notification endpoint.
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Which delivery failures are worth another attempt.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry every failure, including permanent 4xx rejections.
    #[default]
    AllFailures,
    /// Retry only 429, 5xx and transport errors.
    TransientOnly,
}

impl RetryPolicy {
    /// Returns true if `error` should be retried under this policy.
    #[must_use]
    pub fn should_retry(&self, error: &DeliveryError) -> bool {
        match self {
            Self::AllFailures => true,
            Self::TransientOnly => error.is_transient(),
        }
    }
}

/// Dispatcher tunables.
///
/// Durations are expressed in whole seconds in the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// At most one initial send per window.
    pub rate_limit_window_secs: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Capacity of the pending queue.
    pub max_queue_size: usize,
    /// Minimum absolute percentage move worth notifying about.
    pub min_percentage_change: f64,
    /// Per-subject cooldown, in rate-limit windows. Also the age at which
    /// queued requests are considered stale.
    pub cooldown_multiplier: u32,
    /// Retry classification.
    pub retry_policy: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_secs: 60,
            max_retries: 3,
            max_queue_size: 25,
            min_percentage_change: 5.0,
            cooldown_multiplier: 2,
            retry_policy: RetryPolicy::AllFailures,
        }
    }
}

impl DispatcherConfig {
    /// Global send window.
    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Per-subject suppression period.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.rate_limit_window()
            .saturating_mul(self.cooldown_multiplier)
    }

    /// Age after which a queued request is pruned.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.cooldown()
    }

    /// Delay before retrying a request whose attempt number `attempt` failed.
    ///
    /// Grows as `window × 2^attempt`: 60s, 120s, 240s with defaults.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.rate_limit_window().saturating_mul(factor)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "dispatcher rate_limit_window_secs must be positive".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::InvalidValue(
                "dispatcher max_queue_size must be positive".to_string(),
            ));
        }
        if !self.min_percentage_change.is_finite() || self.min_percentage_change < 0.0 {
            return Err(ConfigError::InvalidValue(
                "dispatcher min_percentage_change must be a non-negative number".to_string(),
            ));
        }
        if self.cooldown_multiplier == 0 {
            return Err(ConfigError::InvalidValue(
                "dispatcher cooldown_multiplier must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outbound notification endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// URL receiving one plain-text POST per delivery attempt.
    pub endpoint: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ntfy.sh/price-alerts".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl NotifierConfig {
    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Arguments
    /// * `content` - TOML content as string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from `CONFIG_PATH` (if set) and applies
    /// `HOST`, `PORT` and `NOTIFY_ENDPOINT` overrides.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or an override is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT must be a number: {port}")))?;
        }
        if let Ok(endpoint) = std::env::var("NOTIFY_ENDPOINT") {
            config.notifier.endpoint = endpoint;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        self.dispatcher.validate()?;

        if self.notifier.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "notifier endpoint cannot be empty".to_string(),
            ));
        }
        if self.notifier.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "notifier timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
