//! Process-wide query defaults.
//!
//! Chains fall back to these values for every option they do not override.
//! The defaults are installed at most once per process; if nothing is
//! installed the first read freezes the environment-derived config.

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on polling (1 second)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default interval between real-time ticks (10ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Environment variable overriding [`QueryConfig::timeout_ms`]
pub const ENV_TIMEOUT_MS: &str = "PROBAR_QUERY_TIMEOUT_MS";

/// Environment variable overriding [`QueryConfig::poll_interval_ms`]
pub const ENV_POLL_INTERVAL_MS: &str = "PROBAR_QUERY_POLL_INTERVAL_MS";

/// Environment variable overriding [`QueryConfig::visible_only`]
pub const ENV_VISIBLE_ONLY: &str = "PROBAR_QUERY_VISIBLE_ONLY";

static DEFAULTS: OnceLock<QueryConfig> = OnceLock::new();

/// Errors loading or installing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Defaults were already installed or already read
    #[error("query defaults already installed")]
    AlreadyInstalled,

    /// An environment variable held an unusable value
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Offending value
        value: String,
    },

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Query defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Upper bound on total polling, in milliseconds
    pub timeout_ms: u64,
    /// Interval between real-time ticks, in milliseconds
    pub poll_interval_ms: u64,
    /// Whether selection drops items the tree reports as hidden
    pub visible_only: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            visible_only: true,
        }
    }
}

impl QueryConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set visibility filtering
    #[must_use]
    pub const fn with_visible_only(mut self, visible_only: bool) -> Self {
        self.visible_only = visible_only;
        self
    }

    /// Timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Defaults overlaid with `PROBAR_QUERY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse YAML; missing keys take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = parse_value(ENV_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = parse_value(ENV_POLL_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_VISIBLE_ONLY) {
            config.visible_only = match value.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid(ENV_VISIBLE_ONLY, &value)),
            };
        }
        Ok(config)
    }
}

fn parse_value(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Install process-wide defaults
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyInstalled`] if defaults were installed or
/// read before.
pub fn install(config: QueryConfig) -> Result<(), ConfigError> {
    DEFAULTS
        .set(config)
        .map_err(|_| ConfigError::AlreadyInstalled)?;
    tracing::debug!(?config, "installed query defaults");
    Ok(())
}

/// Process-wide defaults
///
/// Falls back to [`QueryConfig::from_env`], or to the built-in defaults if
/// the environment is unusable.
pub fn defaults() -> QueryConfig {
    *DEFAULTS.get_or_init(|| {
        QueryConfig::from_env().unwrap_or_else(|error| {
            tracing::warn!(%error, "ignoring query configuration from environment");
            QueryConfig::default()
        })
    })
}
