//! Engine configuration.
//!
//! Configuration is built in code with [`EngineConfig::default`] and the
//! `with_*` methods, or loaded once at startup from the environment with
//! [`EngineConfig::from_env`] (a `.env` file is honored if present).
//!
//! # Environment Variables
//!
//! | Variable                            | Meaning                         | Default |
//! |-------------------------------------|---------------------------------|---------|
//! | `RECONCILER_GRACE_WINDOW_MS`        | grace window in milliseconds    | 2000    |
//! | `RECONCILER_REFRESH_AFTER_MUTATION` | refresh after a confirmed action| true    |
//! | `RECONCILER_REFRESH_INTERVAL_MS`    | periodic refresh, 0 disables    | 0       |
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use reconciler::config::EngineConfig;
//!
//! let config = EngineConfig::default()
//!     .with_grace_window(Duration::from_millis(500))
//!     .with_refresh_after_mutation(false);
//!
//! assert!(config.validate().is_ok());
//! ```

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Environment variable holding the grace window in milliseconds.
pub const GRACE_WINDOW_VAR: &str = "RECONCILER_GRACE_WINDOW_MS";
/// Environment variable toggling refresh after a confirmed action.
pub const REFRESH_AFTER_MUTATION_VAR: &str = "RECONCILER_REFRESH_AFTER_MUTATION";
/// Environment variable holding the periodic refresh interval in milliseconds.
pub const REFRESH_INTERVAL_VAR: &str = "RECONCILER_REFRESH_INTERVAL_MS";

/// Default grace window.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(2);

/// Configuration error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The name of the environment variable.
        key: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// The grace window is zero.
    #[error("grace window must be greater than zero")]
    ZeroGraceWindow,
}

/// Tunables shared by every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long after a confirmed mutation a server snapshot is presumed
    /// possibly stale for that record.
    pub grace_window: Duration,
    /// Whether a confirmed action triggers a collection refresh.
    pub refresh_after_mutation: bool,
    /// Interval for periodic refresh, if any.
    pub refresh_interval: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_window: DEFAULT_GRACE_WINDOW,
            refresh_after_mutation: true,
            refresh_interval: None,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot
    /// be parsed, and [`ConfigError::ZeroGraceWindow`] if the resulting
    /// configuration does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors if file doesn't exist)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let grace_window = parse_millis(&lookup, GRACE_WINDOW_VAR)?.unwrap_or(defaults.grace_window);
        let refresh_after_mutation = lookup(REFRESH_AFTER_MUTATION_VAR)
            .map(|value| parse_flag(REFRESH_AFTER_MUTATION_VAR, &value))
            .transpose()?
            .unwrap_or(defaults.refresh_after_mutation);
        let refresh_interval = parse_millis(&lookup, REFRESH_INTERVAL_VAR)?
            .filter(|interval| !interval.is_zero())
            .or(defaults.refresh_interval);

        let config = Self {
            grace_window,
            refresh_after_mutation,
            refresh_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the grace window.
    #[must_use]
    pub const fn with_grace_window(mut self, grace_window: Duration) -> Self {
        self.grace_window = grace_window;
        self
    }

    /// Enables or disables refresh after a confirmed action.
    #[must_use]
    pub const fn with_refresh_after_mutation(mut self, enabled: bool) -> Self {
        self.refresh_after_mutation = enabled;
        self
    }

    /// Sets the periodic refresh interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Checks the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroGraceWindow`] for a zero grace window: every
    /// refresh would clobber confirmed changes the server has not caught up to.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_window.is_zero() {
            return Err(ConfigError::ZeroGraceWindow);
        }
        Ok(())
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|error| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: error.to_string(),
                })
        })
        .transpose()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
