//! Configuration for the task store and its HTTP client
//!
//! Values come from environment variables, fall back to defaults and are
//! validated before use.
//!
//! | Variable                          | Default                 |
//! |-----------------------------------|-------------------------|
//! | `TASKLIST_API_URL`                | `http://10.0.2.2:3000`  |
//! | `TASKLIST_RESPONSE_TIMEOUT_SECS`  | `30`                    |
//! | `TASKLIST_CONNECT_TIMEOUT_SECS`   | `10`                    |
//! | `TASKLIST_SHUTDOWN_TIMEOUT_SECS`  | `5`                     |
//!
//! # Example
//!
//! ```no_run
//! use tasklist::TaskConfig;
//!
//! # fn main() -> Result<(), tasklist::ConfigError> {
//! let config = TaskConfig::from_env()?;
//! println!("API: {}", config.api_url);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable for the API base URL
pub const API_URL_VAR: &str = "TASKLIST_API_URL";
/// Environment variable for the per-operation response timeout
pub const RESPONSE_TIMEOUT_VAR: &str = "TASKLIST_RESPONSE_TIMEOUT_SECS";
/// Environment variable for the HTTP connect timeout
pub const CONNECT_TIMEOUT_VAR: &str = "TASKLIST_CONNECT_TIMEOUT_SECS";
/// Environment variable for how long shutdown waits for in-flight requests
pub const SHUTDOWN_TIMEOUT_VAR: &str = "TASKLIST_SHUTDOWN_TIMEOUT_SECS";

/// Host address of the development machine as seen from the Android emulator
pub const DEFAULT_API_URL: &str = "http://10.0.2.2:3000";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but does not parse
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Task store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Base URL of the task API, without trailing slash
    pub api_url: String,
    /// How long a store operation waits for its outcome, in seconds
    pub response_timeout_secs: u64,
    /// HTTP connect timeout, in seconds
    pub connect_timeout_secs: u64,
    /// How long shutdown waits for in-flight requests, in seconds
    pub shutdown_timeout_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            response_timeout_secs: 30,
            connect_timeout_secs: 10,
            shutdown_timeout_secs: 5,
        }
    }
}

impl TaskConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a variable does not parse or validation fails
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable does not parse or validation fails
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            api_url: lookup(API_URL_VAR).unwrap_or(defaults.api_url),
            response_timeout_secs: parse_var(&lookup, RESPONSE_TIMEOUT_VAR)?
                .unwrap_or(defaults.response_timeout_secs),
            connect_timeout_secs: parse_var(&lookup, CONNECT_TIMEOUT_VAR)?
                .unwrap_or(defaults.connect_timeout_secs),
            shutdown_timeout_secs: parse_var(&lookup, SHUTDOWN_TIMEOUT_VAR)?
                .unwrap_or(defaults.shutdown_timeout_secs),
        };

        config.normalized().validated()
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.normalized()
    }

    /// Per-operation response timeout
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// HTTP connect timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Shutdown drain timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api_url must start with http:// or https://, got {url:?}"
            )));
        }
        if url.trim_start_matches("http://").trim_start_matches("https://").is_empty() {
            return Err(ConfigError::Validation("api_url has no host".to_string()));
        }
        if self.response_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "response_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(var)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can unwrap
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = TaskConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, TaskConfig::default());
        assert_eq!(config.response_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn variables_override_defaults() {
        let config = TaskConfig::from_lookup(lookup_from(&[
            (API_URL_VAR, "https://tasks.example.com/"),
            (RESPONSE_TIMEOUT_VAR, "5"),
            (CONNECT_TIMEOUT_VAR, " 2 "),
            (SHUTDOWN_TIMEOUT_VAR, "8"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://tasks.example.com");
        assert_eq!(config.response_timeout_secs, 5);
        assert_eq!(config.connect_timeout_secs, 2);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn unparsable_value_is_reported() {
        let err = TaskConfig::from_lookup(lookup_from(&[(RESPONSE_TIMEOUT_VAR, "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var: RESPONSE_TIMEOUT_VAR, .. }
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_scheme = TaskConfig::default().with_api_url("ftp://host");
        assert!(bad_scheme.validate().is_err());

        let no_host = TaskConfig::default().with_api_url("http://");
        assert!(no_host.validate().is_err());

        let zero_timeout = TaskConfig {
            response_timeout_secs: 0,
            ..TaskConfig::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn with_api_url_strips_trailing_slash() {
        let config = TaskConfig::default().with_api_url("http://localhost:3000///");
        assert_eq!(config.api_url, "http://localhost:3000");
    }
}
