//! Configuration for [`HttpRequester`](crate::HttpRequester).
//!
//! # Example
//!
//! ```rust
//! use composable_request_runtime::RequesterConfig;
//! use std::time::Duration;
//!
//! let config = RequesterConfig::default()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_max_response_bytes(1024 * 1024)
//!     .with_header_field("X-Client", "reader");
//! assert_eq!(config.timeout, Duration::from_secs(5));
//! ```

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`RequesterConfig::timeout`], in seconds.
pub const TIMEOUT_ENV: &str = "COMPOSABLE_REQUEST_TIMEOUT_SECS";
/// Environment variable overriding [`RequesterConfig::user_agent`].
pub const USER_AGENT_ENV: &str = "COMPOSABLE_REQUEST_USER_AGENT";
/// Environment variable overriding [`RequesterConfig::max_response_bytes`].
pub const MAX_RESPONSE_BYTES_ENV: &str = "COMPOSABLE_REQUEST_MAX_RESPONSE_BYTES";

/// Errors raised while loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

/// Settings applied to every request an [`HttpRequester`](crate::HttpRequester) executes.
///
/// # Default Values
///
/// - `timeout`: 30 seconds
/// - `user_agent`: `composable-request/<version>`
/// - `header_fields`: none
/// - `max_response_bytes`: 50 MiB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterConfig {
    /// Total time allowed per request
    pub timeout: Duration,
    /// `User-Agent` sent with every request
    pub user_agent: String,
    /// Header fields added unless the request sets them itself
    pub header_fields: BTreeMap<String, String>,
    /// Responses larger than this fail with a transport error
    pub max_response_bytes: usize,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("composable-request/", env!("CARGO_PKG_VERSION")).to_string(),
            header_fields: BTreeMap::new(),
            max_response_bytes: 50 * 1024 * 1024,
        }
    }
}

impl RequesterConfig {
    /// Defaults overridden by the `COMPOSABLE_REQUEST_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(TIMEOUT_ENV) {
            config.timeout = Duration::from_secs(parse(TIMEOUT_ENV, value)?);
        }
        if let Some(value) = lookup(USER_AGENT_ENV) {
            config.user_agent = value;
        }
        if let Some(value) = lookup(MAX_RESPONSE_BYTES_ENV) {
            config.max_response_bytes = parse(MAX_RESPONSE_BYTES_ENV, value)?;
        }
        Ok(config)
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent`
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header field
    #[must_use]
    pub fn with_header_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_fields.insert(key.into(), value.into());
        self
    }

    /// Set the maximum accepted response size
    #[must_use]
    pub const fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}
