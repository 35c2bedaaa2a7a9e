//! Runtime configuration read from the process environment.
//!
//! The only required value is the upstream API key. Everything else has a
//! default matching the service's historical behaviour.

use std::fmt::Display;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use thiserror::Error;
use url::Url;

/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";
/// Environment variable overriding the upstream base URL.
pub const BASE_URL_ENV: &str = "GROQ_BASE_URL";
/// Environment variable overriding the completion model.
pub const MODEL_ENV: &str = "GROQ_MODEL";
/// Environment variable overriding the listening port.
pub const PORT_ENV: &str = "CHAT_RELAY_PORT";
/// Environment variable overriding the upstream timeout, in seconds.
pub const UPSTREAM_TIMEOUT_ENV: &str = "CHAT_RELAY_UPSTREAM_TIMEOUT_SECS";
/// Environment variable enabling LRU eviction above a conversation count.
pub const MAX_CONVERSATIONS_ENV: &str = "CHAT_RELAY_MAX_CONVERSATIONS";

/// Default upstream base URL (Groq's OpenAI-compatible API).
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Default completion model.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
/// Default listening port.
pub const DEFAULT_PORT: u16 = 8000;
/// Default bound on a whole upstream call, streaming included.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration errors. All of them prevent startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The upstream API key is absent or blank.
    #[error("GROQ_API_KEY is not set")]
    MissingApiKey,
    /// A variable is present but cannot be used.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value as read.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings for the upstream completion service.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    api_key: Secret<String>,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Bound on one whole completion call.
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Create an upstream configuration with default endpoint, model and timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Expose the API key for request signing.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret().as_str()
    }
}

/// Top-level configuration for the relay.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Upstream completion settings.
    pub upstream: UpstreamConfig,
    /// TCP port bound on all interfaces.
    pub port: u16,
    /// Optional cap on stored conversations; `None` keeps every conversation.
    pub max_conversations: Option<NonZeroUsize>,
}

impl RelayConfig {
    /// Create a configuration with defaults around the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            upstream: UpstreamConfig::new(api_key),
            port: DEFAULT_PORT,
            max_conversations: None,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or any value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = read(API_KEY_ENV).ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(base_url) = read(BASE_URL_ENV) {
            config.upstream.base_url = base_url;
        }
        if let Some(model) = read(MODEL_ENV) {
            config.upstream.model = model;
        }
        if let Some(port) = parse_value::<u16>(PORT_ENV, read(PORT_ENV))? {
            config.port = port;
        }
        if let Some(secs) = parse_value::<u64>(UPSTREAM_TIMEOUT_ENV, read(UPSTREAM_TIMEOUT_ENV))? {
            config.upstream.timeout = Duration::from_secs(secs);
        }
        config.max_conversations =
            parse_value::<NonZeroUsize>(MAX_CONVERSATIONS_ENV, read(MAX_CONVERSATIONS_ENV))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the base URL is not an absolute URL or the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(err) = Url::parse(&self.upstream.base_url) {
            return Err(ConfigError::InvalidValue {
                key: BASE_URL_ENV,
                value: self.upstream.base_url.clone(),
                reason: err.to_string(),
            });
        }

        if self.upstream.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: UPSTREAM_TIMEOUT_ENV,
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_value<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map(|value| {
        value.parse::<T>().map_err(|err| ConfigError::InvalidValue {
            key,
            reason: err.to_string(),
            value,
        })
    })
    .transpose()
}
