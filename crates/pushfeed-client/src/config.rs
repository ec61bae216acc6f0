//! Channel configuration
//!
//! All settings have defaults, so an empty TOML document is a valid
//! configuration once a `url` is supplied.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Configuration for a [`Channel`](crate::channel::Channel)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint (e.g. "ws://localhost:8080/ws")
    #[serde(default)]
    pub url: String,
    /// Reconnect backoff policy
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Frame type tags the dispatcher accepts (empty = any non-empty tag)
    #[serde(default)]
    pub accepted_types: Vec<String>,
    /// Capacity of the broadcast channel returned by `Channel::updates`
    #[serde(default = "default_update_buffer")]
    pub update_buffer: usize,
}

fn default_update_buffer() -> usize {
    256
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            backoff: BackoffConfig::default(),
            accepted_types: Vec::new(),
            update_buffer: default_update_buffer(),
        }
    }
}

impl ChannelConfig {
    /// Configuration for the given endpoint with default policy
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Restrict the dispatcher to the given frame types
    pub fn with_accepted_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the backoff policy
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))
    }
}

/// Reconnect backoff policy
///
/// The delay before retry `n` (0-based) is `min(base * 2^n, max)` plus up to
/// `jitter_ms` of jitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound of the delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Number of retries scheduled before the channel gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Maximum random jitter added to each delay, in milliseconds
    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter_ms: 0,
        }
    }
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}
