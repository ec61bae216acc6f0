//! Configuration file handling for pushfeed

use anyhow::{Context, Result};
use pushfeed_client::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

const DEFAULT_SERVER: &str = "http://localhost:8080";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default server URL
    pub server: Option<String>,
    /// Default output format
    pub output: Option<OutputFormat>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Bearer token for streaming requests
    pub token: Option<String>,
    /// Streaming endpoint path
    pub stream_path: Option<String>,
    /// Push channel settings
    #[serde(default)]
    pub channel: ChannelSettings,
}

/// `[channel]` table of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Channel path on the server
    #[serde(default = "default_channel_path")]
    pub path: String,
    /// Frame types to accept (empty = all)
    #[serde(default)]
    pub accepted_types: Vec<String>,
    /// Reconnect policy
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_channel_path() -> String {
    "/ws".to_string()
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            path: default_channel_path(),
            accepted_types: Vec::new(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("pushfeed");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        server: Option<&str>,
        output: Option<OutputFormat>,
        token: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            server: server
                .map(String::from)
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            output: output.or(self.output).unwrap_or_default(),
            no_color: no_color || self.no_color.unwrap_or(false),
            token: token.map(String::from).or_else(|| self.token.clone()),
            stream_path: self
                .stream_path
                .clone()
                .unwrap_or_else(|| "/v1/stream".to_string()),
            channel: self.channel.clone(),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub output: OutputFormat,
    pub no_color: bool,
    pub token: Option<String>,
    pub stream_path: String,
    pub channel: ChannelSettings,
}
