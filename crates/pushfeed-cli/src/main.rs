//! pushfeed - watch dashboard channels and streaming responses from a terminal

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pushfeed_client::PushfeedClient;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "pushfeed")]
#[command(author, version, about = "Pushfeed dashboard ingestion CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Backend URL [default: http://localhost:8080]
    #[arg(short, long, env = "PUSHFEED_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "PUSHFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Bearer token sent with streaming requests
    #[arg(long, env = "PUSHFEED_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch live updates for targets over the push channel
    Watch {
        /// Target ID(s) to subscribe to
        #[arg(required = true)]
        targets: Vec<String>,

        /// Channel path on the server
        #[arg(long)]
        path: Option<String>,

        /// Only accept frames of this type (repeatable)
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Reconnect attempts before giving up
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Send a prompt and print the streamed response
    Ask {
        /// Prompt text
        prompt: String,

        /// Streaming endpoint path on the server
        #[arg(long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.output,
        cli.token.as_deref(),
        cli.no_color,
    );

    // Create output context
    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);
    let client = create_client(&merged)?;

    // Execute command
    match &cli.command {
        Commands::Watch {
            targets,
            path,
            types,
            max_attempts,
        } => {
            let mut channel = merged.channel.clone();
            if let Some(path) = path {
                channel.path = path.clone();
            }
            if !types.is_empty() {
                channel.accepted_types = types.clone();
            }
            if let Some(max_attempts) = max_attempts {
                channel.backoff.max_attempts = *max_attempts;
            }
            commands::watch(&client, targets, &channel, &ctx).await?;
        }

        Commands::Ask { prompt, path } => {
            let path = path.as_deref().unwrap_or(&merged.stream_path);
            commands::ask(&client, path, prompt, &ctx).await?;
        }
    }

    Ok(())
}

/// Create a client for the merged server settings
fn create_client(merged: &MergedConfig) -> Result<PushfeedClient> {
    match &merged.token {
        Some(token) => PushfeedClient::with_bearer_token(&merged.server, token),
        None => PushfeedClient::new(&merged.server),
    }
    .context("Failed to create pushfeed client")
}
