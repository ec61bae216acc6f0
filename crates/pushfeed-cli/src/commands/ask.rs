//! Ask command - print a streamed response as it arrives

use anyhow::{bail, Result};
use pushfeed_client::streaming::{abort_pair, StreamObserver};
use pushfeed_client::{PushfeedClient, StreamError, StreamStatus};
use serde_json::json;
use std::io::Write;

use crate::output::{escape_csv, OutputContext, OutputFormat, StreamSummaryRow};

/// Prints increments in the selected format
struct Printer {
    format: OutputFormat,
}

impl StreamObserver for Printer {
    fn on_increment(&mut self, delta: &str, _accumulated: &str) {
        match self.format {
            OutputFormat::Table => {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            }
            OutputFormat::Json => println!("{}", json!({ "delta": delta })),
            OutputFormat::Csv => println!("{}", escape_csv(delta)),
        }
    }

    fn on_error(&mut self, error: &StreamError, partial: &str) {
        tracing::debug!(error = %error, received = partial.len(), "Stream interrupted");
    }
}

/// POST a prompt to the streaming endpoint and print increments
pub async fn ask(
    client: &PushfeedClient,
    path: &str,
    prompt: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let (handle, signal) = abort_pair();
    ctrlc::set_handler(move || handle.abort())?;

    if ctx.format == OutputFormat::Csv {
        println!("delta");
    }

    let body = json!({ "prompt": prompt, "stream": true });
    let mut printer = Printer { format: ctx.format };
    let outcome = client
        .stream_with(path, &body, &mut printer, Some(signal))
        .await?;

    if ctx.format == OutputFormat::Table {
        println!();
    }

    let summary = StreamSummaryRow {
        status: outcome.status.to_string(),
        chars: outcome.text.chars().count(),
        skipped: outcome.skipped,
    };
    if ctx.format == OutputFormat::Json && !ctx.quiet {
        ctx.print_json(&summary);
    }

    match outcome.status {
        StreamStatus::Errored => {
            let reason = outcome
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Stream failed after {} chars: {}", summary.chars, reason);
        }
        StreamStatus::Cancelled => ctx.warn("Cancelled"),
        StreamStatus::Completed | StreamStatus::Active => {
            if outcome.skipped > 0 {
                ctx.warn(&format!("Skipped {} malformed record(s)", outcome.skipped));
            }
            if ctx.format == OutputFormat::Table {
                ctx.success(&format!("Done ({} chars)", summary.chars));
            }
        }
    }

    Ok(())
}
