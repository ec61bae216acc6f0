//! Watch command - live latest-value view over the push channel

use anyhow::{bail, Result};
use pushfeed_client::channel::Channel;
use pushfeed_client::{ChannelState, PushfeedClient};
use pushfeed_core::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::config::ChannelSettings;
use crate::output::{escape_csv, OutputContext, OutputFormat, UpdateRow};

/// Subscribe to targets and print every accepted frame until Ctrl+C
pub async fn watch(
    client: &PushfeedClient,
    targets: &[String],
    settings: &ChannelSettings,
    ctx: &OutputContext,
) -> Result<()> {
    let config = client
        .channel_config(&settings.path)?
        .with_backoff(settings.backoff.clone())
        .with_accepted_types(settings.accepted_types.iter().cloned());

    ctx.info(&format!(
        "Watching {} target(s) on {}...",
        targets.len(),
        config.url
    ));
    ctx.info("Press Ctrl+C to stop");

    let channel = Channel::websocket(config);
    let mut states = channel.state_changes();
    let mut updates = BroadcastStream::new(channel.updates());

    channel.set_targets(targets.iter().map(String::as_str));
    channel.connect();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    // For CSV, print header once
    if ctx.format == OutputFormat::Csv {
        println!("target,type,fields");
    }

    let mut failure = None;
    while running.load(Ordering::SeqCst) {
        tokio::select! {
            update = updates.next() => {
                match update {
                    Some(Ok(frame)) => print_update(&frame, ctx),
                    Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                        ctx.warn(&format!("Skipped {} update(s); showing latest only", missed));
                    }
                    None => break,
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                report_state(&state, ctx);
                if state == ChannelState::Closed {
                    failure = channel.failure();
                    break;
                }
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {
                // Check running flag periodically
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    channel.close();

    if let Some(err) = failure {
        bail!("Channel gave up: {}", err);
    }

    if ctx.format == OutputFormat::Table && !ctx.quiet {
        let mut rows: Vec<UpdateRow> = channel.snapshot().values().map(UpdateRow::from).collect();
        rows.sort_by(|a, b| a.target.cmp(&b.target));
        ctx.info("\nLatest values:");
        ctx.print_table(&rows);
    }
    ctx.success("Channel closed");

    Ok(())
}

fn report_state(state: &ChannelState, ctx: &OutputContext) {
    match state {
        ChannelState::Connected => ctx.success("Connected"),
        ChannelState::Reconnecting { attempt, delay } => ctx.warn(&format!(
            "Connection lost, retry {} in {}ms",
            attempt,
            delay.as_millis()
        )),
        other => ctx.info(&format!("Channel {}", other)),
    }
}

/// Print a frame in the appropriate format
fn print_update(frame: &Frame, ctx: &OutputContext) {
    match ctx.format {
        OutputFormat::Table => {
            let row = UpdateRow::from(frame);
            // Simple inline display for streaming
            println!("[{}] {}: {}", row.kind, row.target, row.fields);
        }
        OutputFormat::Json => {
            println!("{}", frame.encode());
        }
        OutputFormat::Csv => {
            let row = UpdateRow::from(frame);
            println!(
                "{},{},{}",
                escape_csv(&row.target),
                escape_csv(&row.kind),
                escape_csv(&row.fields)
            );
        }
    }
}
