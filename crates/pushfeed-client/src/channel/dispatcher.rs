//! Inbound frame dispatch
//!
//! Decodes raw channel messages, drops anything malformed, replaces the
//! target's entry in the latest-value store and notifies listeners.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pushfeed_core::Frame;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use super::listeners::Listeners;
use super::store::LatestValueStore;

/// Frame dispatcher shared between the channel driver and its handle
#[derive(Debug, Clone)]
pub struct FrameDispatcher {
    store: LatestValueStore,
    listeners: Listeners<Frame>,
    updates: broadcast::Sender<Frame>,
    accepted_types: Arc<HashSet<String>>,
    dropped: Arc<AtomicU64>,
}

impl FrameDispatcher {
    /// Create a dispatcher; an empty `accepted_types` accepts any tag
    pub fn new<I, S>(accepted_types: I, update_buffer: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (updates, _) = broadcast::channel(update_buffer.max(1));
        Self {
            store: LatestValueStore::new(),
            listeners: Listeners::new(),
            updates,
            accepted_types: Arc::new(accepted_types.into_iter().map(Into::into).collect()),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &LatestValueStore {
        &self.store
    }

    pub fn listeners(&self) -> &Listeners<Frame> {
        &self.listeners
    }

    /// New receiver of every accepted frame
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.updates.subscribe()
    }

    /// Number of frames dropped as malformed or unrecognized
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Process one raw inbound payload; invalid UTF-8 is dropped
    pub fn dispatch_bytes(&self, raw: &[u8]) -> Option<Frame> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.dispatch(text),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, len = raw.len(), "Dropping frame with invalid UTF-8");
                None
            }
        }
    }

    /// Process one raw inbound message
    ///
    /// Returns the accepted frame, or `None` if it was dropped.
    pub fn dispatch(&self, raw: &str) -> Option<Frame> {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, len = raw.len(), "Dropping malformed frame");
                return None;
            }
        };

        if !self.accepted_types.is_empty() && !self.accepted_types.contains(&frame.kind) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(kind = %frame.kind, target_id = %frame.target_id, "Dropping frame with unrecognized type");
            return None;
        }

        trace!(kind = %frame.kind, target_id = %frame.target_id, "Frame accepted");
        self.store.replace(frame.clone());
        self.listeners.emit(&frame);
        // No receivers is not an error
        let _ = self.updates.send(frame.clone());
        Some(frame)
    }
}
