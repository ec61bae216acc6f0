//! Desired subscription set

use std::collections::BTreeSet;

use pushfeed_core::{ClientMessage, TargetId};

/// The caller's desired set of targets
///
/// The set is always sent whole (full-replace protocol), so a message lost
/// during an outage can never leave the peer with a stale delta applied.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    targets: BTreeSet<TargetId>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the desired set; returns whether it changed
    pub fn set_targets<I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = TargetId>,
    {
        let next: BTreeSet<TargetId> = ids.into_iter().collect();
        let changed = next != self.targets;
        self.targets = next;
        changed
    }

    pub fn targets(&self) -> Vec<TargetId> {
        self.targets.iter().cloned().collect()
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.contains(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The subscribe message carrying the full current set
    pub fn subscribe_message(&self) -> ClientMessage {
        ClientMessage::Subscribe {
            target_ids: self.targets(),
        }
    }
}
