//! Latest-value store

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use pushfeed_core::{Frame, TargetId};

/// Most recently accepted frame per target
///
/// Written only by the frame dispatcher; any number of readers get cloned
/// snapshots, never references into the live map.
#[derive(Debug, Clone, Default)]
pub struct LatestValueStore {
    inner: Arc<RwLock<HashMap<TargetId, Frame>>>,
}

impl LatestValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the frame's target with the whole frame
    pub(crate) fn replace(&self, frame: Frame) {
        self.inner.write().insert(frame.target_id.clone(), frame);
    }

    /// Latest frame for a target
    pub fn get(&self, id: &TargetId) -> Option<Frame> {
        self.inner.read().get(id).cloned()
    }

    /// Copy of the whole map
    pub fn snapshot(&self) -> HashMap<TargetId, Frame> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
