//! Outbound channel messages

use serde::{Deserialize, Serialize};

use super::TargetId;

/// Messages the client sends over the duplex channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Full replacement of the desired target set (never a delta)
    Subscribe { target_ids: Vec<TargetId> },
}

impl ClientMessage {
    /// Build a subscribe message from any collection of ids
    pub fn subscribe<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetId>,
    {
        Self::Subscribe {
            target_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Target ids carried by a subscribe message
    pub fn target_ids(&self) -> &[TargetId] {
        match self {
            Self::Subscribe { target_ids } => target_ids,
        }
    }
}
