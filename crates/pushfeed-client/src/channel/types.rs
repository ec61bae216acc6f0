//! Types for the reconnecting channel

use std::time::Duration;

use thiserror::Error;

/// Observable state of a [`Channel`](super::Channel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, never connected
    Disconnected,
    /// A physical connect is in flight
    Connecting,
    /// Socket open and subscriptions sent
    Connected,
    /// Waiting `delay` before retry number `attempt` (1-based)
    Reconnecting { attempt: u32, delay: Duration },
    /// Closed by the caller or after the retry budget ran out
    Closed,
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {} in {}ms)", attempt, delay.as_millis())
            }
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Errors produced by the channel and its transports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Physical connect failed
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Established socket failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Outbound message could not be encoded
    #[error("Failed to encode message: {0}")]
    Encode(String),

    /// Every allowed retry failed; the channel is closed for good
    #[error("Reconnect budget exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The channel driver is no longer running
    #[error("Channel closed")]
    Closed,
}

/// Result type for channel operations
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Handle returned by listener registration, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
