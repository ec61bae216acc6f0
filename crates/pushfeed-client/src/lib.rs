//! Pushfeed Client Library
//!
//! Server-push ingestion for monitoring dashboards: a reconnecting WebSocket
//! [`Channel`] that keeps a latest-value view per target, and a chunked
//! stream reader for incrementally generated text responses.
//!
//! # Example
//!
//! ```rust,no_run
//! use pushfeed_client::{Channel, PushfeedClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PushfeedClient::new("http://localhost:8080")?;
//!
//!     // Live updates over a reconnecting channel
//!     let channel = Channel::websocket(client.channel_config("/ws")?);
//!     channel.set_targets(["web-1", "db-1"]);
//!     channel.connect();
//!
//!     // Incremental text over a streaming request
//!     let outcome = client
//!         .stream_request(
//!             "/v1/stream",
//!             &serde_json::json!({ "prompt": "status summary" }),
//!             |delta, _| print!("{}", delta),
//!             |_| println!(),
//!             |err, _| eprintln!("stream failed: {}", err),
//!         )
//!         .await?;
//!     println!("{} ({})", outcome.text, outcome.status);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process backend and a scripted
//! connector:
//!
//! ```rust,ignore
//! use pushfeed_client::testing::{MockBackend, TestServer};
//!
//! let backend = MockBackend::new();
//! let server = TestServer::start(backend.router()).await?;
//! let channel = Channel::websocket(server.client.channel_config("/ws")?);
//! ```

pub mod channel;
mod client;
mod config;
mod error;
pub mod streaming;
pub mod testing;

pub use channel::{Channel, ChannelError, ChannelState, ListenerId};
pub use client::PushfeedClient;
pub use config::{BackoffConfig, ChannelConfig};
pub use error::{ClientError, Result};

// Re-export streaming types for convenience
pub use streaming::{read_stream, StreamError, StreamOutcome, StreamStatus};

// Re-export core types for convenience
pub use pushfeed_core::{Frame, StreamRecord, TargetId};
