//! pushfeed-core - Wire models for the pushfeed ingestion layer
//!
//! This crate holds the message shapes exchanged between a dashboard backend
//! and the pushfeed client: inbound channel frames, the outbound subscription
//! message, and the records carried by chunked streaming responses.

pub mod error;
pub mod models;

pub use error::{FrameError, FrameResult};
pub use models::*;
