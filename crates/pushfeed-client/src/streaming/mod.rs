//! Chunked streaming responses
//!
//! Reconstructs incrementally generated text from a body of `data: ` lines
//! delivered in arbitrary byte chunks. A `data: [DONE]` line ends the
//! response; malformed records are skipped.
//!
//! # Example
//!
//! ```no_run
//! use pushfeed_client::streaming::read_stream;
//! use futures::stream;
//!
//! # async fn example() {
//! let body = stream::iter(vec![
//!     Ok::<_, std::io::Error>(&b"data: {\"content\":\"Hel"[..]),
//!     Ok(&b"lo\"}\n\ndata: [DONE]\n\n"[..]),
//! ]);
//!
//! let outcome = read_stream(
//!     body,
//!     |delta, _text| print!("{}", delta),
//!     |text| println!("\ncomplete: {} bytes", text.len()),
//!     |err, partial| eprintln!("failed after {:?}: {}", partial, err),
//! )
//! .await;
//! assert_eq!(outcome.text, "Hello");
//! # }
//! ```

mod decoder;
mod line_buffer;
mod reader;
mod session;
mod types;

pub use decoder::{decode_line, Line};
pub use line_buffer::LineBuffer;
pub use reader::{
    abort_pair, read_stream, AbortHandle, AbortSignal, ChunkedStreamReader, FnObserver,
    StreamObserver,
};
pub use session::StreamSession;
pub use types::{StreamError, StreamOutcome, StreamResult, StreamStatus, StreamUpdate};
