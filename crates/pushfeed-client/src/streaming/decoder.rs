//! Classification of single stream lines

use pushfeed_core::{StreamRecord, DONE_SENTINEL};
use tracing::trace;

/// What one complete line of a streaming body means
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Blank line, comment, or a field other than `data`
    Ignored,
    /// The `[DONE]` terminator
    Done,
    /// A decoded record
    Record(StreamRecord),
    /// A `data` line whose payload could not be decoded
    Malformed(String),
}

/// Decode one line, already stripped of its terminator
pub fn decode_line(line: &[u8]) -> Line {
    if line.is_empty() {
        return Line::Ignored;
    }

    // Comment line (keepalive)
    if line.starts_with(b":") {
        trace!("Stream keepalive/comment");
        return Line::Ignored;
    }

    let line = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(_) => return Line::Malformed("invalid UTF-8 in stream line".into()),
    };

    let Some((field, value)) = line.split_once(':') else {
        trace!(field = line, "Stream line without value");
        return Line::Ignored;
    };
    if field != "data" {
        trace!(field, "Ignoring stream field");
        return Line::Ignored;
    }

    let payload = value.strip_prefix(' ').unwrap_or(value);
    if payload.trim_end() == DONE_SENTINEL {
        return Line::Done;
    }

    match serde_json::from_str::<StreamRecord>(payload) {
        Ok(record) => Line::Record(record),
        Err(e) => Line::Malformed(format!("{} (data: {})", e, preview(payload))),
    }
}

fn preview(payload: &str) -> &str {
    match payload.char_indices().nth(100) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}
