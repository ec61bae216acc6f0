//! State of one streaming read

use tracing::{debug, warn};

use super::decoder::{decode_line, Line};
use super::line_buffer::LineBuffer;
use super::types::{StreamStatus, StreamUpdate};

/// Incremental decoder for one response body
///
/// Feed it raw chunks in order; it carries partial lines across chunk
/// boundaries and accumulates the text of every record. Once the status
/// leaves [`StreamStatus::Active`] further input is ignored.
#[derive(Debug)]
pub struct StreamSession {
    status: StreamStatus,
    text: String,
    lines: LineBuffer,
    records: usize,
    skipped: usize,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            status: StreamStatus::Active,
            text: String::new(),
            lines: LineBuffer::new(),
            records: 0,
            skipped: 0,
        }
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Records decoded so far, with or without content
    pub fn records(&self) -> usize {
        self.records
    }

    /// Record lines skipped as malformed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Process one chunk of the body
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        if self.status.is_terminal() {
            return updates;
        }

        for line in self.lines.push(chunk) {
            self.process_line(&line, &mut updates);
            if self.status.is_terminal() {
                break;
            }
        }
        updates
    }

    /// End of body: process any unterminated tail and complete
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        if self.status.is_terminal() {
            return updates;
        }

        if let Some(tail) = self.lines.take_tail() {
            debug!(len = tail.len(), "Processing unterminated final line");
            self.process_line(&tail, &mut updates);
        }
        if !self.status.is_terminal() {
            debug!(records = self.records, "Stream ended without sentinel");
            self.status = StreamStatus::Completed;
        }
        updates
    }

    /// Transport failed; the accumulated text is kept
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = StreamStatus::Errored;
        }
    }

    /// Stop consuming input; idempotent
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = StreamStatus::Cancelled;
        }
    }

    fn process_line(&mut self, line: &[u8], updates: &mut Vec<StreamUpdate>) {
        match decode_line(line) {
            Line::Ignored => {}
            Line::Done => {
                debug!(records = self.records, "Stream sentinel received");
                self.status = StreamStatus::Completed;
            }
            Line::Malformed(reason) => {
                self.skipped += 1;
                warn!(skipped = self.skipped, %reason, "Skipping malformed stream record");
            }
            Line::Record(record) => {
                self.records += 1;
                if let Some(error) = &record.error {
                    warn!(%error, "Server reported error in stream");
                }
                match record.content() {
                    Some(delta) if !delta.is_empty() => {
                        self.text.push_str(delta);
                        updates.push(StreamUpdate {
                            delta: delta.to_owned(),
                            accumulated_len: self.text.len(),
                        });
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCENARIO: &[u8] =
        b"data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\ndata: [DONE]\n\n";

    fn deltas(updates: &[StreamUpdate]) -> Vec<&str> {
        updates.iter().map(|u| u.delta.as_str()).collect()
    }

    #[test]
    fn test_split_record() {
        let mut session = StreamSession::new();
        let first = session.feed(b"data: {\"content\":\"Hel");
        assert!(first.is_empty());
        let second = session.feed(b"lo\"}\n\n");
        assert_eq!(deltas(&second), vec!["Hello"]);
        assert_eq!(session.text(), "Hello");
        assert_eq!(session.status(), StreamStatus::Active);
    }

    #[test]
    fn test_malformed_record_skipped() {
        let mut session = StreamSession::new();
        let updates = session.feed(b"data: {oops\n\ndata: {\"content\":\"ok\"}\n\n");
        assert_eq!(deltas(&updates), vec!["ok"]);
        assert_eq!(session.skipped(), 1);
        assert_eq!(session.status(), StreamStatus::Active);
    }

    #[test]
    fn test_sentinel_stops_processing() {
        let mut session = StreamSession::new();
        let updates =
            session.feed(b"data: {\"content\":\"a\"}\ndata: [DONE]\ndata: {\"content\":\"b\"}\n");
        assert_eq!(deltas(&updates), vec!["a"]);
        assert_eq!(session.status(), StreamStatus::Completed);

        assert!(session.feed(b"data: {\"content\":\"c\"}\n").is_empty());
        assert!(session.finish().is_empty());
        assert_eq!(session.text(), "a");
    }

    #[test]
    fn test_every_split_point_gives_same_text() {
        for split in 0..=SCENARIO.len() {
            let mut session = StreamSession::new();
            session.feed(&SCENARIO[..split]);
            session.feed(&SCENARIO[split..]);
            session.finish();
            assert_eq!(session.text(), "Hello", "split at {}", split);
            assert_eq!(session.status(), StreamStatus::Completed);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let body = "data: {\"content\":\"grüße \"}\ndata: {\"choices\":[{\"delta\":{\"content\":\"🌍\"}}]}\n";
        let mut session = StreamSession::new();
        let mut updates = Vec::new();
        for byte in body.as_bytes() {
            updates.extend(session.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(deltas(&updates), vec!["grüße ", "🌍"]);
        assert_eq!(updates[1].accumulated_len, session.text().len());
        assert_eq!(session.text(), "grüße 🌍");
    }

    #[test]
    fn test_unterminated_tail_processed_at_end() {
        let mut session = StreamSession::new();
        assert!(session.feed(b"data: {\"content\":\"last\"}").is_empty());
        let updates = session.finish();
        assert_eq!(deltas(&updates), vec!["last"]);
        assert_eq!(session.status(), StreamStatus::Completed);
    }

    #[test]
    fn test_records_without_content() {
        let mut session = StreamSession::new();
        let updates = session.feed(
            b"data: {\"content\":\"\"}\ndata: {\"role\":\"assistant\"}\ndata: {\"error\":\"overloaded\"}\n",
        );
        assert!(updates.is_empty());
        assert_eq!(session.records(), 3);
        assert_eq!(session.skipped(), 0);
    }

    #[test]
    fn test_fail_keeps_text() {
        let mut session = StreamSession::new();
        session.feed(b"data: {\"content\":\"partial\"}\n");
        session.fail();
        assert_eq!(session.status(), StreamStatus::Errored);
        assert_eq!(session.text(), "partial");
        assert!(session.feed(b"data: {\"content\":\"more\"}\n").is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent_and_terminal() {
        let mut session = StreamSession::new();
        session.cancel();
        session.cancel();
        session.fail();
        assert_eq!(session.status(), StreamStatus::Cancelled);
    }
}
