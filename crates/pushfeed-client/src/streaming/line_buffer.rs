//! Incremental newline tokenizer
//!
//! Works on bytes so a multi-byte character split across two chunks is
//! joined again before anything is decoded.

/// Splits a chunked byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Bytes after the last newline seen
    tail: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes
    ///
    /// Lines are returned without the `\n` terminator or a preceding `\r`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.tail.extend_from_slice(chunk);

        let Some(last_newline) = self.tail.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.tail.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.tail, rest);

        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|line| strip_cr(line).to_vec())
            .collect()
    }

    /// Bytes not yet terminated by a newline
    pub fn tail(&self) -> &[u8] {
        &self.tail
    }

    /// Take the unterminated remainder, leaving the buffer empty
    pub fn take_tail(&mut self) -> Option<Vec<u8>> {
        if self.tail.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.tail);
        Some(strip_cr(&tail).to_vec())
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
