//! Streaming line splitter
//!
//! Modems terminate output with CRLF while hosts terminate commands with a
//! bare CR, so either byte ends a line. Empty lines produced by CRLF pairs are
//! dropped.

/// Maximum line length (reasonable limit to prevent unbounded buffering)
pub const MAX_LINE_LEN: usize = 256;

/// Streaming line codec
#[derive(Debug, Default)]
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create a new line codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent buffer overflow from a peer that never terminates a line
        if self.buffer.len() > MAX_LINE_LEN * 4 {
            let start = self.buffer.len() - MAX_LINE_LEN;
            tracing::warn!("Line buffer overflow, dropping {} bytes", start);
            self.buffer.drain(..start);
        }
    }

    /// Try to extract the next complete, non-empty line (terminator stripped)
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let term_pos = self.buffer.iter().position(|&b| b == b'\r' || b == b'\n')?;
            let bytes: Vec<u8> = self.buffer.drain(..=term_pos).collect();
            let line = String::from_utf8_lossy(&bytes[..bytes.len() - 1]);
            let line = line.trim();
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
    }

    /// Number of buffered bytes not yet forming a line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
