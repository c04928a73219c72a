//! Acknowledgment codec for command mode replies.
//!
//! The module answers every command mode request with text terminated by
//! `\r`. Success is the literal `OK\r`; a register query replies with the
//! value, and the trailing `ATCN` adds its own `OK\r`:
//!
//! ```text
//! 7FFF\rOK\r
//! ```

use bytes::BytesMut;

/// Literal acknowledgment sent by the module.
pub const OK_ACK: &[u8] = b"OK\r";

/// Accumulates command mode output until an acknowledgment arrives.
#[derive(Debug, Default)]
pub struct AckCodec {
    buffer: BytesMut,
}

impl AckCodec {
    /// Create an empty codec.
    pub fn new() -> Self {
        AckCodec {
            buffer: BytesMut::with_capacity(64),
        }
    }

    /// Add received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Whether the last bytes received are `OK\r`.
    pub fn is_acknowledged(&self) -> bool {
        self.buffer.ends_with(OK_ACK)
    }

    /// Take everything before the final `\rOK\r` once acknowledged.
    ///
    /// Returns `None` and keeps the buffer if no acknowledgment arrived yet.
    pub fn take_reply(&mut self) -> Option<Vec<u8>> {
        if !self.is_acknowledged() {
            return None;
        }
        let mut end = self.buffer.len() - OK_ACK.len();
        if end > 0 && self.buffer[end - 1] == b'\r' {
            end -= 1;
        }
        let reply = self.buffer[..end].to_vec();
        self.buffer.clear();
        Some(reply)
    }

    /// Number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
