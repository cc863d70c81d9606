//! CRLF line framing.
//!
//! The appliance terminates every JSON message with `\r\n` and uses no
//! other framing. Bytes are accumulated until the buffer as a whole ends
//! with the terminator; only then is it split into messages and cleared.
//! A buffer that ends mid-message is held untouched until more bytes
//! arrive.

use bytes::{Bytes, BytesMut};

use crate::error::Error;
use crate::message::Message;

/// Message terminator on the wire.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Upper bound on bytes held while waiting for a terminator. A peer that
/// exceeds it is treated as sending garbage.
pub const MAX_BUFFERED: usize = 8 * 1024 * 1024;

/// Accumulates incoming bytes and yields complete message strings.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: BytesMut,
    max_buffered: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFERED)
    }

    pub fn with_limit(max_buffered: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            max_buffered,
        }
    }

    /// Append a chunk and return every message it completes, in order.
    ///
    /// Returns an empty vec while the buffer does not end with the
    /// terminator. Fails if the completed buffer is not UTF-8 or if the
    /// held bytes exceed the limit; both are fatal to the connection.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, Error> {
        self.buffer.extend_from_slice(chunk);

        if !self.buffer.ends_with(TERMINATOR) {
            if self.buffer.len() > self.max_buffered {
                let held = self.buffer.len();
                self.buffer.clear();
                return Err(Error::InvalidFrame(format!(
                    "{held} bytes buffered without a terminator"
                )));
            }
            return Ok(Vec::new());
        }

        let data = self.buffer.split().freeze();
        let text = std::str::from_utf8(&data).map_err(|e| Error::InvalidFrame(e.to_string()))?;

        Ok(text
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Bytes currently held awaiting a terminator.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a message and append the terminator.
pub fn encode_frame(message: &Message) -> Result<Bytes, Error> {
    let mut buf = serde_json::to_vec(message)?;
    buf.extend_from_slice(TERMINATOR);
    Ok(Bytes::from(buf))
}
