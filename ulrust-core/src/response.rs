//! Response reassembly
//!
//! Responses arrive as encrypted 16-byte chunks on the data characteristic.
//! [`ResponseFrame`] accumulates decrypted chunks until the declared length is
//! reached. [`ResponseAssembler`] ties it to a session key and hands back one
//! [`Response`] per completed, valid frame.

use std::fmt;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::{
    checksum,
    cipher::SessionKey,
    command::ResponseCode,
    constants::{BLOCK_SIZE, COMMAND_OFFSET, FRAME_MARKER, MAX_FRAME_SIZE, PAYLOAD_OFFSET},
    error::{Error, Result},
};

/// Decrypted bytes of a frame in flight
#[derive(Debug, Default, Clone)]
pub struct ResponseFrame {
    buf: BytesMut,
}

impl ResponseFrame {
    /// Create an empty frame buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decrypted chunk
    ///
    /// A chunk is accepted only if it starts a frame (empty buffer, leading
    /// marker) or continues one already started. Returns whether it was kept.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let starts_frame = self.buf.is_empty() && chunk.first() == Some(&FRAME_MARKER);
        let continues_frame = self.buf.first() == Some(&FRAME_MARKER);

        if starts_frame || continues_frame {
            self.buf.extend_from_slice(chunk);
            true
        } else {
            false
        }
    }

    /// Bytes accumulated so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been accumulated
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Declared length from bytes 1-2, zero until the header is in
    pub fn data_len(&self) -> usize {
        if self.buf.len() > COMMAND_OFFSET {
            usize::from(u16::from_le_bytes([self.buf[1], self.buf[2]]))
        } else {
            0
        }
    }

    /// Full frame length including marker, length field and CRC
    pub fn package_len(&self) -> usize {
        if self.buf.len() > COMMAND_OFFSET {
            self.data_len() + 3
        } else {
            0
        }
    }

    /// Raw command byte, once the header is in
    pub fn command_byte(&self) -> Option<u8> {
        self.buf.get(COMMAND_OFFSET).copied()
    }

    /// Check if the declared length has been reached
    pub fn is_completed(&self) -> bool {
        self.buf.len() > COMMAND_OFFSET && self.buf.len() >= self.package_len()
    }

    /// Check if the declared length exceeds the largest frame a lock sends
    pub fn is_oversized(&self) -> bool {
        self.package_len() > MAX_FRAME_SIZE
    }

    /// Check if the frame is complete and carries a known response code
    pub fn is_valid(&self) -> bool {
        self.is_completed()
            && self
                .command_byte()
                .is_some_and(|b| ResponseCode::try_from(b).is_ok())
    }

    /// Check the trailing CRC of a completed frame
    pub fn crc_matches(&self) -> bool {
        let package_len = self.package_len();
        if !self.is_completed() || package_len < PAYLOAD_OFFSET {
            return false;
        }
        let crc = self.buf[package_len - 1];
        checksum::verify(&self.buf[COMMAND_OFFSET..package_len - 1], crc)
    }

    /// Payload bytes: everything between the command byte and the CRC
    pub fn data(&self) -> Bytes {
        if !self.is_completed() {
            return Bytes::new();
        }
        let end = PAYLOAD_OFFSET + self.data_len().saturating_sub(2);
        let end = end.min(self.package_len().saturating_sub(1)).max(PAYLOAD_OFFSET);
        Bytes::copy_from_slice(&self.buf[PAYLOAD_OFFSET..end])
    }

    /// Discard everything
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

/// A decoded response
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    /// Response code
    pub code: ResponseCode,

    /// Payload between the command byte and the CRC
    pub data: Bytes,
}

impl Response {
    /// Create a response
    pub fn new(code: ResponseCode, data: impl Into<Bytes>) -> Self {
        Self {
            code,
            data: data.into(),
        }
    }

    /// Status byte of an acknowledgement
    pub fn status(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Check if the lock reported success
    ///
    /// Only acknowledgements carry a status. An empty acknowledgement counts
    /// as success.
    pub fn is_success(&self) -> bool {
        !self.code.is_acknowledgement() || self.status().is_none_or(|s| s == 0)
    }

    /// Payload byte at `index`
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Little-endian u16 starting at `index`
    pub fn u16_le(&self, index: usize) -> Option<u16> {
        let bytes = self.data.get(index..index + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response[{}](len={})", self.code, self.data.len())
    }
}

/// Decrypts notifications and reassembles them into responses
#[derive(Debug)]
pub struct ResponseAssembler {
    key: SessionKey,
    frame: ResponseFrame,
    verify_crc: bool,
}

impl ResponseAssembler {
    /// Create an assembler for one connection
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            frame: ResponseFrame::new(),
            verify_crc: false,
        }
    }

    /// Discard completed frames whose CRC does not match
    pub fn with_crc_check(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Frame in flight
    pub fn frame(&self) -> &ResponseFrame {
        &self.frame
    }

    /// Feed one notification
    ///
    /// Returns `Ok(Some(_))` when a frame completes, `Ok(None)` while more
    /// chunks are needed or the chunk was not part of a frame.
    ///
    /// # Errors
    ///
    /// - [`Error::BlockLength`] if the notification is not whole chunks (the
    ///   frame in flight is kept).
    /// - [`Error::ProtocolDesync`] if a frame declares an impossible length or
    ///   completed but is unusable. The buffer is reset either way.
    pub fn on_notify(&mut self, notification: &[u8]) -> Result<Option<Response>> {
        let plain = self.key.decrypt(notification)?;

        for chunk in plain.chunks_exact(BLOCK_SIZE) {
            if !self.frame.push(chunk) {
                trace!(chunk = %hex::encode(chunk), "Dropped chunk outside a frame");
                continue;
            }

            if self.frame.is_oversized() {
                let command = self.frame.command_byte().unwrap_or_default();
                debug!(declared = self.frame.package_len(), "Dropped frame with oversized length");
                self.frame.reset();
                return Err(Error::ProtocolDesync {
                    command,
                    reason: "declared length too large",
                });
            }

            if self.frame.is_completed() {
                let result = self.take();
                self.frame.reset();
                return result.map(Some);
            }
        }

        Ok(None)
    }

    fn take(&self) -> Result<Response> {
        let command = self.frame.command_byte().unwrap_or_default();

        let code = ResponseCode::try_from(command).map_err(|_| Error::ProtocolDesync {
            command,
            reason: "unknown response code",
        })?;

        if self.verify_crc && !self.frame.crc_matches() {
            return Err(Error::ProtocolDesync {
                command,
                reason: "CRC mismatch",
            });
        }

        let response = Response::new(code, self.frame.data());
        debug!(code = %response.code, data = %hex::encode(&response.data), "Assembled response");
        Ok(response)
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.frame.reset();
    }
}
