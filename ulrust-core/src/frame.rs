//! Lock protocol frame structure and encoding

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::trace;

use crate::{
    checksum,
    command::CommandCode,
    constants::{AUTH_BLOCK_SIZE, BLOCK_SIZE, COMMAND_OFFSET, FRAME_MARKER, MAX_FRAME_SIZE},
    error::{Error, Result},
};

/// User credentials carried in the auth block
///
/// The admin password is a string of decimal digits. Its numeric value is
/// sent little-endian with the digit count packed into the top nibble, so
/// that leading zeros survive the trip.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    uid: u32,
    password: String,
    value: u32,
}

impl Credentials {
    /// Largest password value that leaves the length nibble free
    pub const MAX_PASSWORD_VALUE: u32 = 0x0FFF_FFFF;

    /// Longest password whose digit count fits the length nibble
    pub const MAX_PASSWORD_DIGITS: usize = 9;

    /// Create credentials
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPassword`] if the password is empty, contains
    /// anything but ASCII digits, has more than nine digits, or does not fit
    /// in 28 bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use ulrust_core::Credentials;
    ///
    /// let creds = Credentials::new(1, "0042").unwrap();
    /// assert_eq!(creds.password_block(), [42, 0, 0, 0x40]);
    ///
    /// assert!(Credentials::new(1, "12ab").is_err());
    /// ```
    pub fn new(uid: u32, password: impl Into<String>) -> Result<Self> {
        let password = password.into();

        if password.is_empty() || !password.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPassword("must be decimal digits".into()));
        }

        if password.len() > Self::MAX_PASSWORD_DIGITS {
            return Err(Error::InvalidPassword(format!(
                "{} digits is too long",
                password.len()
            )));
        }

        let value: u32 = password
            .parse()
            .map_err(|_| Error::InvalidPassword(format!("'{}' is not a number", password)))?;

        if value > Self::MAX_PASSWORD_VALUE {
            return Err(Error::InvalidPassword(format!(
                "value exceeds 0x{:08X}",
                Self::MAX_PASSWORD_VALUE
            )));
        }

        Ok(Self { uid, password, value })
    }

    /// User id
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Admin password as entered on the keypad
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The four password bytes of the auth block
    pub fn password_block(&self) -> [u8; 4] {
        let mut block = self.value.to_le_bytes();
        block[3] |= (self.password.len() as u8) << 4;
        block
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lock protocol request frame
///
/// # Frame Structure
///
/// ```text
/// ┌────────┬─────────────┬─────────┬──────────────────┬───────────┬────────┐
/// │ Marker │   Length    │ Command │ Auth (optional)  │  Payload  │  CRC8  │
/// │  0x7F  │  2 bytes    │ 1 byte  │ uid LE │ pw LE   │  N bytes  │ 1 byte │
/// │        │  (LE u16)   │         │ 4 B    │ 4 B     │           │        │
/// └────────┴─────────────┴─────────┴──────────────────┴───────────┴────────┘
/// ```
///
/// The length field counts everything after it up to, but not including,
/// the CRC. The CRC covers the command byte through the end of the payload.
///
/// # Examples
///
/// ```
/// use ulrust_core::{CommandCode, Frame};
///
/// let frame = Frame::new(CommandCode::GetBattery);
/// let encoded = frame.encode().unwrap();
/// assert_eq!(encoded.as_ref(), &[0x7F, 0x02, 0x00, 0x43, 0xA4]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code
    pub command: CommandCode,

    /// Auth block source, if the frame carries one
    pub auth: Option<Credentials>,

    /// Command-specific data
    pub payload: Bytes,
}

impl Frame {
    /// Marker, length and command
    pub const HEADER_SIZE: usize = 4;

    /// Create a frame with no auth block and empty payload
    pub fn new(command: CommandCode) -> Self {
        Self {
            command,
            auth: None,
            payload: Bytes::new(),
        }
    }

    /// Attach the auth block
    pub fn with_auth(mut self, credentials: Credentials) -> Self {
        self.auth = Some(credentials);
        self
    }

    /// Set the payload
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Size of the encoded frame
    pub fn size(&self) -> usize {
        let auth = if self.auth.is_some() { AUTH_BLOCK_SIZE } else { 0 };
        Self::HEADER_SIZE + auth + self.payload.len() + 1
    }

    /// Encode frame to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if the frame exceeds the lock's buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let size = self.size();
        if size > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(size);

        buf.put_u8(FRAME_MARKER);
        buf.put_u16_le(0); // Length placeholder
        buf.put_u8(self.command.into());

        if let Some(auth) = &self.auth {
            buf.put_u32_le(auth.uid());
            buf.put_slice(&auth.password_block());
        }

        buf.put_slice(&self.payload);

        let declared = (buf.len() - 2) as u16;
        buf[1..3].copy_from_slice(&declared.to_le_bytes());

        let crc = checksum::calculate(&buf[COMMAND_OFFSET..]);
        buf.put_u8(crc);

        trace!(command = %self.command, frame = %hex::encode(&buf), "Encoded frame");

        Ok(buf.freeze())
    }
}

/// Split an encoded frame into zero-padded transport chunks
///
/// # Examples
///
/// ```
/// use ulrust_core::frame::chunk;
///
/// let chunks = chunk(&[0x7F; 17]);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1][0], 0x7F);
/// assert_eq!(chunks[1][1..], [0u8; 15]);
/// ```
pub fn chunk(frame: &[u8]) -> Vec<[u8; BLOCK_SIZE]> {
    frame
        .chunks(BLOCK_SIZE)
        .map(|piece| {
            let mut block = [0u8; BLOCK_SIZE];
            block[..piece.len()].copy_from_slice(piece);
            block
        })
        .collect()
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("command", &self.command)
            .field("auth", &self.auth)
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](auth={}, len={})",
            self.command,
            self.auth.is_some(),
            self.payload.len()
        )
    }
}
