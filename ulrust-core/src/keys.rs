//! Session key derivation
//!
//! Locks advertise one of three key exchange schemes, told apart by which key
//! characteristic their GATT table exposes:
//!
//! - **Static**: an 8-byte secret appended to a fixed 8-byte prefix.
//! - **MD5**: a 16-byte secret scrambled with a fixed constant and hashed.
//! - **ECDH**: an ephemeral secp128r1 exchange (see [`crate::ecc`]).

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use md5::{Digest, Md5};
use tracing::trace;
use uuid::Uuid;

use crate::{
    cipher::SessionKey,
    constants::{gatt, MD5_KEY_MAGIC, STATIC_KEY_PREFIX},
    error::{Error, Result},
};

/// Key exchange scheme offered by a lock
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyExchangeKind {
    Static,
    Md5Derived,
    Ecdh,
}

impl KeyExchangeKind {
    /// Order in which key characteristics are probed
    pub const PROBE_ORDER: [Self; 3] = [Self::Static, Self::Md5Derived, Self::Ecdh];

    /// Characteristic whose presence selects this scheme
    pub fn characteristic(self) -> Uuid {
        match self {
            Self::Static => gatt::LOCK_KEY_STATIC,
            Self::Md5Derived => gatt::LOCK_KEY_MD5,
            Self::Ecdh => gatt::LOCK_KEY_ECC,
        }
    }

    /// Size of the secret read from the key characteristic
    ///
    /// ECDH secrets are never read, so it has none.
    pub fn secret_len(self) -> Option<usize> {
        match self {
            Self::Static => Some(8),
            Self::Md5Derived => Some(16),
            Self::Ecdh => None,
        }
    }

    /// Pick the scheme from the characteristics a lock exposes
    ///
    /// # Examples
    ///
    /// ```
    /// use ulrust_core::{constants::gatt, KeyExchangeKind};
    ///
    /// let kind = KeyExchangeKind::select(|uuid| uuid == gatt::LOCK_KEY_MD5);
    /// assert_eq!(kind, Some(KeyExchangeKind::Md5Derived));
    ///
    /// assert_eq!(KeyExchangeKind::select(|_| false), None);
    /// ```
    pub fn select(mut has_characteristic: impl FnMut(Uuid) -> bool) -> Option<Self> {
        Self::PROBE_ORDER
            .into_iter()
            .find(|kind| has_characteristic(kind.characteristic()))
    }

    /// Derive the session key from a secret read off the key characteristic
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLength`] if the secret has the wrong size, and
    /// [`Error::InvalidSessionState`] for ECDH, which has no readable secret.
    pub fn derive(self, secret: &[u8]) -> Result<SessionKey> {
        match self {
            Self::Static => static_key(secret),
            Self::Md5Derived => md5_key(secret),
            Self::Ecdh => Err(Error::InvalidSessionState(
                "ECDH keys are negotiated, not read".into(),
            )),
        }
    }

    /// Get scheme name
    pub fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Md5Derived => "md5",
            Self::Ecdh => "ecdh",
        }
    }
}

impl fmt::Display for KeyExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static key: fixed prefix followed by the 8-byte secret
pub fn static_key(secret: &[u8]) -> Result<SessionKey> {
    if secret.len() != 8 {
        return Err(Error::KeyLength {
            expected: 8,
            actual: secret.len(),
        });
    }

    let mut key = [0u8; 16];
    key[..8].copy_from_slice(STATIC_KEY_PREFIX);
    key[8..].copy_from_slice(secret);

    Ok(SessionKey::new(key))
}

/// MD5 key derived from the 16-byte secret
///
/// # Algorithm
///
/// ```text
/// 1. p1, p2 = secret[0..8], secret[8..16] as little-endian u64
/// 2. x1 = p1 ^ MAGIC
/// 3. x2 = p2 ^ p1 ^ MAGIC       (byte-wise mix with "ULtraloq")
/// 4. key = MD5(x1_le || x2_le)
/// 5. if (low byte of p1 ^ 0x55) is odd: key = MD5(key)
/// ```
pub fn md5_key(secret: &[u8]) -> Result<SessionKey> {
    if secret.len() != 16 {
        return Err(Error::KeyLength {
            expected: 16,
            actual: secret.len(),
        });
    }

    let p1 = LittleEndian::read_u64(&secret[..8]);
    let p2 = LittleEndian::read_u64(&secret[8..]);

    let mut mixed = [0u8; 16];
    LittleEndian::write_u64(&mut mixed[..8], p1 ^ MD5_KEY_MAGIC);
    LittleEndian::write_u64(&mut mixed[8..], p2 ^ p1 ^ MD5_KEY_MAGIC);

    let mut key: [u8; 16] = Md5::digest(mixed).into();

    let rehash = ((p1 as u8) ^ 0x55) & 1 == 1;
    if rehash {
        key = Md5::digest(key).into();
    }

    trace!(rehash, "Derived MD5 session key");

    Ok(SessionKey::new(key))
}
