//! Transport cipher
//!
//! Every 16-byte chunk on the data characteristic is encrypted on its own with
//! AES-128-CBC and an all-zero IV. With a fresh zero IV per block this is
//! plain AES-ECB: identical plaintext chunks produce identical ciphertext.
//! The locks only speak this construction, so it is kept as is.

use std::fmt;

use aes::Aes128;
use cbc::cipher::{generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

use crate::{
    constants::BLOCK_SIZE,
    error::{Error, Result},
    frame,
};

const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Symmetric key for one connection
///
/// Derived during key exchange and discarded on disconnect.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; 16]);

impl SessionKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLength`] unless the slice is exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; 16] = bytes.try_into().map_err(|_| Error::KeyLength {
            expected: 16,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Encrypt one chunk
    pub fn encrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = *block;
        let mut encryptor = Encryptor::<Aes128>::new(
            GenericArray::from_slice(&self.0),
            GenericArray::from_slice(&ZERO_IV),
        );
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(&mut out));
        out
    }

    /// Decrypt one chunk
    pub fn decrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = *block;
        let mut decryptor = Decryptor::<Aes128>::new(
            GenericArray::from_slice(&self.0),
            GenericArray::from_slice(&ZERO_IV),
        );
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(&mut out));
        out
    }

    /// Chunk and encrypt an encoded frame
    ///
    /// # Examples
    ///
    /// ```
    /// use ulrust_core::{CommandCode, Frame, SessionKey};
    ///
    /// let key = SessionKey::new([7u8; 16]);
    /// let frame = Frame::new(CommandCode::GetBattery).encode().unwrap();
    ///
    /// let chunks = key.encrypt_frame(&frame);
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(key.decrypt_block(&chunks[0])[..5], frame[..]);
    /// ```
    pub fn encrypt_frame(&self, frame: &[u8]) -> Vec<[u8; BLOCK_SIZE]> {
        frame::chunk(frame)
            .iter()
            .map(|block| self.encrypt_block(block))
            .collect()
    }

    /// Decrypt a notification made of whole chunks
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockLength`] if `data` is not a multiple of 16 bytes.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
            return Err(Error::BlockLength(data.len()));
        }

        let mut out = Vec::with_capacity(data.len());
        for block in data.chunks_exact(BLOCK_SIZE) {
            let mut buf = [0u8; BLOCK_SIZE];
            buf.copy_from_slice(block);
            out.extend_from_slice(&self.decrypt_block(&buf));
        }
        Ok(out)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}
