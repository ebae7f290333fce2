use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};

use crate::{
    config::SHARED_KEY_ENV,
    error::{Error, Result},
};

/// Length of a [`SharedKey`] in bytes
pub const KEY_LEN: usize = 32;
/// Length of the random nonce that prefixes every encrypted frame
pub const NONCE_LEN: usize = 12;
/// Length of the authentication tag that ends every encrypted frame
pub const TAG_LEN: usize = 16;

/// Symmetric key shared by every [`CipherChannel`] in a process.
///
/// Generated once at startup and handed by reference to the server and the
/// client. Key material is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; KEY_LEN]);

impl SharedKey {
    /// Generates a fresh random key from the operating system RNG
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self(bytes)
    }

    /// Wraps raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a key from 64 hex characters
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let decoded = hex::decode(encoded.trim()).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|raw: Vec<u8>| {
            Error::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Reads `VAULTLINE_SHARED_KEY`, returning `None` when it is unset
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(SHARED_KEY_ENV) {
            Ok(encoded) => Self::from_hex(&encoded).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Reads `VAULTLINE_SHARED_KEY` or generates a new key when it is unset
    pub fn from_env_or_generate() -> Result<Self> {
        Ok(Self::from_env()?.unwrap_or_else(Self::generate))
    }

    /// Hex encoding suitable for `VAULTLINE_SHARED_KEY`
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

/// Authenticated encryption over opaque byte payloads.
///
/// Frames are laid out as `nonce || ciphertext || tag` using AES-256-GCM with
/// a random nonce per call, so encrypting the same plaintext twice yields
/// different frames. Cloning is cheap and the channel is safe to share across
/// threads.
#[derive(Clone)]
pub struct CipherChannel {
    cipher: Aes256Gcm,
}

impl CipherChannel {
    /// Builds a channel bound to `key`
    pub fn new(key: &SharedKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypts `plaintext` into a self-contained frame
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::Processing("plaintext too large to encrypt".to_string()))?;

        let mut frame = Vec::with_capacity(NONCE_LEN + sealed.len());
        frame.extend_from_slice(nonce.as_slice());
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    /// Decrypts a frame produced by [`CipherChannel::encrypt`] under the same key.
    ///
    /// Any truncation, bit flip or key mismatch yields [`Error::Authentication`].
    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>> {
        if frame.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Authentication);
        }

        let (nonce, sealed) = frame.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| Error::Authentication)
    }
}

impl fmt::Debug for CipherChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherChannel").finish_non_exhaustive()
    }
}
