//! Authenticated field encryption with XChaCha20-Poly1305.
//!
//! One master secret, one fresh random nonce per call. The 24-byte
//! XChaCha20 nonce keeps random nonces collision-safe for the lifetime of
//! an install.

use crate::envelope::Envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::key::KeyManager;
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use std::sync::Arc;

/// XChaCha20 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypts and decrypts individual text fields under the install's
/// master secret.
///
/// Constructed once with an injected [`KeyManager`] and shared by the
/// services that persist protected fields. Each operation fetches the
/// secret through the manager, so key availability is checked per call.
#[derive(Clone)]
pub struct FieldCipher {
    keys: Arc<KeyManager>,
}

impl FieldCipher {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Loads or creates the master secret without encrypting anything.
    ///
    /// Lets startup code pay first-launch key generation and key-store
    /// I/O up front, off the interaction thread.
    pub fn ensure_key(&self) -> CryptoResult<()> {
        self.keys.get_or_create().map(|_| ())
    }

    /// Encrypts `plaintext` into a serialized envelope string.
    ///
    /// Draws a fresh nonce per call, so two calls on identical plaintext
    /// produce different output; both decrypt back to the same value.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let secret = self.keys.get_or_create()?;
        let cipher = XChaCha20Poly1305::new_from_slice(secret.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("invalid key: {e}")))?;

        let mut nonce = [0u8; NONCE_SIZE];
        crate::fill_random(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("AEAD failure: {e}")))?;

        Ok(Envelope { nonce, ciphertext }.encode())
    }

    /// Decrypts a serialized envelope back to the original plaintext.
    ///
    /// [`CryptoError::MalformedEnvelope`] when the string does not parse
    /// as this format; [`CryptoError::DecryptionFailed`] when it parses
    /// but the authentication tag does not verify. Never returns partial
    /// plaintext.
    pub fn decrypt(&self, value: &str) -> CryptoResult<String> {
        let envelope = Envelope::parse(value)?;

        let secret = self.keys.get_or_create()?;
        let cipher = XChaCha20Poly1305::new_from_slice(secret.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("invalid key: {e}")))?;

        let plaintext = cipher
            .decrypt(XNonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}
