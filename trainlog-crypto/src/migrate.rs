//! Idempotent upgrade path for legacy plaintext fields.

use crate::cipher::FieldCipher;
use crate::envelope::is_encrypted;
use crate::error::CryptoResult;

impl FieldCipher {
    /// Encrypts `value` unless it already is an envelope.
    ///
    /// Idempotent: already-encrypted values pass through byte-identical,
    /// so a field is never double-wrapped no matter how many write paths
    /// touch it. Legacy plaintext is upgraded the first time its record
    /// is rewritten; no separate migration batch job exists. Finding
    /// plaintext here is ordinary control flow, not a failure.
    pub fn encrypt_if_needed(&self, value: &str) -> CryptoResult<String> {
        if is_encrypted(value) {
            return Ok(value.to_string());
        }
        self.encrypt(value)
    }
}
