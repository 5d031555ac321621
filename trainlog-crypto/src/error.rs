use thiserror::Error;

/// Errors from the data-protection layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Secure key storage could not be read or written. There is no
    /// fallback key on this failure.
    #[error("secure key storage unavailable: {0}")]
    Unavailable(String),

    /// The value does not parse as a ciphertext envelope at all.
    #[error("malformed ciphertext envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope parsed but the authentication tag did not verify,
    /// either the data was tampered with or the key is wrong.
    #[error("decryption failed (wrong key or tampered data)")]
    DecryptionFailed,

    /// Password key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
