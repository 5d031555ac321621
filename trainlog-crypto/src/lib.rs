//! Local data-protection layer for TrainLog.
//!
//! Defends on-device user data against casual inspection of local storage
//! using:
//! - Argon2id for salted password-credential hashing
//! - XChaCha20-Poly1305 for authenticated field-level encryption
//! - A zeroized, process-wide master secret behind pluggable key storage
//!
//! # Architecture
//!
//! One master secret per install, created on first launch and held for
//! the process lifetime by [`KeyManager`]. Protected fields (email,
//! display name, free-text feedback) are stored as single-string
//! ciphertext envelopes; [`is_encrypted`] recognizes the envelope format
//! structurally and [`FieldCipher::encrypt_if_needed`] upgrades legacy
//! plaintext in place on the next write.
//!
//! Password credentials never touch the master secret: each gets its own
//! random salt and a deliberately expensive digest, replaced wholesale on
//! password change.
//!
//! This layer is not a network protocol and not a multi-user
//! authorization system; it assumes a single local process and store.

mod cipher;
mod envelope;
mod error;
mod key;
pub mod keystore;
mod migrate;
mod password;

pub use cipher::{FieldCipher, NONCE_SIZE, TAG_SIZE};
pub use envelope::{ENVELOPE_MARKER, Envelope, FieldValue, is_encrypted};
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, KeyManager, MasterSecret};
pub use keystore::{FileKeyStore, KeyStore, MemoryKeyStore, StoreOutcome};
pub use password::{
    ALGORITHM_TAG, DIGEST_SIZE, KdfParams, PasswordRecord, SALT_SIZE, Salt, generate_salt,
    hash_password, verify_password,
};

/// Fills `buf` from the operating system CSPRNG.
///
/// Panics if the OS entropy source fails; no fallback generator exists.
pub(crate) fn fill_random(buf: &mut [u8]) {
    use rand::TryRngCore;

    rand::rngs::OsRng
        .try_fill_bytes(buf)
        .expect("operating system entropy source unavailable");
}
