//! Salted, iterated password-credential hashing and verification.
//!
//! Argon2id with a per-credential random salt. The persisted record
//! carries the full parameter set, so verification always recomputes with
//! the parameters the record was created under and the work factor can be
//! raised later without invalidating existing credentials.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Salt size in bytes (128 bits).
pub const SALT_SIZE: usize = 16;

/// Digest size in bytes (256 bits).
pub const DIGEST_SIZE: usize = 32;

/// Algorithm tag stored in every record. Memory cost and parallelism are
/// fixed by the tag; only the time cost varies per record.
pub const ALGORITHM_TAG: &str = "argon2id";

// Argon2id parameters. 19 MiB / p=1 keeps hashing practical on low-end
// phones while staying deliberately expensive.
const ARGON2_MEM_COST: u32 = 19 * 1024;
const ARGON2_PARALLELISM: u32 = 1;
const DEFAULT_TIME_COST: u32 = 3;

/// Per-credential random salt. Not secret; stored alongside the digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Fresh random salt from the OS CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        crate::fill_random(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Generates a fresh random salt. Never repeats in practice.
pub fn generate_salt() -> Salt {
    Salt::random()
}

/// Tunable work factor for password hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Argon2id time cost. Raising this only affects newly created
    /// records; existing records verify with their stored value.
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_TIME_COST,
        }
    }
}

/// Derives a fixed-length digest from a password and salt.
///
/// Deterministic: the same inputs always reproduce the same digest. Empty
/// passwords are hashed like any other (strength rules live in the UI).
pub fn hash_password(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<[u8; DIGEST_SIZE]> {
    let argon_params = ParamsBuilder::new()
        .m_cost(ARGON2_MEM_COST)
        .t_cost(params.iterations)
        .p_cost(ARGON2_PARALLELISM)
        .output_len(DIGEST_SIZE)
        .build()
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut digest = [0u8; DIGEST_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut digest)
        .map_err(|e| CryptoError::KeyDerivation(format!("Argon2 failed: {e}")))?;

    Ok(digest)
}

/// Persisted password credential: algorithm tag, time cost, salt and
/// digest (base64). Replaced wholesale on password change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordRecord {
    pub algorithm: String,
    pub iterations: u32,
    pub salt: String,
    pub digest: String,
}

impl PasswordRecord {
    /// Hashes `password` under a fresh salt. Sign-up and password-change
    /// entry point.
    pub fn create(password: &str, params: &KdfParams) -> CryptoResult<Self> {
        let salt = generate_salt();
        let digest = hash_password(password, &salt, params)?;

        Ok(Self {
            algorithm: ALGORITHM_TAG.to_string(),
            iterations: params.iterations,
            salt: STANDARD.encode(salt.as_bytes()),
            digest: STANDARD.encode(digest),
        })
    }
}

/// Recomputes the digest with the record's stored parameters and compares
/// in constant time.
///
/// Returns `false` for a wrong password and for any malformed record
/// (unknown algorithm tag, bad base64, wrong lengths). Never errors:
/// a credential that cannot be verified is an invalid credential.
pub fn verify_password(password: &str, record: &PasswordRecord) -> bool {
    if record.algorithm != ALGORITHM_TAG {
        return false;
    }

    let Ok(salt_bytes) = STANDARD.decode(&record.salt) else {
        return false;
    };
    let Ok(salt_arr) = <[u8; SALT_SIZE]>::try_from(salt_bytes) else {
        return false;
    };
    let Ok(stored_digest) = STANDARD.decode(&record.digest) else {
        return false;
    };
    if stored_digest.len() != DIGEST_SIZE {
        return false;
    }

    let params = KdfParams {
        iterations: record.iterations,
    };
    let Ok(computed) = hash_password(password, &Salt::from_bytes(salt_arr), &params) else {
        return false;
    };

    computed.ct_eq(stored_digest.as_slice()).into()
}
