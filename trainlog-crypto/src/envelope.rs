//! Ciphertext envelope grammar and structural detection.
//!
//! A protected field is stored as one text-safe string:
//!
//! ```text
//! $tl1$<base64(nonce || ciphertext || tag)>
//! ```
//!
//! Detection is explicit grammar parsing of this format. Parse success is
//! the detection signal; there is no substring heuristic and no attempt at
//! decryption.

use crate::cipher::{NONCE_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Reserved envelope prefix. `$`-sigil strings are not a plausible prefix
/// of names, emails or free-text feedback, which rules out false
/// positives on legacy plaintext by construction.
pub const ENVELOPE_MARKER: &str = "$tl1$";

/// Parsed ciphertext envelope: nonce plus ciphertext with the Poly1305
/// tag appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parses the serialized envelope form.
    ///
    /// Fails with [`CryptoError::MalformedEnvelope`] when the marker is
    /// missing, the remainder is not strict base64, or the payload is too
    /// short to hold a nonce and tag. Tag verification is decryption's
    /// job, not the parser's.
    pub fn parse(value: &str) -> CryptoResult<Self> {
        let Some(encoded) = value.strip_prefix(ENVELOPE_MARKER) else {
            return Err(CryptoError::MalformedEnvelope("missing marker".into()));
        };

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("base64: {e}")))?;

        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::MalformedEnvelope(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);

        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }

    /// Serializes to the single-string storage form.
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        format!("{ENVELOPE_MARKER}{}", STANDARD.encode(bytes))
    }
}

/// True iff `value` is a structurally valid envelope.
///
/// Shape-only and side-effect free: true for every output of
/// [`FieldCipher::encrypt`](crate::FieldCipher::encrypt), false for
/// legacy plaintext. Says nothing about whether the tag will verify.
pub fn is_encrypted(value: &str) -> bool {
    Envelope::parse(value).is_ok()
}

/// A stored field is either legacy plaintext or an envelope, never both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Plaintext(String),
    Encrypted(Envelope),
}

impl FieldValue {
    /// Classifies a stored string at the storage boundary.
    pub fn classify(value: &str) -> Self {
        match Envelope::parse(value) {
            Ok(envelope) => Self::Encrypted(envelope),
            Err(_) => Self::Plaintext(value.to_string()),
        }
    }
}
