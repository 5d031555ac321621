//! Credential and data-lifecycle services for TrainLog.
//!
//! The UI-facing half of local data protection: sign-up, sign-in and
//! password changes on top of the password codec, plus export and erasure
//! of stored profiles. Every write that persists a PII field (email,
//! display name, feedback text) routes through the migration guard, so
//! legacy plaintext rows upgrade transparently the first time they are
//! rewritten.
//!
//! Record persistence itself is an injected [`ProfileStore`]; this crate
//! never talks to a concrete database.

use thiserror::Error;
use trainlog_crypto::CryptoError;

mod auth;
mod export;
mod store;

pub use auth::AccountService;
pub use export::{ExportField, FeedbackExport, ProfileExport};
pub use store::{FeedbackRecord, MemoryProfileStore, ProfileRecord, ProfileStore};

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, Error)]
pub enum AccountError {
    /// Wrong email or password. Deliberately does not say which.
    #[error("invalid email or password")]
    InvalidCredential,
    #[error("an account already exists for this email")]
    AlreadyRegistered,
    #[error("profile not found")]
    ProfileNotFound,
    /// The data-protection layer failed. The message stays generic;
    /// cryptographic detail lives in the source chain, not the UI.
    #[error("data protection unavailable")]
    Protection(#[source] CryptoError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CryptoError> for AccountError {
    fn from(e: CryptoError) -> Self {
        Self::Protection(e)
    }
}

pub type AccountResult<T> = Result<T, AccountError>;
