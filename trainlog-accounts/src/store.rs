//! Profile and feedback records plus the persistence seam.
//!
//! The PII fields on these records (`email`, `display_name`, `message`)
//! hold ciphertext envelopes at rest; rows written before encryption
//! shipped may still hold plaintext until their next write migrates them.
//! The store treats both as opaque strings.

use crate::{AccountError, AccountResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use trainlog_crypto::PasswordRecord;
use uuid::Uuid;

/// A locally stored user profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    /// Protected field: envelope at rest, plaintext only on legacy rows.
    pub email: String,
    /// Protected field, same representation as `email`.
    pub display_name: String,
    /// Replaced wholesale on password change.
    pub password: PasswordRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A free-text feedback entry tied to a profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub profile_id: Uuid,
    /// Protected field.
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence seam for profile data.
///
/// The storage backend (file, SQLite, platform store) lives outside this
/// crate; services only depend on this trait.
pub trait ProfileStore: Send + Sync {
    fn upsert_profile(&self, profile: ProfileRecord) -> AccountResult<()>;
    fn get_profile(&self, id: Uuid) -> AccountResult<Option<ProfileRecord>>;
    fn list_profiles(&self) -> AccountResult<Vec<ProfileRecord>>;
    /// Returns whether a profile was actually removed.
    fn delete_profile(&self, id: Uuid) -> AccountResult<bool>;

    fn add_feedback(&self, feedback: FeedbackRecord) -> AccountResult<()>;
    fn list_feedback(&self, profile_id: Uuid) -> AccountResult<Vec<FeedbackRecord>>;
    /// Removes all feedback for a profile, returning the count.
    fn delete_feedback_for(&self, profile_id: Uuid) -> AccountResult<usize>;
}

// ============================================================================
// MemoryProfileStore — in-memory backend for tests and previews
// ============================================================================

pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<Uuid, ProfileRecord>>,
    feedback: RwLock<Vec<FeedbackRecord>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            feedback: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn upsert_profile(&self, profile: ProfileRecord) -> AccountResult<()> {
        self.profiles
            .write()
            .map_err(|e| AccountError::Storage(e.to_string()))?
            .insert(profile.id, profile);
        Ok(())
    }

    fn get_profile(&self, id: Uuid) -> AccountResult<Option<ProfileRecord>> {
        Ok(self
            .profiles
            .read()
            .map_err(|e| AccountError::Storage(e.to_string()))?
            .get(&id)
            .cloned())
    }

    fn list_profiles(&self) -> AccountResult<Vec<ProfileRecord>> {
        Ok(self
            .profiles
            .read()
            .map_err(|e| AccountError::Storage(e.to_string()))?
            .values()
            .cloned()
            .collect())
    }

    fn delete_profile(&self, id: Uuid) -> AccountResult<bool> {
        Ok(self
            .profiles
            .write()
            .map_err(|e| AccountError::Storage(e.to_string()))?
            .remove(&id)
            .is_some())
    }

    fn add_feedback(&self, feedback: FeedbackRecord) -> AccountResult<()> {
        self.feedback
            .write()
            .map_err(|e| AccountError::Storage(e.to_string()))?
            .push(feedback);
        Ok(())
    }

    fn list_feedback(&self, profile_id: Uuid) -> AccountResult<Vec<FeedbackRecord>> {
        Ok(self
            .feedback
            .read()
            .map_err(|e| AccountError::Storage(e.to_string()))?
            .iter()
            .filter(|f| f.profile_id == profile_id)
            .cloned()
            .collect())
    }

    fn delete_feedback_for(&self, profile_id: Uuid) -> AccountResult<usize> {
        let mut feedback = self
            .feedback
            .write()
            .map_err(|e| AccountError::Storage(e.to_string()))?;
        let before = feedback.len();
        feedback.retain(|f| f.profile_id != profile_id);
        Ok(before - feedback.len())
    }
}
