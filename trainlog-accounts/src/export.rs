//! Data-lifecycle flow: human-readable export and erasure.

use crate::{AccountError, AccountResult, AccountService};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use trainlog_crypto::FieldValue;
use uuid::Uuid;

/// One exported field: either the recovered plaintext or a per-field
/// error. Never both.
#[derive(Debug, Serialize)]
pub struct ExportField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackExport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub message: ExportField,
}

/// Plaintext JSON document of everything stored for one profile.
#[derive(Debug, Serialize)]
pub struct ProfileExport {
    pub profile_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
    pub email: ExportField,
    pub display_name: ExportField,
    pub feedback: Vec<FeedbackExport>,
}

impl AccountService {
    /// Decrypts every enveloped field of a profile into a plaintext
    /// export document.
    ///
    /// A field that fails to decrypt reports a per-field error and the
    /// rest of the export completes; one corrupted value never aborts the
    /// whole export.
    pub fn export_profile(&self, profile_id: Uuid) -> AccountResult<ProfileExport> {
        let Some(profile) = self.store().get_profile(profile_id)? else {
            return Err(AccountError::ProfileNotFound);
        };

        let feedback = self
            .store()
            .list_feedback(profile_id)?
            .into_iter()
            .map(|f| FeedbackExport {
                id: f.id,
                created_at: f.created_at,
                message: self.export_field("message", &f.message),
            })
            .collect();

        Ok(ProfileExport {
            profile_id,
            created_at: profile.created_at,
            exported_at: Utc::now(),
            email: self.export_field("email", &profile.email),
            display_name: self.export_field("display_name", &profile.display_name),
            feedback,
        })
    }

    /// Serialized form of [`export_profile`](Self::export_profile) for
    /// handing straight to a share sheet or file writer.
    pub fn export_profile_json(&self, profile_id: Uuid) -> AccountResult<String> {
        let export = self.export_profile(profile_id)?;
        serde_json::to_string_pretty(&export)
            .map_err(|e| AccountError::Internal(format!("export serialization: {e}")))
    }

    /// Deletes the profile and all of its feedback.
    ///
    /// The master secret is shared by every profile on the device and is
    /// not rotated here; discarding the ciphertext is the erasure.
    pub fn erase_profile(&self, profile_id: Uuid) -> AccountResult<()> {
        let removed_feedback = self.store().delete_feedback_for(profile_id)?;
        if !self.store().delete_profile(profile_id)? {
            return Err(AccountError::ProfileNotFound);
        }

        info!(profile_id = %profile_id, removed_feedback, "profile erased");
        Ok(())
    }

    fn export_field(&self, name: &str, stored: &str) -> ExportField {
        match FieldValue::classify(stored) {
            // Legacy row not yet migrated; export as-is.
            FieldValue::Plaintext(value) => ExportField {
                name: name.to_string(),
                value: Some(value),
                error: None,
            },
            FieldValue::Encrypted(_) => match self.cipher().decrypt(stored) {
                Ok(value) => ExportField {
                    name: name.to_string(),
                    value: Some(value),
                    error: None,
                },
                Err(e) => {
                    warn!(field = name, error = %e, "export field unreadable");
                    ExportField {
                        name: name.to_string(),
                        value: None,
                        error: Some("field could not be decrypted".to_string()),
                    }
                }
            },
        }
    }
}
