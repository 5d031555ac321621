//! Sign-up, sign-in and password management.
//!
//! Password hashing is deliberately expensive, so the async entry points
//! push it onto the blocking pool and keep the caller's thread free for
//! UI work.

use crate::store::{FeedbackRecord, ProfileRecord, ProfileStore};
use crate::{AccountError, AccountResult};
use chrono::Utc;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};
use trainlog_crypto::{FieldCipher, FieldValue, KdfParams, PasswordRecord, verify_password};
use uuid::Uuid;

/// Credential and profile service.
///
/// Owns no state beyond its injected collaborators: the record store and
/// the field cipher. Construct once at startup and share.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn ProfileStore>,
    cipher: FieldCipher,
    kdf: KdfParams,
}

impl AccountService {
    pub fn new(store: Arc<dyn ProfileStore>, cipher: FieldCipher) -> Self {
        Self {
            store,
            cipher,
            kdf: KdfParams::default(),
        }
    }

    /// Overrides the password work factor. Existing records are
    /// unaffected; they verify with their stored parameters.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Loads (or on first launch, creates) the master secret off the
    /// caller's thread. Call once at startup so later field encryption
    /// never pays key-store I/O on an interaction thread.
    pub async fn prepare_protection(&self) -> AccountResult<()> {
        let cipher = self.cipher.clone();
        task::spawn_blocking(move || cipher.ensure_key())
            .await
            .map_err(|e| AccountError::Internal(format!("key setup task: {e}")))??;
        Ok(())
    }

    /// Creates a profile: fresh salt and digest for the password, PII
    /// fields enveloped before they reach the store.
    pub async fn sign_up(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> AccountResult<Uuid> {
        let email = email.trim().to_string();
        if self.find_by_email(&email)?.is_some() {
            return Err(AccountError::AlreadyRegistered);
        }

        let record = self.hash_password_blocking(password.to_string()).await?;

        let now = Utc::now();
        let profile = ProfileRecord {
            id: Uuid::new_v4(),
            email,
            display_name: display_name.to_string(),
            password: record,
            created_at: now,
            updated_at: now,
        };
        let id = profile.id;
        self.persist_profile(profile)?;

        info!(profile_id = %id, "profile created");
        Ok(id)
    }

    /// Verifies a credential. Wrong email and wrong password are the same
    /// [`AccountError::InvalidCredential`]; callers get no hint which.
    pub async fn sign_in(&self, email: &str, password: &str) -> AccountResult<Uuid> {
        let Some(profile) = self.find_by_email(email.trim())? else {
            debug!("sign-in rejected: unknown email");
            return Err(AccountError::InvalidCredential);
        };

        let verified = self
            .verify_password_blocking(password.to_string(), profile.password.clone())
            .await?;
        if !verified {
            debug!(profile_id = %profile.id, "sign-in rejected: bad password");
            return Err(AccountError::InvalidCredential);
        }

        debug!(profile_id = %profile.id, "sign-in verified");
        Ok(profile.id)
    }

    /// Replaces the password record wholesale: new salt, new digest,
    /// current default work factor.
    pub async fn change_password(
        &self,
        email: &str,
        old_password: &str,
        new_password: &str,
    ) -> AccountResult<()> {
        let Some(mut profile) = self.find_by_email(email.trim())? else {
            return Err(AccountError::InvalidCredential);
        };

        let verified = self
            .verify_password_blocking(old_password.to_string(), profile.password.clone())
            .await?;
        if !verified {
            return Err(AccountError::InvalidCredential);
        }

        profile.password = self.hash_password_blocking(new_password.to_string()).await?;
        let id = profile.id;
        self.persist_profile(profile)?;

        info!(profile_id = %id, "password changed");
        Ok(())
    }

    /// Updates the display name. The new value is enveloped with a fresh
    /// nonce on this write, like every PII write.
    pub fn update_display_name(&self, profile_id: Uuid, display_name: &str) -> AccountResult<()> {
        let Some(mut profile) = self.store.get_profile(profile_id)? else {
            return Err(AccountError::ProfileNotFound);
        };

        profile.display_name = display_name.to_string();
        self.persist_profile(profile)
    }

    /// Records a free-text feedback entry with the message enveloped.
    pub fn submit_feedback(&self, profile_id: Uuid, message: &str) -> AccountResult<Uuid> {
        if self.store.get_profile(profile_id)?.is_none() {
            return Err(AccountError::ProfileNotFound);
        }

        let feedback = FeedbackRecord {
            id: Uuid::new_v4(),
            profile_id,
            message: self.cipher.encrypt_if_needed(message)?,
            created_at: Utc::now(),
        };
        let id = feedback.id;
        self.store.add_feedback(feedback)?;
        Ok(id)
    }

    pub(crate) fn store(&self) -> &dyn ProfileStore {
        self.store.as_ref()
    }

    pub(crate) fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Routes every PII field through the migration guard and writes the
    /// record. This is the single write path for profiles: fields arriving
    /// as plaintext (new values, legacy rows) get enveloped here, fields
    /// already enveloped pass through untouched.
    pub(crate) fn persist_profile(&self, mut profile: ProfileRecord) -> AccountResult<()> {
        profile.email = self.cipher.encrypt_if_needed(&profile.email)?;
        profile.display_name = self.cipher.encrypt_if_needed(&profile.display_name)?;
        profile.updated_at = Utc::now();
        self.store.upsert_profile(profile)?;
        Ok(())
    }

    /// Looks a profile up by email, decrypting stored emails for the
    /// comparison. Case-insensitive. A row whose email fails to decrypt
    /// cannot match and is skipped.
    fn find_by_email(&self, email: &str) -> AccountResult<Option<ProfileRecord>> {
        for profile in self.store.list_profiles()? {
            let stored = match FieldValue::classify(&profile.email) {
                // Legacy row not yet migrated.
                FieldValue::Plaintext(value) => value,
                FieldValue::Encrypted(_) => match self.cipher.decrypt(&profile.email) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(profile_id = %profile.id, error = %e, "stored email unreadable");
                        continue;
                    }
                },
            };
            if stored.trim().eq_ignore_ascii_case(email) {
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    async fn hash_password_blocking(&self, password: String) -> AccountResult<PasswordRecord> {
        let kdf = self.kdf.clone();
        let record = task::spawn_blocking(move || PasswordRecord::create(&password, &kdf))
            .await
            .map_err(|e| AccountError::Internal(format!("hashing task: {e}")))??;
        Ok(record)
    }

    async fn verify_password_blocking(
        &self,
        password: String,
        record: PasswordRecord,
    ) -> AccountResult<bool> {
        task::spawn_blocking(move || verify_password(&password, &record))
            .await
            .map_err(|e| AccountError::Internal(format!("verification task: {e}")))
    }
}
