use chrono::Utc;
use std::sync::Arc;
use trainlog_accounts::{
    AccountError, AccountService, MemoryProfileStore, ProfileRecord, ProfileStore,
};
use trainlog_crypto::{
    FieldCipher, KdfParams, KeyManager, MemoryKeyStore, PasswordRecord, is_encrypted,
};
use uuid::Uuid;

fn service() -> (AccountService, Arc<MemoryProfileStore>) {
    let store = Arc::new(MemoryProfileStore::new());
    let keys = Arc::new(KeyManager::new(Arc::new(MemoryKeyStore::new())));
    let service = AccountService::new(store.clone(), FieldCipher::new(keys))
        .with_kdf_params(KdfParams { iterations: 1 });
    (service, store)
}

#[tokio::test]
async fn sign_up_then_sign_in() {
    let (service, _) = service();

    let id = service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    let signed_in = service.sign_in("jane@example.com", "Secret123!").await.unwrap();
    assert_eq!(signed_in, id);
}

#[tokio::test]
async fn sign_in_is_case_sensitive_in_password() {
    let (service, _) = service();
    service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    let err = service
        .sign_in("jane@example.com", "secret123!")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::InvalidCredential));
}

#[tokio::test]
async fn unknown_email_is_the_same_invalid_credential() {
    let (service, _) = service();
    let err = service
        .sign_in("nobody@example.com", "whatever")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::InvalidCredential));
}

#[tokio::test]
async fn email_lookup_ignores_case() {
    let (service, _) = service();
    service
        .sign_up("Jane@Example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    service.sign_in("jane@example.com", "Secret123!").await.unwrap();
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (service, _) = service();
    service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    let err = service
        .sign_up("JANE@example.com", "Jane Again", "Other456!")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::AlreadyRegistered));
}

#[tokio::test]
async fn pii_is_enveloped_at_rest() {
    let (service, store) = service();
    let id = service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    let stored = store.get_profile(id).unwrap().unwrap();
    assert!(is_encrypted(&stored.email));
    assert!(is_encrypted(&stored.display_name));
    assert!(!stored.email.contains("jane@example.com"));

    // The password is a salted digest record, not ciphertext.
    assert_eq!(stored.password.algorithm, "argon2id");
    assert_ne!(stored.password.digest, "Secret123!");
}

#[tokio::test]
async fn change_password_replaces_the_record_wholesale() {
    let (service, store) = service();
    let id = service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();
    let old_record = store.get_profile(id).unwrap().unwrap().password;

    service
        .change_password("jane@example.com", "Secret123!", "NewSecret456!")
        .await
        .unwrap();

    let new_record = store.get_profile(id).unwrap().unwrap().password;
    assert_ne!(old_record.salt, new_record.salt);
    assert_ne!(old_record.digest, new_record.digest);

    let err = service
        .sign_in("jane@example.com", "Secret123!")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::InvalidCredential));
    service.sign_in("jane@example.com", "NewSecret456!").await.unwrap();
}

#[tokio::test]
async fn change_password_requires_the_old_one() {
    let (service, _) = service();
    service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    let err = service
        .change_password("jane@example.com", "guessed-wrong", "NewSecret456!")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::InvalidCredential));
}

#[tokio::test]
async fn display_name_rewrites_get_a_fresh_envelope() {
    let (service, store) = service();
    let id = service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();
    let first = store.get_profile(id).unwrap().unwrap().display_name;

    service.update_display_name(id, "Jane D.").unwrap();
    let second = store.get_profile(id).unwrap().unwrap().display_name;

    assert!(is_encrypted(&second));
    assert_ne!(first, second);

    // Writing the same value again still re-wraps with a fresh nonce.
    service.update_display_name(id, "Jane D.").unwrap();
    let third = store.get_profile(id).unwrap().unwrap().display_name;
    assert_ne!(second, third);
}

#[tokio::test]
async fn legacy_plaintext_row_migrates_on_next_write() {
    let (service, store) = service();

    // A row persisted before field encryption shipped.
    let now = Utc::now();
    let legacy = ProfileRecord {
        id: Uuid::new_v4(),
        email: "jane@example.com".to_string(),
        display_name: "Jane".to_string(),
        password: PasswordRecord::create("Secret123!", &KdfParams { iterations: 1 }).unwrap(),
        created_at: now,
        updated_at: now,
    };
    let id = legacy.id;
    store.upsert_profile(legacy).unwrap();

    // Legacy plaintext still signs in.
    service.sign_in("jane@example.com", "Secret123!").await.unwrap();

    // The first rewrite upgrades every PII field in place.
    service.update_display_name(id, "Jane D.").unwrap();
    let migrated = store.get_profile(id).unwrap().unwrap();
    assert!(is_encrypted(&migrated.email));
    assert!(is_encrypted(&migrated.display_name));

    // Nothing observable changed for the user.
    service.sign_in("jane@example.com", "Secret123!").await.unwrap();
}

#[tokio::test]
async fn feedback_message_is_enveloped() {
    let (service, store) = service();
    let id = service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();

    service
        .submit_feedback(id, "the charts lag on older phones")
        .unwrap();

    let feedback = store.list_feedback(id).unwrap();
    assert_eq!(feedback.len(), 1);
    assert!(is_encrypted(&feedback[0].message));
}

#[tokio::test]
async fn prepare_protection_warms_the_key_once() {
    let (service, _) = service();
    service.prepare_protection().await.unwrap();
    service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap();
}

#[tokio::test]
async fn key_storage_outage_is_a_generic_protection_error() {
    use trainlog_crypto::{CryptoError, CryptoResult, KeyStore, MasterSecret, StoreOutcome};

    struct FailingKeyStore;

    impl KeyStore for FailingKeyStore {
        fn load(&self) -> CryptoResult<Option<MasterSecret>> {
            Err(CryptoError::Unavailable("disk offline".into()))
        }

        fn store_if_absent(&self, _secret: &MasterSecret) -> CryptoResult<StoreOutcome> {
            Err(CryptoError::Unavailable("disk offline".into()))
        }
    }

    let store = Arc::new(MemoryProfileStore::new());
    let keys = Arc::new(KeyManager::new(Arc::new(FailingKeyStore)));
    let service = AccountService::new(store, FieldCipher::new(keys))
        .with_kdf_params(KdfParams { iterations: 1 });

    // No fallback key: the failure surfaces, and as a generic error.
    let err = service
        .sign_up("jane@example.com", "Jane", "Secret123!")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Protection(_)));
    assert_eq!(err.to_string(), "data protection unavailable");
}

#[tokio::test]
async fn feedback_for_unknown_profile_is_rejected() {
    let (service, _) = service();
    let err = service
        .submit_feedback(Uuid::new_v4(), "hello?")
        .unwrap_err();
    assert!(matches!(err, AccountError::ProfileNotFound));
}
