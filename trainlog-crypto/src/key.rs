//! Master secret ownership and process-wide key management.
//!
//! The master secret is generated once per install, persisted through an
//! injectable [`KeyStore`], and cached in memory for the process lifetime.
//! All field encryption uses this single secret.

use crate::error::{CryptoError, CryptoResult};
use crate::keystore::{KeyStore, StoreOutcome};
use std::fmt;
use std::sync::{Arc, RwLock};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Master secret size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// The install-wide master secret used for all field encryption.
///
/// Zeroized on drop. `Debug` is intentionally opaque.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; KEY_SIZE]);

impl MasterSecret {
    /// Generates a fresh secret from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        crate::fill_random(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for MasterSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for MasterSecret {}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// Owns the master secret for the process.
///
/// Constructed once at startup with an injected [`KeyStore`] and shared by
/// reference; never an ambient global. Reads after the first load hit the
/// in-memory cache. First-time creation is a check-then-act critical
/// section backed by the store's create-if-absent semantics, so at most
/// one secret is ever generated per install even with concurrent callers.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    cached: RwLock<Option<MasterSecret>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /// Returns the install's master secret, creating and persisting it on
    /// first call.
    ///
    /// Fails with [`CryptoError::Unavailable`] if the backing store cannot
    /// be read or written. Callers must surface that as an error; there is
    /// no fallback key.
    pub fn get_or_create(&self) -> CryptoResult<MasterSecret> {
        if let Some(secret) = self.cached.read().unwrap().as_ref() {
            return Ok(secret.clone());
        }

        let mut guard = self.cached.write().unwrap();
        // Another caller may have populated the cache while we waited.
        if let Some(secret) = guard.as_ref() {
            return Ok(secret.clone());
        }

        if let Some(secret) = self.store.load()? {
            *guard = Some(secret.clone());
            return Ok(secret);
        }

        // First launch: generate a candidate and let the store decide the
        // winner. If another process beat us to the file, adopt its secret.
        let candidate = MasterSecret::generate();
        let secret = match self.store.store_if_absent(&candidate)? {
            StoreOutcome::Written => candidate,
            StoreOutcome::AlreadyPresent(existing) => existing,
        };

        *guard = Some(secret.clone());
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeyStore;
    use std::thread;

    struct FailingKeyStore;

    impl KeyStore for FailingKeyStore {
        fn load(&self) -> CryptoResult<Option<MasterSecret>> {
            Err(CryptoError::Unavailable("simulated outage".into()))
        }

        fn store_if_absent(&self, _secret: &MasterSecret) -> CryptoResult<StoreOutcome> {
            Err(CryptoError::Unavailable("simulated outage".into()))
        }
    }

    #[test]
    fn creates_then_reuses_one_secret() {
        let manager = KeyManager::new(Arc::new(MemoryKeyStore::new()));
        let first = manager.get_or_create().unwrap();
        let second = manager.get_or_create().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn adopts_secret_already_in_store() {
        let store = Arc::new(MemoryKeyStore::new());
        let seeded = MasterSecret::generate();
        store.store_if_absent(&seeded).unwrap();

        let manager = KeyManager::new(store);
        assert_eq!(manager.get_or_create().unwrap(), seeded);
    }

    #[test]
    fn concurrent_first_launch_agrees_on_one_secret() {
        let manager = Arc::new(KeyManager::new(Arc::new(MemoryKeyStore::new())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || manager.get_or_create().unwrap())
            })
            .collect();

        let secrets: Vec<MasterSecret> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for secret in &secrets {
            assert_eq!(*secret, secrets[0]);
        }
    }

    #[test]
    fn storage_outage_surfaces_as_unavailable() {
        let manager = KeyManager::new(Arc::new(FailingKeyStore));
        let err = manager.get_or_create().unwrap_err();
        assert!(matches!(err, CryptoError::Unavailable(_)));
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let secret = MasterSecret::from_bytes([7u8; KEY_SIZE]);
        assert_eq!(format!("{secret:?}"), "MasterSecret(..)");
    }
}
