//! Pluggable secure storage for the master secret.
//!
//! The backing store differs per platform (keychain, keystore, app-managed
//! file), so the [`KeyManager`](crate::KeyManager) only talks to the
//! [`KeyStore`] trait. [`FileKeyStore`] is the app-managed default;
//! [`MemoryKeyStore`] backs tests.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KEY_SIZE, MasterSecret};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zeroize::Zeroize;

/// Result of a create-if-absent write.
pub enum StoreOutcome {
    /// The caller's candidate secret was persisted.
    Written,
    /// Another writer got there first; its secret must be adopted.
    AlreadyPresent(MasterSecret),
}

/// Secure persistent storage for the master secret.
///
/// `store_if_absent` must be atomic: when two writers race, exactly one
/// `Written` outcome is possible and every other caller sees the winner's
/// secret via `AlreadyPresent`.
pub trait KeyStore: Send + Sync {
    /// Loads the persisted secret, or `None` if no secret exists yet.
    fn load(&self) -> CryptoResult<Option<MasterSecret>>;

    /// Persists `secret` only if no secret exists yet.
    fn store_if_absent(&self, secret: &MasterSecret) -> CryptoResult<StoreOutcome>;
}

// ============================================================================
// FileKeyStore — app-managed key file
// ============================================================================

/// Key file on disk, linked into place atomically so first-writer-wins
/// holds even across processes. Mode 0600 on Unix.
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Conventional location inside the app's data directory.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("keys").join("master.key"))
    }

    fn read_existing(&self) -> CryptoResult<MasterSecret> {
        let mut file = fs::File::open(&self.path)
            .map_err(|e| CryptoError::Unavailable(format!("open key file: {e}")))?;
        let mut bytes = Vec::with_capacity(KEY_SIZE);
        file.read_to_end(&mut bytes)
            .map_err(|e| CryptoError::Unavailable(format!("read key file: {e}")))?;

        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::Unavailable(format!(
                "corrupt key file: expected {KEY_SIZE} bytes, found {}",
                bytes.len()
            )));
        }

        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(MasterSecret::from_bytes(arr))
    }

    fn write_scratch(&self, scratch: &Path, secret: &MasterSecret) -> CryptoResult<()> {
        let mut open = OpenOptions::new();
        open.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open.mode(0o600);
        }

        let mut file = open
            .open(scratch)
            .map_err(|e| CryptoError::Unavailable(format!("create key file: {e}")))?;
        file.write_all(secret.as_bytes())
            .map_err(|e| CryptoError::Unavailable(format!("write key file: {e}")))?;
        file.sync_all()
            .map_err(|e| CryptoError::Unavailable(format!("sync key file: {e}")))?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> CryptoResult<Option<MasterSecret>> {
        match fs::metadata(&self.path) {
            Ok(_) => self.read_existing().map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CryptoError::Unavailable(format!("stat key file: {e}"))),
        }
    }

    fn store_if_absent(&self, secret: &MasterSecret) -> CryptoResult<StoreOutcome> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CryptoError::Unavailable(format!("create key dir: {e}")))?;
        }

        if self.path.exists() {
            return self.read_existing().map(StoreOutcome::AlreadyPresent);
        }

        // The candidate is written to a scratch file first and linked into
        // place only when complete, so the key file either does not exist
        // or holds a full secret. Linking fails if another writer won.
        let scratch = self
            .path
            .with_file_name(format!("master.key.{}", std::process::id()));
        self.write_scratch(&scratch, secret)?;

        let outcome = match fs::hard_link(&scratch, &self.path) {
            Ok(()) => Ok(StoreOutcome::Written),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.read_existing().map(StoreOutcome::AlreadyPresent)
            }
            Err(e) => Err(CryptoError::Unavailable(format!("link key file: {e}"))),
        };

        let _ = fs::remove_file(&scratch);
        outcome
    }
}

// ============================================================================
// MemoryKeyStore — in-memory store for tests
// ============================================================================

/// In-memory key store. Create-if-absent is a single mutex-guarded swap.
pub struct MemoryKeyStore {
    inner: Mutex<Option<MasterSecret>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> CryptoResult<Option<MasterSecret>> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn store_if_absent(&self, secret: &MasterSecret) -> CryptoResult<StoreOutcome> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_ref() {
            Some(existing) => Ok(StoreOutcome::AlreadyPresent(existing.clone())),
            None => {
                *guard = Some(secret.clone());
                Ok(StoreOutcome::Written)
            }
        }
    }
}
