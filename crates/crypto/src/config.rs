//! Keyring configuration

use std::path::PathBuf;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keyring::{Keyring, KeyringResult, DEFAULT_MAX_SIGN_DATA_LEN};
use crate::keystore::{
    FileStore, KeyStore, KeystoreError, KeystoreResult, MemoryStore, StoreBackend,
    DEFAULT_CACHE_CAPACITY,
};
use crate::secure::SecretString;

/// Credential store service name used when none is configured
pub const DEFAULT_SERVICE: &str = "sigvault";

/// How to build a [`Keyring`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    /// Storage backend
    pub backend: StoreBackend,

    /// Key directory, required by the file backend
    pub path: Option<PathBuf>,

    /// Credential store service name for the os backend
    pub service: Option<String>,

    /// LRU capacity in records; 0 disables the cache
    pub cache_capacity: usize,

    /// Largest payload accepted by `sign`
    pub max_sign_data_len: usize,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            service: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_sign_data_len: DEFAULT_MAX_SIGN_DATA_LEN,
        }
    }
}

impl KeyringConfig {
    /// In-memory keyring with default limits
    pub fn memory() -> Self {
        Self::default()
    }

    /// Encrypted file keyring rooted at `path`
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::File,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// OS credential store keyring under `service`
    pub fn os(service: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Os,
            service: Some(service.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> KeystoreResult<()> {
        if self.backend == StoreBackend::File && self.path.is_none() {
            return Err(KeystoreError::InvalidConfig(
                "file backend requires a path".to_string(),
            ));
        }
        if self.max_sign_data_len == 0 {
            return Err(KeystoreError::InvalidConfig(
                "max_sign_data_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured store.
    ///
    /// The file backend needs a non-empty password; the others ignore it.
    pub fn open_store(&self, password: Option<SecretString>) -> KeystoreResult<Box<dyn KeyStore>> {
        self.validate()?;
        debug!(backend = %self.backend, "opening key store");

        match self.backend {
            StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
            StoreBackend::File => {
                let password = password
                    .filter(|p| !p.expose_secret().is_empty())
                    .ok_or_else(|| {
                        KeystoreError::InvalidConfig(
                            "file backend requires a password".to_string(),
                        )
                    })?;
                // validate() guarantees the path
                let path = self.path.as_deref().ok_or_else(|| {
                    KeystoreError::InvalidConfig("file backend requires a path".to_string())
                })?;
                Ok(Box::new(FileStore::open(path, password)?))
            }
            #[cfg(feature = "keychain")]
            StoreBackend::Os => {
                let service = self.service.as_deref().unwrap_or(DEFAULT_SERVICE);
                Ok(Box::new(crate::keystore::KeychainStore::open(service)?))
            }
            #[cfg(not(feature = "keychain"))]
            StoreBackend::Os => Err(KeystoreError::BackendUnavailable(
                "OS credential store requires the 'keychain' feature".to_string(),
            )),
        }
    }

    /// Build a keyring over the configured store
    pub fn open_keyring(&self, password: Option<SecretString>) -> KeyringResult<Keyring> {
        let store = self.open_store(password)?;
        Ok(Keyring::with_cache_capacity(store, self.cache_capacity)
            .with_max_sign_data_len(self.max_sign_data_len))
    }
}
