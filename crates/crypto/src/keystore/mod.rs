//! Key storage
//!
//! A [`KeyStore`] persists [`KeyRecord`]s by name. Implementations:
//!
//! - [`MemoryStore`]: in-process map, nothing survives the process
//! - [`FileStore`]: one JSON file per key, private bytes sealed with
//!   PBKDF2-HMAC-SHA256 + AES-256-GCM, files `0600` in a `0700` directory
//! - `KeychainStore`: the OS credential store (feature `keychain`)
//! - [`CachingStore`]: LRU decorator over any of the above
//!
//! Every store validates names and records before touching state, hands out
//! copies rather than references, and wipes private bytes it discards.
//!
//! # Example
//!
//! ```rust
//! use sigvault_crypto::keystore::{KeyRecord, KeyStore, MemoryStore};
//! use sigvault_crypto::{Algorithm, KeyMaterial};
//!
//! let store = MemoryStore::new();
//! let key = KeyMaterial::generate(Algorithm::Ed25519);
//! let record = KeyRecord::plaintext(
//!     "alice",
//!     Algorithm::Ed25519,
//!     key.public_key().to_vec(),
//!     key.to_bytes().unwrap().to_vec(),
//! );
//! store.store("alice", &record).unwrap();
//! assert_eq!(store.load("alice").unwrap().public_key, record.public_key);
//! ```

mod caching;
mod cipher;
pub mod error;
mod file;
mod memory;
#[cfg(feature = "keychain")]
mod os;
mod record;
pub mod validation;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use caching::{CacheStats, CachingStore, DEFAULT_CACHE_CAPACITY};
pub use cipher::{PBKDF2_ITERATIONS, SALT_LEN};
pub use error::{KeystoreError, KeystoreResult};
pub use file::{FileStore, KEY_FILE_SUFFIX};
pub use memory::MemoryStore;
#[cfg(feature = "keychain")]
pub use os::{KeychainStore, RepairReport};
pub use record::{KeyRecord, MIN_SALT_LEN, NONCE_LEN};

/// Where a store keeps its records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory only
    #[default]
    Memory,

    /// Encrypted files in a directory. Requires a password.
    File,

    /// OS credential store: macOS Keychain, Windows Credential Manager or
    /// Secret Service on Linux. Requires the `keychain` feature.
    Os,
}

impl StoreBackend {
    pub fn variants() -> &'static [&'static str] {
        &["memory", "file", "os"]
    }

    pub fn requires_password(&self) -> bool {
        matches!(self, StoreBackend::File)
    }

    /// Whether keys outlive the process
    pub fn is_persistent(&self) -> bool {
        match self {
            StoreBackend::Memory => false,
            StoreBackend::File | StoreBackend::Os => true,
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::File => write!(f, "file"),
            StoreBackend::Os => write!(f, "os"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = KeystoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            "os" => Ok(StoreBackend::Os),
            _ => Err(KeystoreError::InvalidBackend(s.to_string())),
        }
    }
}

/// Storage contract for key records.
///
/// Implementations must be safe to share across threads. Records returned by
/// `load` are independent copies; the caller owns them and should wipe them
/// when done.
pub trait KeyStore: Send + Sync {
    /// Persist `record` under `name`.
    ///
    /// Fails with `AlreadyExists` if the name is taken, and with a validation
    /// error if the name or record is malformed.
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()>;

    /// Fetch a copy of the record stored under `name`
    fn load(&self, name: &str) -> KeystoreResult<KeyRecord>;

    /// Remove the record stored under `name`
    fn delete(&self, name: &str) -> KeystoreResult<()>;

    /// Names of all stored records
    fn list(&self) -> KeystoreResult<Vec<String>>;

    fn contains(&self, name: &str) -> KeystoreResult<bool> {
        match self.load(name) {
            Ok(mut record) => {
                record.wipe();
                Ok(true)
            }
            Err(KeystoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release resources and wipe secrets. Later calls fail with `Closed`.
    fn close(&self) -> KeystoreResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> StoreBackend;
}

impl<T: KeyStore + ?Sized> KeyStore for Box<T> {
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()> {
        (**self).store(name, record)
    }

    fn load(&self, name: &str) -> KeystoreResult<KeyRecord> {
        (**self).load(name)
    }

    fn delete(&self, name: &str) -> KeystoreResult<()> {
        (**self).delete(name)
    }

    fn list(&self) -> KeystoreResult<Vec<String>> {
        (**self).list()
    }

    fn contains(&self, name: &str) -> KeystoreResult<bool> {
        (**self).contains(name)
    }

    fn close(&self) -> KeystoreResult<()> {
        (**self).close()
    }

    fn backend_type(&self) -> StoreBackend {
        (**self).backend_type()
    }
}

impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()> {
        (**self).store(name, record)
    }

    fn load(&self, name: &str) -> KeystoreResult<KeyRecord> {
        (**self).load(name)
    }

    fn delete(&self, name: &str) -> KeystoreResult<()> {
        (**self).delete(name)
    }

    fn list(&self) -> KeystoreResult<Vec<String>> {
        (**self).list()
    }

    fn contains(&self, name: &str) -> KeystoreResult<bool> {
        (**self).contains(name)
    }

    fn close(&self) -> KeystoreResult<()> {
        (**self).close()
    }

    fn backend_type(&self) -> StoreBackend {
        (**self).backend_type()
    }
}
