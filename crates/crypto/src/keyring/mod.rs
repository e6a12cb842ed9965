//! Signing keyring
//!
//! [`Keyring`] ties a [`KeyStore`] to key generation and signing. Keys are
//! persisted as plaintext [`KeyRecord`]s (the store decides whether to
//! encrypt them at rest) and rebuilt into [`KeyMaterial`] on use. An LRU
//! [`CachingStore`] sits in front of the store unless the cache capacity is
//! zero, in which case every call goes to the backend.
//!
//! # Example
//!
//! ```rust
//! use sigvault_crypto::keyring::Keyring;
//! use sigvault_crypto::keystore::MemoryStore;
//! use sigvault_crypto::Algorithm;
//!
//! let keyring = Keyring::new(MemoryStore::new());
//! let signer = keyring.new_key("validator", Algorithm::Secp256k1).unwrap();
//!
//! let sig = keyring.sign("validator", b"block 42").unwrap();
//! assert_eq!(sig.public_key, signer.public_key().to_vec());
//! assert!(keyring.verify("validator", b"block 42", &sig.bytes).unwrap());
//! ```

pub mod error;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};
use zeroize::Zeroizing;

pub use error::{KeyringError, KeyringResult};

use crate::algorithm::Algorithm;
use crate::keys::{KeyMaterial, PublicKey, Signature, Signer};
use crate::keystore::{
    validation, CacheStats, CachingStore, KeyRecord, KeyStore, StoreBackend,
    DEFAULT_CACHE_CAPACITY,
};

/// Largest payload [`Keyring::sign`] accepts by default (64 MiB)
pub const DEFAULT_MAX_SIGN_DATA_LEN: usize = 64 * 1024 * 1024;

enum Backing {
    Cached(CachingStore<Box<dyn KeyStore>>),
    Direct(Box<dyn KeyStore>),
}

impl Backing {
    fn store(&self) -> &dyn KeyStore {
        match self {
            Backing::Cached(cache) => cache as &dyn KeyStore,
            Backing::Direct(store) => store.as_ref(),
        }
    }
}

/// Named signing keys over a pluggable store
pub struct Keyring {
    backing: Backing,
    max_sign_data_len: usize,
    closed: AtomicBool,
}

impl Keyring {
    /// Keyring over `store` with a cache of [`DEFAULT_CACHE_CAPACITY`] records
    pub fn new<S: KeyStore + 'static>(store: S) -> Self {
        Self::with_cache_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    /// Keyring over `store` with the given cache capacity. Zero disables
    /// caching.
    pub fn with_cache_capacity<S: KeyStore + 'static>(store: S, capacity: usize) -> Self {
        let store: Box<dyn KeyStore> = Box::new(store);
        let backing = if capacity == 0 {
            Backing::Direct(store)
        } else {
            Backing::Cached(CachingStore::new(store, capacity))
        };
        Self {
            backing,
            max_sign_data_len: DEFAULT_MAX_SIGN_DATA_LEN,
            closed: AtomicBool::new(false),
        }
    }

    /// Override the sign payload limit
    pub fn with_max_sign_data_len(mut self, max: usize) -> Self {
        self.max_sign_data_len = max;
        self
    }

    pub fn max_sign_data_len(&self) -> usize {
        self.max_sign_data_len
    }

    pub fn backend(&self) -> StoreBackend {
        self.backing.store().backend_type()
    }

    /// Cache counters, `None` when caching is disabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        match &self.backing {
            Backing::Cached(cache) => Some(cache.stats()),
            Backing::Direct(_) => None,
        }
    }

    fn check_open(&self) -> KeyringResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KeyringError::Closed);
        }
        Ok(())
    }

    /// Generate and persist a new key
    pub fn new_key(&self, name: &str, algorithm: Algorithm) -> KeyringResult<Signer> {
        self.check_open()?;
        validation::validate_name(name)?;

        let key = KeyMaterial::generate(algorithm);
        self.persist(name, &key)?;

        info!(name, %algorithm, "created key");
        Ok(Signer::new(name, key))
    }

    /// Import an existing private key.
    ///
    /// Only Ed25519 in its 64-byte expanded form (seed || public key) is
    /// accepted here; other algorithms fail with `UnsupportedAlgorithm`.
    pub fn import_key(
        &self,
        name: &str,
        private_key: &[u8],
        algorithm: Algorithm,
    ) -> KeyringResult<Signer> {
        self.check_open()?;
        validation::validate_name(name)?;

        if algorithm != Algorithm::Ed25519 {
            return Err(KeyringError::UnsupportedAlgorithm(format!(
                "import of {algorithm} keys is not supported"
            )));
        }

        let key = KeyMaterial::from_bytes(algorithm, private_key)
            .map_err(|e| KeyringError::InvalidKey(e.to_string()))?;
        self.persist(name, &key)?;

        info!(name, %algorithm, "imported key");
        Ok(Signer::new(name, key))
    }

    fn persist(&self, name: &str, key: &KeyMaterial) -> KeyringResult<()> {
        let private_key = key.to_bytes()?;
        let record = KeyRecord::plaintext(
            name,
            key.algorithm(),
            key.public_key().to_vec(),
            private_key.to_vec(),
        );
        self.backing.store().store(name, &record)?;
        Ok(())
    }

    /// Load a key and return a signer for it
    pub fn get_key(&self, name: &str) -> KeyringResult<Signer> {
        self.check_open()?;
        let key = self.load_key(name)?;
        Ok(Signer::new(name, key))
    }

    fn load_record(&self, name: &str) -> KeyringResult<KeyRecord> {
        let record = self.backing.store().load(name)?;
        if record.is_encrypted() {
            return Err(KeyringError::InvalidKey(format!(
                "{name}: store returned encrypted key data"
            )));
        }
        Ok(record)
    }

    fn load_key(&self, name: &str) -> KeyringResult<KeyMaterial> {
        let record = self.load_record(name)?;
        let key = KeyMaterial::from_bytes(record.algorithm, &record.private_key)
            .map_err(|e| KeyringError::InvalidKey(format!("{name}: {e}")))?;

        let stored = PublicKey::from_bytes(record.algorithm, &record.public_key)
            .map_err(|e| KeyringError::InvalidKey(format!("{name}: {e}")))?;
        if &stored != key.public_key() {
            return Err(KeyringError::InvalidKey(format!(
                "{name}: stored public key does not match private key"
            )));
        }
        Ok(key)
    }

    /// Sign `data` with the named key.
    ///
    /// Payloads longer than the configured limit fail with `DataTooLarge`
    /// before the key is touched.
    pub fn sign(&self, name: &str, data: &[u8]) -> KeyringResult<Signature> {
        if data.len() > self.max_sign_data_len {
            return Err(KeyringError::DataTooLarge {
                len: data.len(),
                max: self.max_sign_data_len,
            });
        }
        self.check_open()?;

        let key = self.load_key(name)?;
        let bytes = key.sign(data)?;
        let signature = Signature {
            algorithm: key.algorithm(),
            public_key: key.public_key().to_vec(),
            bytes,
        };
        key.zeroize();
        Ok(signature)
    }

    /// Check `signature` over `data` against the named key's public key
    pub fn verify(&self, name: &str, data: &[u8], signature: &[u8]) -> KeyringResult<bool> {
        self.check_open()?;
        let record = self.load_record(name)?;
        let public_key = PublicKey::from_bytes(record.algorithm, &record.public_key)
            .map_err(|e| KeyringError::InvalidKey(format!("{name}: {e}")))?;
        Ok(public_key.verify(data, signature))
    }

    /// Raw private key bytes. The password argument is accepted for
    /// interface stability and currently unused.
    pub fn export_key(&self, name: &str, _password: &str) -> KeyringResult<Zeroizing<Vec<u8>>> {
        self.check_open()?;
        let record = self.load_record(name)?;
        debug!(name, "exported key");
        Ok(Zeroizing::new(record.private_key.clone()))
    }

    pub fn delete_key(&self, name: &str) -> KeyringResult<()> {
        self.check_open()?;
        self.backing.store().delete(name)?;
        info!(name, "deleted key");
        Ok(())
    }

    /// Names of all stored keys, as reported by the backend
    pub fn list_keys(&self) -> KeyringResult<Vec<String>> {
        self.check_open()?;
        Ok(self.backing.store().list()?)
    }

    pub fn contains_key(&self, name: &str) -> KeyringResult<bool> {
        self.check_open()?;
        Ok(self.backing.store().contains(name)?)
    }

    /// Wipe cached keys and close the store. Persisted keys are left in
    /// place. Safe to call more than once.
    pub fn close(&self) -> KeyringResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.backing.store().close()?;
        info!(backend = %self.backend(), "closed keyring");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("backend", &self.backend())
            .field("cached", &matches!(self.backing, Backing::Cached(_)))
            .field("max_sign_data_len", &self.max_sign_data_len)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{KeystoreError, MemoryStore};
    use std::sync::Arc;

    fn keyring() -> Keyring {
        Keyring::new(MemoryStore::new())
    }

    #[test]
    fn test_new_key_and_sign() {
        let keyring = keyring();
        for &algorithm in Algorithm::all() {
            let name = format!("key-{algorithm}");
            let signer = keyring.new_key(&name, algorithm).unwrap();
            assert_eq!(signer.algorithm(), algorithm);

            let sig = keyring.sign(&name, b"hello").unwrap();
            assert_eq!(sig.bytes.len(), algorithm.signature_size());
            assert_eq!(sig.algorithm, algorithm);
            assert!(signer.verify(b"hello", &sig.bytes));
            assert!(keyring.verify(&name, b"hello", &sig.bytes).unwrap());
            assert!(!keyring.verify(&name, b"other", &sig.bytes).unwrap());
        }
    }

    #[test]
    fn test_new_key_duplicate() {
        let keyring = keyring();
        keyring.new_key("alice", Algorithm::Ed25519).unwrap();
        assert!(matches!(
            keyring.new_key("alice", Algorithm::Secp256k1),
            Err(KeyringError::KeyAlreadyExists(name)) if name == "alice"
        ));
    }

    #[test]
    fn test_new_key_invalid_name() {
        let keyring = keyring();
        assert!(matches!(
            keyring.new_key("../escape", Algorithm::Ed25519),
            Err(KeyringError::Keystore(KeystoreError::InvalidName(_)))
        ));
        assert!(keyring.list_keys().unwrap().is_empty());
    }

    #[test]
    fn test_get_key_matches_created() {
        let keyring = keyring();
        let created = keyring.new_key("alice", Algorithm::Secp256r1).unwrap();
        let loaded = keyring.get_key("alice").unwrap();
        assert_eq!(created.public_key(), loaded.public_key());
        assert_eq!(loaded.name(), "alice");

        assert!(matches!(
            keyring.get_key("bob"),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_sign_missing_key() {
        assert!(matches!(
            keyring().sign("ghost", b"data"),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_sign_data_too_large() {
        let keyring = keyring().with_max_sign_data_len(16);
        keyring.new_key("alice", Algorithm::Ed25519).unwrap();

        assert!(keyring.sign("alice", &[0u8; 16]).is_ok());
        assert!(matches!(
            keyring.sign("alice", &[0u8; 17]),
            Err(KeyringError::DataTooLarge { len: 17, max: 16 })
        ));
    }

    #[test]
    fn test_deterministic_signatures_across_loads() {
        let keyring = keyring();
        keyring.new_key("k1", Algorithm::Secp256k1).unwrap();
        let a = keyring.sign("k1", b"same message").unwrap();
        let b = keyring.sign("k1", b"same message").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_import_ed25519() {
        let key = KeyMaterial::generate(Algorithm::Ed25519);
        let bytes = key.to_bytes().unwrap();

        let keyring = keyring();
        let signer = keyring.import_key("imported", &bytes, Algorithm::Ed25519).unwrap();
        assert_eq!(signer.public_key(), key.public_key());

        let exported = keyring.export_key("imported", "").unwrap();
        assert_eq!(&exported[..], &bytes[..]);
    }

    #[test]
    fn test_import_rejects_other_algorithms() {
        let keyring = keyring();
        let key = KeyMaterial::generate(Algorithm::Secp256k1);
        let bytes = key.to_bytes().unwrap();
        assert!(matches!(
            keyring.import_key("k1", &bytes, Algorithm::Secp256k1),
            Err(KeyringError::UnsupportedAlgorithm(_))
        ));
        assert!(!keyring.contains_key("k1").unwrap());
    }

    #[test]
    fn test_import_rejects_bad_bytes() {
        let keyring = keyring();
        assert!(matches!(
            keyring.import_key("short", &[7u8; 32], Algorithm::Ed25519),
            Err(KeyringError::InvalidKey(_))
        ));

        // Embedded public half does not match the seed
        let key = KeyMaterial::generate(Algorithm::Ed25519);
        let mut bytes = key.to_bytes().unwrap();
        bytes[40] ^= 0xFF;
        assert!(matches!(
            keyring.import_key("tampered", &bytes, Algorithm::Ed25519),
            Err(KeyringError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_export_missing() {
        assert!(matches!(
            keyring().export_key("ghost", "pw"),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_delete_and_list() {
        let keyring = keyring();
        keyring.new_key("b", Algorithm::Ed25519).unwrap();
        keyring.new_key("a", Algorithm::Secp256k1).unwrap();
        assert_eq!(keyring.list_keys().unwrap(), vec!["a", "b"]);

        keyring.delete_key("a").unwrap();
        assert_eq!(keyring.list_keys().unwrap(), vec!["b"]);
        assert!(matches!(
            keyring.get_key("a"),
            Err(KeyringError::KeyNotFound(_))
        ));
        assert!(matches!(
            keyring.delete_key("a"),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_cache_counters() {
        let keyring = Keyring::with_cache_capacity(MemoryStore::new(), 2);
        keyring.new_key("alice", Algorithm::Ed25519).unwrap();
        keyring.sign("alice", b"one").unwrap();
        keyring.sign("alice", b"two").unwrap();

        let stats = keyring.cache_stats().unwrap();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_zero_capacity_bypasses_cache() {
        let store = Arc::new(MemoryStore::new());
        let keyring = Keyring::with_cache_capacity(store.clone(), 0);
        assert!(keyring.cache_stats().is_none());

        keyring.new_key("alice", Algorithm::Ed25519).unwrap();
        // Removing behind the keyring's back is seen immediately
        store.delete("alice").unwrap();
        assert!(matches!(
            keyring.sign("alice", b"x"),
            Err(KeyringError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_encrypted_record_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let key = KeyMaterial::generate(Algorithm::Ed25519);
        let record = KeyRecord::encrypted(
            "sealed",
            Algorithm::Ed25519,
            key.public_key().to_vec(),
            vec![1u8; 80],
            vec![2u8; 16],
            vec![3u8; 12],
        );
        store.store("sealed", &record).unwrap();

        let keyring = Keyring::new(store);
        assert!(matches!(
            keyring.get_key("sealed"),
            Err(KeyringError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_mismatched_public_key_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let key = KeyMaterial::generate(Algorithm::Secp256k1);
        let other = KeyMaterial::generate(Algorithm::Secp256k1);
        let record = KeyRecord::plaintext(
            "swapped",
            Algorithm::Secp256k1,
            other.public_key().to_vec(),
            key.to_bytes().unwrap().to_vec(),
        );
        store.store("swapped", &record).unwrap();

        let keyring = Keyring::new(store);
        assert!(matches!(
            keyring.sign("swapped", b"x"),
            Err(KeyringError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_use() {
        let keyring = keyring();
        keyring.new_key("alice", Algorithm::Ed25519).unwrap();

        keyring.close().unwrap();
        keyring.close().unwrap();
        assert!(keyring.is_closed());
        assert!(matches!(keyring.sign("alice", b"x"), Err(KeyringError::Closed)));
        assert!(matches!(keyring.list_keys(), Err(KeyringError::Closed)));
        assert!(matches!(
            keyring.new_key("bob", Algorithm::Ed25519),
            Err(KeyringError::Closed)
        ));
    }
}
