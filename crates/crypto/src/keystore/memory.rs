//! In-memory key store
//!
//! Records live in a `HashMap` behind a single `parking_lot::RwLock`, along
//! with the closed flag, so a close can never interleave with a half-done
//! write. Records are copied on the way in and on the way out.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::error::{KeystoreError, KeystoreResult};
use super::record::KeyRecord;
use super::validation;
use super::{KeyStore, StoreBackend};

struct MemoryState {
    records: HashMap<String, KeyRecord>,
    closed: bool,
}

impl MemoryState {
    fn wipe_all(&mut self) {
        for (_, mut record) in self.records.drain() {
            record.wipe();
        }
    }
}

/// Non-persistent [`KeyStore`] for tests and ephemeral signers
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-size the map for `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                records: HashMap::with_capacity(capacity),
                closed: false,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wipe and drop every record. The store stays open.
    pub fn clear(&self) {
        self.state.write().wipe_all();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryStore {
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()> {
        validation::validate_store(name, record)?;

        let mut state = self.state.write();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        if state.records.contains_key(name) {
            return Err(KeystoreError::AlreadyExists(name.to_string()));
        }
        state.records.insert(name.to_string(), record.clone());
        debug!(name, algorithm = %record.algorithm, "stored key in memory");
        Ok(())
    }

    fn load(&self, name: &str) -> KeystoreResult<KeyRecord> {
        let state = self.state.read();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        state
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> KeystoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        let mut record = state
            .records
            .remove(name)
            .ok_or_else(|| KeystoreError::NotFound(name.to_string()))?;
        record.wipe();
        debug!(name, "deleted key from memory");
        Ok(())
    }

    fn list(&self) -> KeystoreResult<Vec<String>> {
        let state = self.state.read();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        let mut names: Vec<String> = state.records.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn contains(&self, name: &str) -> KeystoreResult<bool> {
        let state = self.state.read();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        Ok(state.records.contains_key(name))
    }

    fn close(&self) -> KeystoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        state.wipe_all();
        state.closed = true;
        debug!("closed memory store");
        Ok(())
    }

    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryStore")
            .field("keys", &state.records.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::keys::KeyMaterial;

    fn record(name: &str) -> KeyRecord {
        let key = KeyMaterial::generate(Algorithm::Ed25519);
        KeyRecord::plaintext(
            name,
            Algorithm::Ed25519,
            key.public_key().to_vec(),
            key.to_bytes().unwrap().to_vec(),
        )
    }

    #[test]
    fn test_store_load_delete() {
        let store = MemoryStore::new();
        let rec = record("alice");
        store.store("alice", &rec).unwrap();

        let loaded = store.load("alice").unwrap();
        assert_eq!(loaded.private_key, rec.private_key);
        assert_eq!(store.list().unwrap(), vec!["alice".to_string()]);

        store.delete("alice").unwrap();
        assert!(matches!(store.load("alice"), Err(KeystoreError::NotFound(_))));
        assert!(matches!(store.delete("alice"), Err(KeystoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let store = MemoryStore::new();
        store.store("alice", &record("alice")).unwrap();
        assert!(matches!(
            store.store("alice", &record("alice")),
            Err(KeystoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_validation_before_mutation() {
        let store = MemoryStore::new();
        let mut bad = record("alice");
        bad.salt = Some(vec![0u8; 16]);
        assert!(matches!(
            store.store("alice", &bad),
            Err(KeystoreError::InvalidEncryptionParams(_))
        ));
        assert!(matches!(
            store.store("../alice", &record("../alice")),
            Err(KeystoreError::InvalidName(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_returned_records_are_copies() {
        let store = MemoryStore::new();
        let mut rec = record("alice");
        store.store("alice", &rec).unwrap();
        let original = store.load("alice").unwrap().private_key.clone();

        // Mutating the caller's copy and a loaded copy leaves the store intact
        rec.private_key[0] ^= 0xFF;
        let mut loaded = store.load("alice").unwrap();
        loaded.private_key[1] ^= 0xFF;

        assert_eq!(store.load("alice").unwrap().private_key, original);
    }

    #[test]
    fn test_close() {
        let store = MemoryStore::new();
        store.store("alice", &record("alice")).unwrap();
        store.close().unwrap();

        assert!(store.is_empty());
        assert!(matches!(store.load("alice"), Err(KeystoreError::Closed)));
        assert!(matches!(
            store.store("bob", &record("bob")),
            Err(KeystoreError::Closed)
        ));
        assert!(matches!(store.list(), Err(KeystoreError::Closed)));
        // Idempotent
        store.close().unwrap();
    }

    #[test]
    fn test_clear_keeps_store_open() {
        let store = MemoryStore::with_capacity(4);
        store.store("a", &record("a")).unwrap();
        store.store("b", &record("b")).unwrap();
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
        store.store("a", &record("a")).unwrap();
    }

    #[test]
    fn test_list_sorted() {
        let store = MemoryStore::new();
        for name in ["charlie", "alice", "bob"] {
            store.store(name, &record(name)).unwrap();
        }
        assert_eq!(store.list().unwrap(), vec!["alice", "bob", "charlie"]);
    }
}
