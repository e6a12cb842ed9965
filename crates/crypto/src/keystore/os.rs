//! OS credential store backend
//!
//! Records are kept as JSON in the platform credential store:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//!
//! The OS encrypts entries, so private bytes are stored as plaintext base64.
//! Credential stores cannot enumerate entries, so a JSON index of names is
//! kept under a reserved account. A store or delete that fails halfway can
//! leave the index out of step with the entries; [`KeychainStore::repair_index`]
//! reconciles them.
//!
//! Requires the `keychain` feature.

use keyring::Entry;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::error::{KeystoreError, KeystoreResult};
use super::record::{KeyRecord, StoredRecord};
use super::validation;
use super::{KeyStore, StoreBackend};

/// Account prefix for key entries
const KEY_PREFIX: &str = "key:";

/// Account holding the name index
const INDEX_ACCOUNT: &str = "_keylist";

/// Outcome of [`KeychainStore::repair_index`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Indexed names with no matching entry, now dropped from the index
    pub stale_removed: Vec<String>,
    /// Candidate names that had an entry but were not indexed, now added
    pub orphans_found: Vec<String>,
    pub verified: usize,
}

/// Secret text keyed by account, all under one service
trait Vault: Send + Sync {
    /// `None` when the account has no entry
    fn get(&self, account: &str) -> keyring::Result<Option<String>>;

    fn set(&self, account: &str, secret: &str) -> keyring::Result<()>;

    /// `false` when the account had no entry
    fn remove(&self, account: &str) -> keyring::Result<bool>;
}

/// [`Vault`] over the platform credential store
struct OsVault {
    service: String,
}

impl Vault for OsVault {
    fn get(&self, account: &str) -> keyring::Result<Option<String>> {
        match Entry::new(&self.service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, account: &str, secret: &str) -> keyring::Result<()> {
        Entry::new(&self.service, account)?.set_password(secret)
    }

    fn remove(&self, account: &str) -> keyring::Result<bool> {
        match Entry::new(&self.service, account)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// [`KeyStore`] backed by the OS credential store
pub struct KeychainStore {
    service: String,
    vault: Box<dyn Vault>,
    closed: RwLock<bool>,
}

fn os_error(context: &str, e: keyring::Error) -> KeystoreError {
    KeystoreError::io(context, std::io::Error::other(e.to_string()))
}

fn key_account(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

impl KeychainStore {
    /// Connect to the credential store under `service`.
    ///
    /// Reads the index entry so a missing secret service fails here with
    /// `BackendUnavailable` rather than on first use.
    pub fn open(service: &str) -> KeystoreResult<Self> {
        if service.is_empty() {
            return Err(KeystoreError::InvalidConfig(
                "service name must not be empty".to_string(),
            ));
        }
        let vault = OsVault {
            service: service.to_string(),
        };
        vault
            .get(INDEX_ACCOUNT)
            .map_err(|e| KeystoreError::BackendUnavailable(e.to_string()))?;

        info!(service, "opened OS keychain store");
        Ok(Self::with_vault(service, Box::new(vault)))
    }

    fn with_vault(service: &str, vault: Box<dyn Vault>) -> Self {
        Self {
            service: service.to_string(),
            vault,
            closed: RwLock::new(false),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn read_index(&self) -> KeystoreResult<Vec<String>> {
        match self
            .vault
            .get(INDEX_ACCOUNT)
            .map_err(|e| os_error("reading key index", e))?
        {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_index(&self, names: &[String]) -> KeystoreResult<()> {
        let json = serde_json::to_string(names)?;
        self.vault
            .set(INDEX_ACCOUNT, &json)
            .map_err(|e| os_error("writing key index", e))
    }

    fn exists(&self, name: &str) -> KeystoreResult<bool> {
        self.vault
            .get(&key_account(name))
            .map(|entry| entry.map(Zeroizing::new).is_some())
            .map_err(|e| os_error("reading key entry", e))
    }

    /// Reconcile the name index with the credential store.
    ///
    /// Drops indexed names whose entry is gone, and indexes any of
    /// `candidates` that have an entry but were missing from the index.
    pub fn repair_index(&self, candidates: &[&str]) -> KeystoreResult<RepairReport> {
        let closed = self.closed.write();
        if *closed {
            return Err(KeystoreError::Closed);
        }

        let mut report = RepairReport::default();
        let mut verified = Vec::new();
        for name in self.read_index()? {
            if self.exists(&name)? {
                verified.push(name);
            } else {
                report.stale_removed.push(name);
            }
        }
        report.verified = verified.len();

        for name in candidates {
            if verified.iter().any(|n| n == name) || validation::validate_name(name).is_err() {
                continue;
            }
            if self.exists(name)? {
                report.orphans_found.push(name.to_string());
                verified.push(name.to_string());
            }
        }

        if !report.stale_removed.is_empty() || !report.orphans_found.is_empty() {
            self.write_index(&verified)?;
            warn!(
                stale = report.stale_removed.len(),
                orphans = report.orphans_found.len(),
                "repaired keychain index"
            );
        }
        Ok(report)
    }
}

impl KeyStore for KeychainStore {
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()> {
        validation::validate_store(name, record)?;

        let closed = self.closed.write();
        if *closed {
            return Err(KeystoreError::Closed);
        }
        if self.exists(name)? {
            return Err(KeystoreError::AlreadyExists(name.to_string()));
        }

        let account = key_account(name);
        let json = Zeroizing::new(serde_json::to_string(&StoredRecord::encode(record))?);
        self.vault
            .set(&account, &json)
            .map_err(|e| os_error("writing key entry", e))?;

        let mut names = self.read_index()?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            if let Err(e) = self.write_index(&names) {
                if let Err(rollback) = self.vault.remove(&account) {
                    warn!(
                        name,
                        error = %rollback,
                        "failed to remove unindexed key entry; repair_index can re-index it"
                    );
                }
                return Err(e);
            }
        }

        debug!(name, algorithm = %record.algorithm, "stored key in OS keychain");
        Ok(())
    }

    fn load(&self, name: &str) -> KeystoreResult<KeyRecord> {
        validation::validate_name(name)?;

        let closed = self.closed.read();
        if *closed {
            return Err(KeystoreError::Closed);
        }

        let json = self
            .vault
            .get(&key_account(name))
            .map_err(|e| os_error("reading key entry", e))?
            .map(Zeroizing::new)
            .ok_or_else(|| KeystoreError::NotFound(name.to_string()))?;
        let stored: StoredRecord = serde_json::from_str(&json)?;
        let record = stored.decode()?;
        record.validate()?;
        Ok(record)
    }

    /// Remove the entry, then its index slot. If the index write fails the
    /// entry is already gone; the error is returned and `repair_index`
    /// drops the stale name.
    fn delete(&self, name: &str) -> KeystoreResult<()> {
        validation::validate_name(name)?;

        let closed = self.closed.write();
        if *closed {
            return Err(KeystoreError::Closed);
        }

        let removed = self
            .vault
            .remove(&key_account(name))
            .map_err(|e| os_error("deleting key entry", e))?;
        if !removed {
            return Err(KeystoreError::NotFound(name.to_string()));
        }

        let mut names = self.read_index()?;
        names.retain(|n| n != name);
        if let Err(e) = self.write_index(&names) {
            warn!(name, error = %e, "deleted key entry but left it in the index");
            return Err(e);
        }

        debug!(name, "deleted key from OS keychain");
        Ok(())
    }

    fn list(&self) -> KeystoreResult<Vec<String>> {
        let closed = self.closed.read();
        if *closed {
            return Err(KeystoreError::Closed);
        }
        let mut names = self.read_index()?;
        names.sort();
        Ok(names)
    }

    fn close(&self) -> KeystoreResult<()> {
        *self.closed.write() = true;
        Ok(())
    }

    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Os
    }
}

impl std::fmt::Debug for KeychainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainStore")
            .field("service", &self.service)
            .field("closed", &*self.closed.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::keys::KeyMaterial;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    /// In-process vault whose operations can be made to fail per account
    #[derive(Default)]
    struct FakeState {
        entries: Mutex<HashMap<String, String>>,
        fail_get: Mutex<HashSet<String>>,
        fail_set: Mutex<HashSet<String>>,
        fail_remove: Mutex<HashSet<String>>,
    }

    #[derive(Clone, Default)]
    struct FakeVault(Arc<FakeState>);

    fn platform_failure() -> keyring::Error {
        keyring::Error::PlatformFailure("simulated credential store failure".into())
    }

    impl Vault for FakeVault {
        fn get(&self, account: &str) -> keyring::Result<Option<String>> {
            if self.0.fail_get.lock().contains(account) {
                return Err(platform_failure());
            }
            Ok(self.0.entries.lock().get(account).cloned())
        }

        fn set(&self, account: &str, secret: &str) -> keyring::Result<()> {
            if self.0.fail_set.lock().contains(account) {
                return Err(platform_failure());
            }
            self.0
                .entries
                .lock()
                .insert(account.to_string(), secret.to_string());
            Ok(())
        }

        fn remove(&self, account: &str) -> keyring::Result<bool> {
            if self.0.fail_remove.lock().contains(account) {
                return Err(platform_failure());
            }
            Ok(self.0.entries.lock().remove(account).is_some())
        }
    }

    fn fake_store() -> (KeychainStore, FakeVault) {
        let vault = FakeVault::default();
        let store = KeychainStore::with_vault("sigvault-test", Box::new(vault.clone()));
        (store, vault)
    }

    fn record(name: &str) -> KeyRecord {
        let key = KeyMaterial::generate(Algorithm::Secp256r1);
        KeyRecord::plaintext(
            name,
            Algorithm::Secp256r1,
            key.public_key().to_vec(),
            key.to_bytes().unwrap().to_vec(),
        )
    }

    #[test]
    fn test_roundtrip_with_index() {
        let (store, vault) = fake_store();
        let rec = record("alice");
        store.store("alice", &rec).unwrap();
        store.store("bob", &record("bob")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alice", "bob"]);
        assert!(vault.0.entries.lock().contains_key("key:alice"));
        assert_eq!(store.load("alice").unwrap().private_key, rec.private_key);
        assert!(matches!(
            store.store("alice", &rec),
            Err(KeystoreError::AlreadyExists(_))
        ));

        store.delete("alice").unwrap();
        assert_eq!(store.list().unwrap(), vec!["bob"]);
        assert!(matches!(store.load("alice"), Err(KeystoreError::NotFound(_))));
        assert!(matches!(store.delete("alice"), Err(KeystoreError::NotFound(_))));
    }

    #[test]
    fn test_failed_index_write_rolls_back_entry() {
        let (store, vault) = fake_store();
        vault.0.fail_set.lock().insert(INDEX_ACCOUNT.to_string());

        assert!(matches!(
            store.store("alice", &record("alice")),
            Err(KeystoreError::Io { .. })
        ));
        assert!(!vault.0.entries.lock().contains_key("key:alice"));
        assert!(matches!(store.load("alice"), Err(KeystoreError::NotFound(_))));
    }

    #[test]
    fn test_failed_rollback_reports_index_error_and_is_repairable() {
        let (store, vault) = fake_store();
        vault.0.fail_set.lock().insert(INDEX_ACCOUNT.to_string());
        vault.0.fail_remove.lock().insert("key:alice".to_string());

        let err = store.store("alice", &record("alice")).unwrap_err();
        assert!(matches!(&err, KeystoreError::Io { context, .. } if context == "writing key index"));
        assert!(vault.0.entries.lock().contains_key("key:alice"));
        assert!(store.list().unwrap().is_empty());

        vault.0.fail_set.lock().clear();
        let report = store.repair_index(&["alice"]).unwrap();
        assert_eq!(report.orphans_found, vec!["alice"]);
        assert_eq!(store.list().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_failed_index_write_on_delete_is_reported() {
        let (store, vault) = fake_store();
        store.store("alice", &record("alice")).unwrap();
        vault.0.fail_set.lock().insert(INDEX_ACCOUNT.to_string());

        assert!(matches!(
            store.delete("alice"),
            Err(KeystoreError::Io { .. })
        ));
        // Entry gone, name still indexed
        assert!(!vault.0.entries.lock().contains_key("key:alice"));
        assert_eq!(store.list().unwrap(), vec!["alice"]);

        vault.0.fail_set.lock().clear();
        let report = store.repair_index(&[]).unwrap();
        assert_eq!(report.stale_removed, vec!["alice"]);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_repair_propagates_read_errors() {
        let (store, vault) = fake_store();
        store.store("alice", &record("alice")).unwrap();
        let copy = vault.0.entries.lock().get("key:alice").cloned().unwrap();
        vault.0.entries.lock().insert("key:orphan".to_string(), copy);
        vault.0.fail_get.lock().insert("key:orphan".to_string());

        assert!(matches!(
            store.repair_index(&["orphan"]),
            Err(KeystoreError::Io { .. })
        ));
        assert_eq!(store.list().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_close() {
        let (store, _vault) = fake_store();
        store.store("alice", &record("alice")).unwrap();
        store.close().unwrap();
        assert!(matches!(store.load("alice"), Err(KeystoreError::Closed)));
        assert!(matches!(store.list(), Err(KeystoreError::Closed)));
        assert!(matches!(
            store.repair_index(&[]),
            Err(KeystoreError::Closed)
        ));
    }

    #[test]
    #[ignore = "requires OS keyring access"]
    fn test_keychain_roundtrip() {
        let store = KeychainStore::open("sigvault-test").unwrap();
        let rec = record("keychain_roundtrip");

        let _ = store.delete("keychain_roundtrip");
        store.store("keychain_roundtrip", &rec).unwrap();
        assert!(store
            .list()
            .unwrap()
            .contains(&"keychain_roundtrip".to_string()));

        let loaded = store.load("keychain_roundtrip").unwrap();
        assert_eq!(loaded.private_key, rec.private_key);

        store.delete("keychain_roundtrip").unwrap();
        assert!(matches!(
            store.load("keychain_roundtrip"),
            Err(KeystoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_service_rejected() {
        assert!(matches!(
            KeychainStore::open(""),
            Err(KeystoreError::InvalidConfig(_))
        ));
    }
}
