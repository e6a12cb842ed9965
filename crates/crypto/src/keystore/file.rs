//! Encrypted file store
//!
//! One JSON file per key at `<dir>/<name>.key`. The private bytes are sealed
//! with AES-256-GCM under a PBKDF2-HMAC-SHA256 key derived from the store
//! password and a per-key random salt; the key name is the associated data,
//! so a file renamed to another key's name fails to decrypt.
//!
//! Files are created `0600` in a `0700` directory on Unix.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use super::cipher;
use super::error::{KeystoreError, KeystoreResult};
use super::record::{KeyRecord, StoredRecord};
use super::validation;
use super::{KeyStore, StoreBackend};
use crate::secure::SecretString;

/// Extension of key files
pub const KEY_FILE_SUFFIX: &str = ".key";

/// Extension of partially written files, never listed
const STAGED_FILE_SUFFIX: &str = ".tmp";

/// [`KeyStore`] that encrypts private bytes at rest.
///
/// Takes plaintext records and returns plaintext records; the salt, nonce
/// and ciphertext only ever exist on disk.
pub struct FileStore {
    dir: PathBuf,
    /// `None` once closed
    password: RwLock<Option<SecretString>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>, password: SecretString) -> KeystoreResult<Self> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(KeystoreError::InvalidConfig(
                "key directory must not be empty".to_string(),
            ));
        }
        if password.expose_secret().is_empty() {
            return Err(KeystoreError::InvalidConfig(
                "password must not be empty".to_string(),
            ));
        }

        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| KeystoreError::io(format!("creating {}", dir.display()), e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                fs::set_permissions(dir, perms).map_err(|e| {
                    KeystoreError::io(format!("setting permissions on {}", dir.display()), e)
                })?;
            }
        }
        if !dir.is_dir() {
            return Err(KeystoreError::InvalidConfig(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        info!(dir = %dir.display(), "opened file key store");
        Ok(Self {
            dir: dir.to_path_buf(),
            password: RwLock::new(Some(password)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{KEY_FILE_SUFFIX}"))
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> KeystoreResult<()> {
        write_new_with(&self.dir, path, |file| file.write_all(contents))
    }
}

/// Stage a file in `dir`, then link it to `path` without overwriting.
///
/// The staged file is removed on any failure, so `path` either holds the
/// complete contents or does not exist.
fn write_new_with<F>(dir: &Path, path: &Path, write: F) -> KeystoreResult<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    // tempfile creates staged files 0600 on Unix
    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(STAGED_FILE_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| KeystoreError::io(format!("staging in {}", dir.display()), e))?;

    write(staged.as_file_mut())
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| KeystoreError::io(format!("writing {}", path.display()), e))?;

    staged.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            KeystoreError::AlreadyExists(path.display().to_string())
        } else {
            KeystoreError::io(format!("creating {}", path.display()), e.error)
        }
    })?;
    Ok(())
}

impl KeyStore for FileStore {
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()> {
        validation::validate_store(name, record)?;
        validation::validate_file_name(name)?;
        if record.is_encrypted() {
            return Err(KeystoreError::InvalidEncryptionParams(
                "file store encrypts records itself; pass a plaintext record".to_string(),
            ));
        }

        let guard = self.password.write();
        let password = guard.as_ref().ok_or(KeystoreError::Closed)?;

        let path = self.key_path(name);
        if path.exists() {
            return Err(KeystoreError::AlreadyExists(name.to_string()));
        }

        let salt = cipher::generate_salt();
        let nonce = cipher::generate_nonce();
        let key = cipher::derive_key(password.expose_secret().as_bytes(), &salt);
        let ciphertext = cipher::seal(&key, &nonce, &record.private_key, name.as_bytes())?;

        let sealed = KeyRecord::encrypted(
            name,
            record.algorithm,
            record.public_key.clone(),
            ciphertext,
            salt.to_vec(),
            nonce.to_vec(),
        );
        let json = serde_json::to_vec_pretty(&StoredRecord::encode(&sealed))?;
        self.write_new(&path, &json).map_err(|e| match e {
            KeystoreError::AlreadyExists(_) => KeystoreError::AlreadyExists(name.to_string()),
            other => other,
        })?;

        debug!(name, algorithm = %record.algorithm, "stored encrypted key file");
        Ok(())
    }

    fn load(&self, name: &str) -> KeystoreResult<KeyRecord> {
        validation::validate_file_name(name)?;

        let guard = self.password.read();
        let password = guard.as_ref().ok_or(KeystoreError::Closed)?;

        let path = self.key_path(name);
        let data = fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                KeystoreError::NotFound(name.to_string())
            } else {
                KeystoreError::io(format!("reading {}", path.display()), e)
            }
        })?;
        let stored: StoredRecord = serde_json::from_slice(&data)?;

        // Unknown or inconsistent metadata is reported like a bad password
        let sealed = stored.decode().map_err(|e| match e {
            KeystoreError::InvalidAlgorithm(_) => KeystoreError::InvalidPassword,
            other => other,
        })?;
        let (Some(salt), Some(nonce)) = (sealed.salt.as_deref(), sealed.nonce.as_deref()) else {
            return Err(KeystoreError::InvalidEncryptionParams(format!(
                "{} is missing salt or nonce",
                path.display()
            )));
        };
        validation::validate_encryption_params(Some(salt), Some(nonce))?;

        let key = cipher::derive_key(password.expose_secret().as_bytes(), salt);
        let mut plaintext = match cipher::open(&key, nonce, &sealed.private_key, name.as_bytes()) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(name, "key file failed to decrypt");
                return Err(e);
            }
        };

        if sealed.name != name
            || validation::validate_public_key(sealed.algorithm, &sealed.public_key).is_err()
        {
            plaintext.zeroize();
            warn!(name, "key file metadata does not match its contents");
            return Err(KeystoreError::InvalidPassword);
        }

        Ok(KeyRecord::plaintext(
            name,
            sealed.algorithm,
            sealed.public_key.clone(),
            plaintext.to_vec(),
        ))
    }

    fn delete(&self, name: &str) -> KeystoreResult<()> {
        validation::validate_file_name(name)?;

        let guard = self.password.write();
        if guard.is_none() {
            return Err(KeystoreError::Closed);
        }

        let path = self.key_path(name);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                KeystoreError::NotFound(name.to_string())
            } else {
                KeystoreError::io(format!("removing {}", path.display()), e)
            }
        })?;
        debug!(name, "deleted key file");
        Ok(())
    }

    fn list(&self) -> KeystoreResult<Vec<String>> {
        let guard = self.password.read();
        if guard.is_none() {
            return Err(KeystoreError::Closed);
        }

        let entries = fs::read_dir(&self.dir)
            .map_err(|e| KeystoreError::io(format!("reading {}", self.dir.display()), e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| KeystoreError::io(format!("reading {}", self.dir.display()), e))?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(KEY_FILE_SUFFIX) {
                if validation::validate_file_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn contains(&self, name: &str) -> KeystoreResult<bool> {
        validation::validate_file_name(name)?;
        let guard = self.password.read();
        if guard.is_none() {
            return Err(KeystoreError::Closed);
        }
        Ok(self.key_path(name).is_file())
    }

    /// Drop the password (its buffer is zeroized) and refuse further calls
    fn close(&self) -> KeystoreResult<()> {
        if self.password.write().take().is_some() {
            info!(dir = %self.dir.display(), "closed file key store");
        }
        Ok(())
    }

    fn backend_type(&self) -> StoreBackend {
        StoreBackend::File
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("closed", &self.password.read().is_none())
            .finish()
    }
}
