//! Input checks shared by every store.
//!
//! All of these run before any lock is taken or any byte hits disk, so a
//! rejected call never leaves partial state behind.

use crate::algorithm::Algorithm;
use crate::keystore::error::{KeystoreError, KeystoreResult};
use crate::keystore::record::{KeyRecord, MIN_SALT_LEN, NONCE_LEN};

/// Longest accepted key name, in bytes
pub const MAX_NAME_LEN: usize = 256;

/// Reject names that could escape a directory or confuse a backend.
///
/// Refuses empty names, names over [`MAX_NAME_LEN`] bytes, path separators,
/// `..`, NUL and other control bytes. Any other UTF-8 is fine.
pub fn validate_name(name: &str) -> KeystoreResult<()> {
    if name.is_empty() {
        return Err(KeystoreError::InvalidName("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(KeystoreError::InvalidName(format!(
            "name is {} bytes, maximum is {}",
            name.len(),
            MAX_NAME_LEN
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(KeystoreError::InvalidName(format!(
            "{name:?} contains a path separator"
        )));
    }
    if name.contains("..") {
        return Err(KeystoreError::InvalidName(format!("{name:?} contains '..'")));
    }
    if name.bytes().any(|b| b < 0x20) {
        return Err(KeystoreError::InvalidName(format!(
            "{name:?} contains a control character"
        )));
    }
    Ok(())
}

/// [`validate_name`] plus the rule for names that become file names
pub fn validate_file_name(name: &str) -> KeystoreResult<()> {
    validate_name(name)?;
    if name.starts_with('.') {
        return Err(KeystoreError::InvalidName(format!(
            "{name:?} starts with '.'"
        )));
    }
    Ok(())
}

pub fn validate_public_key(algorithm: Algorithm, public_key: &[u8]) -> KeystoreResult<()> {
    if public_key.len() != algorithm.key_size() {
        return Err(KeystoreError::InvalidAlgorithm(format!(
            "{algorithm} public key must be {} bytes, got {}",
            algorithm.key_size(),
            public_key.len()
        )));
    }
    Ok(())
}

/// Either both absent (plaintext) or salt >= 16 bytes and nonce == 12 bytes
pub fn validate_encryption_params(salt: Option<&[u8]>, nonce: Option<&[u8]>) -> KeystoreResult<()> {
    match (salt, nonce) {
        (None, None) => Ok(()),
        (Some(salt), Some(nonce)) => {
            if salt.len() < MIN_SALT_LEN {
                return Err(KeystoreError::InvalidEncryptionParams(format!(
                    "salt must be at least {MIN_SALT_LEN} bytes, got {}",
                    salt.len()
                )));
            }
            if nonce.len() != NONCE_LEN {
                return Err(KeystoreError::InvalidEncryptionParams(format!(
                    "nonce must be {NONCE_LEN} bytes, got {}",
                    nonce.len()
                )));
            }
            Ok(())
        }
        (Some(_), None) => Err(KeystoreError::InvalidEncryptionParams(
            "salt present without nonce".to_string(),
        )),
        (None, Some(_)) => Err(KeystoreError::InvalidEncryptionParams(
            "nonce present without salt".to_string(),
        )),
    }
}

/// Full check for a `store(name, record)` call
pub fn validate_store(name: &str, record: &KeyRecord) -> KeystoreResult<()> {
    validate_name(name)?;
    if record.name != name {
        return Err(KeystoreError::NameMismatch {
            given: name.to_string(),
            record: record.name.clone(),
        });
    }
    record.validate()
}
