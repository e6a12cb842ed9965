//! Keyring error types

use thiserror::Error;

use crate::error::CryptoError;
use crate::keystore::KeystoreError;

/// Result type for keyring operations
pub type KeyringResult<T> = Result<T, KeyringError>;

/// Errors that can occur during keyring operations
#[derive(Error, Debug)]
pub enum KeyringError {
    /// Key not found
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key already exists
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Keyring has been closed
    #[error("keyring is closed")]
    Closed,

    /// Stored or supplied key bytes do not form a usable key
    #[error("invalid key data: {0}")]
    InvalidKey(String),

    /// Sign input exceeds the configured maximum
    #[error("data too large to sign: {len} bytes (max {max})")]
    DataTooLarge { len: usize, max: usize },

    /// Algorithm not supported by this operation
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Underlying keystore error
    #[error("keystore error: {0}")]
    Keystore(#[source] KeystoreError),

    /// Key material error
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<KeystoreError> for KeyringError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::NotFound(name) => KeyringError::KeyNotFound(name),
            KeystoreError::AlreadyExists(name) => KeyringError::KeyAlreadyExists(name),
            KeystoreError::Closed => KeyringError::Closed,
            other => KeyringError::Keystore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystore_errors_are_lifted() {
        assert!(matches!(
            KeyringError::from(KeystoreError::NotFound("a".into())),
            KeyringError::KeyNotFound(name) if name == "a"
        ));
        assert!(matches!(
            KeyringError::from(KeystoreError::AlreadyExists("a".into())),
            KeyringError::KeyAlreadyExists(_)
        ));
        assert!(matches!(
            KeyringError::from(KeystoreError::Closed),
            KeyringError::Closed
        ));
        assert!(matches!(
            KeyringError::from(KeystoreError::InvalidPassword),
            KeyringError::Keystore(KeystoreError::InvalidPassword)
        ));
    }

    #[test]
    fn test_data_too_large_message() {
        let err = KeyringError::DataTooLarge { len: 10, max: 4 };
        assert_eq!(err.to_string(), "data too large to sign: 10 bytes (max 4)");
    }
}
