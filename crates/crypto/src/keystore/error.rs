//! Key store error types

use std::io;
use thiserror::Error;

/// Result type for key store operations
pub type KeystoreResult<T> = Result<T, KeystoreError>;

/// Errors raised by [`KeyStore`](super::KeyStore) implementations
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// The store has been closed
    #[error("key store is closed")]
    Closed,

    #[error("invalid key name: {0}")]
    InvalidName(String),

    /// The name argument disagrees with the record's own name
    #[error("key name mismatch: store called with {given:?}, record is named {record:?}")]
    NameMismatch { given: String, record: String },

    #[error("invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    /// Salt/nonce are partially present or have the wrong length
    #[error("invalid encryption parameters: {0}")]
    InvalidEncryptionParams(String),

    /// Decryption failed. Wrong password and tampered ciphertext are
    /// reported identically.
    #[error("invalid password or corrupted key data")]
    InvalidPassword,

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    /// The backend cannot be used in this environment
    #[error("key store backend not available: {0}")]
    BackendUnavailable(String),

    #[error("invalid key store backend: {0}. Valid options: memory, file, os")]
    InvalidBackend(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KeystoreError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
