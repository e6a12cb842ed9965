//! Signing keys and key storage for sigvault
//!
//! This crate provides:
//! - Ed25519, secp256k1 and secp256r1 signing keys behind one [`KeyMaterial`] type
//! - Low-S canonicalization of ECDSA signatures against malleability
//! - Key stores: in-memory, encrypted files, and the OS credential store
//!   (feature `keychain`), with an LRU cache decorator
//! - A [`Keyring`] facade that generates, persists and signs with named keys

pub mod algorithm;
pub mod config;
pub mod ed25519;
pub mod error;
pub mod keyring;
pub mod keys;
pub mod keystore;
pub mod secp256k1;
pub mod secp256r1;
pub mod secure;
pub mod signature;

// Algorithm exports
pub use algorithm::{
    Algorithm, COMPRESSED_KEY_SIZE, EC_PRIVATE_KEY_SIZE, ED25519_KEY_SIZE,
    ED25519_PRIVATE_KEY_SIZE, SIGNATURE_SIZE,
};

// Per-curve exports
pub use ed25519::{Ed25519PublicKey, Ed25519SecretKey};
pub use secp256k1::{Secp256k1PublicKey, Secp256k1SecretKey};
pub use secp256r1::{Secp256r1PublicKey, Secp256r1SecretKey};

// Key exports
pub use keys::{KeyMaterial, PublicKey, Signature, Signer};

// Error exports
pub use error::CryptoError;

// Secure memory exports
pub use secure::{ExposeSecret, SecretArray, SecretString};

// Keystore exports
#[cfg(feature = "keychain")]
pub use keystore::KeychainStore;
pub use keystore::{
    CacheStats, CachingStore, FileStore, KeyRecord, KeyStore, KeystoreError, KeystoreResult,
    MemoryStore, StoreBackend,
};

// Keyring exports
pub use config::KeyringConfig;
pub use keyring::{Keyring, KeyringError, KeyringResult, DEFAULT_MAX_SIGN_DATA_LEN};
