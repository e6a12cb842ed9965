//! PBKDF2-HMAC-SHA256 key derivation and AES-256-GCM sealing
//!
//! A fresh salt and nonce are drawn per stored key, and every store/load
//! derives its key from scratch; derived keys are never cached.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use super::error::{KeystoreError, KeystoreResult};
use super::record::NONCE_LEN;
use crate::secure::SecretArray;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length drawn for each new key
pub const SALT_LEN: usize = 16;

/// AES-256 key length
const DERIVED_KEY_LEN: usize = 32;

pub(crate) fn derive_key(password: &[u8], salt: &[u8]) -> SecretArray<DERIVED_KEY_LEN> {
    let mut out = [0u8; DERIVED_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, &mut out);
    let key = SecretArray::new(out);
    out.zeroize();
    key
}

pub(crate) fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

pub(crate) fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

fn cipher(key: &SecretArray<DERIVED_KEY_LEN>) -> KeystoreResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.expose_secret())
        .map_err(|e| KeystoreError::InvalidEncryptionParams(e.to_string()))
}

fn nonce_array(nonce: &[u8]) -> KeystoreResult<[u8; NONCE_LEN]> {
    nonce.try_into().map_err(|_| {
        KeystoreError::InvalidEncryptionParams(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        ))
    })
}

/// Encrypt `plaintext`, authenticating `aad` alongside it
pub(crate) fn seal(
    key: &SecretArray<DERIVED_KEY_LEN>,
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> KeystoreResult<Vec<u8>> {
    let nonce = nonce_array(nonce)?;
    cipher(key)?
        .encrypt(
            &Nonce::from(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| KeystoreError::InvalidEncryptionParams("encryption failed".to_string()))
}

/// Decrypt and authenticate. Any tag failure is `InvalidPassword`.
pub(crate) fn open(
    key: &SecretArray<DERIVED_KEY_LEN>,
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> KeystoreResult<Zeroizing<Vec<u8>>> {
    let nonce = nonce_array(nonce)?;
    cipher(key)?
        .decrypt(
            &Nonce::from(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| KeystoreError::InvalidPassword)
}
