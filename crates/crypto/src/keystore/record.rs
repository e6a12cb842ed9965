//! Serializable key snapshot

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithm::Algorithm;
use crate::keystore::error::{KeystoreError, KeystoreResult};
use crate::keystore::validation;

/// Minimum salt length for encrypted records
pub const MIN_SALT_LEN: usize = 16;
/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// A stored key: name, algorithm, public bytes and private bytes.
///
/// `private_key` is plaintext when `salt` and `nonce` are both `None`, and
/// ciphertext when both are set. Mixed states are rejected by [`validate`].
/// All byte fields are wiped on drop.
///
/// [`validate`]: KeyRecord::validate
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyRecord {
    #[zeroize(skip)]
    pub name: String,
    #[zeroize(skip)]
    pub algorithm: Algorithm,
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
    pub salt: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
}

impl KeyRecord {
    pub fn plaintext(
        name: impl Into<String>,
        algorithm: Algorithm,
        public_key: Vec<u8>,
        private_key: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm,
            public_key,
            private_key,
            salt: None,
            nonce: None,
        }
    }

    pub fn encrypted(
        name: impl Into<String>,
        algorithm: Algorithm,
        public_key: Vec<u8>,
        ciphertext: Vec<u8>,
        salt: Vec<u8>,
        nonce: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm,
            public_key,
            private_key: ciphertext,
            salt: Some(salt),
            nonce: Some(nonce),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.salt.is_some() && self.nonce.is_some()
    }

    /// Check name, public key length and encryption parameters
    pub fn validate(&self) -> KeystoreResult<()> {
        validation::validate_name(&self.name)?;
        validation::validate_public_key(self.algorithm, &self.public_key)?;
        validation::validate_encryption_params(self.salt.as_deref(), self.nonce.as_deref())
    }

    /// Overwrite all byte fields with zeros and empty them
    pub fn wipe(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("public_key", &hex::encode(&self.public_key))
            .field("private_key", &"[REDACTED]")
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

/// On-disk JSON shape of a record. Byte fields are base64; salt and nonce
/// are omitted for plaintext records.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct StoredRecord {
    pub name: String,
    pub algorithm: String,
    pub pub_key: String,
    pub priv_key_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl StoredRecord {
    pub fn encode(record: &KeyRecord) -> Self {
        Self {
            name: record.name.clone(),
            algorithm: record.algorithm.to_string(),
            pub_key: BASE64.encode(&record.public_key),
            priv_key_data: BASE64.encode(&record.private_key),
            salt: record.salt.as_ref().map(|s| BASE64.encode(s)),
            nonce: record.nonce.as_ref().map(|n| BASE64.encode(n)),
        }
    }

    /// Decode back into a record.
    ///
    /// An unknown algorithm string yields `InvalidAlgorithm`; bad base64
    /// yields `Encoding`. The record is not validated.
    pub fn decode(&self) -> KeystoreResult<KeyRecord> {
        let algorithm: Algorithm = self
            .algorithm
            .parse()
            .map_err(|_| KeystoreError::InvalidAlgorithm(self.algorithm.clone()))?;
        Ok(KeyRecord {
            name: self.name.clone(),
            algorithm,
            public_key: decode_field("pub_key", &self.pub_key)?,
            private_key: decode_field("priv_key_data", &self.priv_key_data)?,
            salt: self
                .salt
                .as_deref()
                .map(|s| decode_field("salt", s))
                .transpose()?,
            nonce: self
                .nonce
                .as_deref()
                .map(|n| decode_field("nonce", n))
                .transpose()?,
        })
    }
}

fn decode_field(field: &str, value: &str) -> KeystoreResult<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| KeystoreError::Encoding(format!("invalid base64 in {field}: {e}")))
}
