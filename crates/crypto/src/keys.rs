//! Algorithm-agnostic signing keys
//!
//! [`KeyMaterial`] owns exactly one private scalar or seed and dispatches to
//! the per-curve modules by [`Algorithm`]. The secret lives in a zeroizing
//! buffer behind a lock, so a shared key can be wiped in place while other
//! holders still reference it. Once wiped the key refuses to sign or export.
//!
//! [`Signer`] is the cheap, cloneable handle the keyring hands out.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::algorithm::{Algorithm, ED25519_PRIVATE_KEY_SIZE};
use crate::ed25519::{Ed25519PublicKey, Ed25519SecretKey};
use crate::error::CryptoError;
use crate::secp256k1::{Secp256k1PublicKey, Secp256k1SecretKey};
use crate::secp256r1::{Secp256r1PublicKey, Secp256r1SecretKey};
use crate::secure::SecretArray;

/// Public half of a signing key: raw 32 bytes for Ed25519, compressed SEC1
/// (33 bytes) for the ECDSA curves.
#[derive(Clone)]
pub struct PublicKey {
    algorithm: Algorithm,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Parse and validate an encoded public key
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, CryptoError> {
        match algorithm {
            Algorithm::Ed25519 => {
                Ed25519PublicKey::from_bytes(bytes)?;
            }
            Algorithm::Secp256k1 => {
                Secp256k1PublicKey::from_bytes(bytes)?;
            }
            Algorithm::Secp256r1 => {
                Secp256r1PublicKey::from_bytes(bytes)?;
            }
        }
        Ok(Self {
            algorithm,
            bytes: bytes.to_vec(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Verify `signature` over `msg`.
    ///
    /// ECDSA accepts both low-S and high-S forms. Malformed signatures of any
    /// kind yield `false`.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        match self.algorithm {
            Algorithm::Ed25519 => Ed25519PublicKey::from_bytes(&self.bytes)
                .map(|pk| pk.verify(msg, signature))
                .unwrap_or(false),
            Algorithm::Secp256k1 => Secp256k1PublicKey::from_bytes(&self.bytes)
                .map(|pk| pk.verify(msg, signature))
                .unwrap_or(false),
            Algorithm::Secp256r1 => Secp256r1PublicKey::from_bytes(&self.bytes)
                .map(|pk| pk.verify(msg, signature))
                .unwrap_or(false),
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl Eq for PublicKey {}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64.encode(&self.bytes))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}, {})", self.algorithm, hex::encode(&self.bytes))
    }
}

/// A produced signature together with the key that made it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub algorithm: Algorithm,
    pub public_key: Vec<u8>,
    pub bytes: Vec<u8>,
}

impl Signature {
    /// Check this signature against its own embedded public key
    pub fn verify(&self, msg: &[u8]) -> bool {
        PublicKey::from_bytes(self.algorithm, &self.public_key)
            .map(|pk| pk.verify(msg, &self.bytes))
            .unwrap_or(false)
    }
}

struct KeySecret {
    bytes: SecretArray<32>,
    live: bool,
}

/// A private signing key for one of the supported algorithms.
///
/// The 32-byte secret is the Ed25519 seed or the EC scalar. `zeroize` is a
/// one-way transition: afterwards `sign` and `to_bytes` fail with
/// [`CryptoError::Zeroized`]. The buffer is also wiped on drop.
pub struct KeyMaterial {
    algorithm: Algorithm,
    public_key: PublicKey,
    secret: RwLock<KeySecret>,
}

impl KeyMaterial {
    /// Generate a fresh random key
    pub fn generate(algorithm: Algorithm) -> Self {
        let mut rng = rand::thread_rng();
        match algorithm {
            Algorithm::Ed25519 => {
                let sk = Ed25519SecretKey::generate(&mut rng);
                Self::new(algorithm, sk.public_key().to_bytes().to_vec(), sk.to_seed())
            }
            Algorithm::Secp256k1 => {
                let sk = Secp256k1SecretKey::generate(&mut rng);
                Self::new(algorithm, sk.public_key().to_bytes().to_vec(), sk.to_bytes())
            }
            Algorithm::Secp256r1 => {
                let sk = Secp256r1SecretKey::generate(&mut rng);
                Self::new(algorithm, sk.public_key().to_bytes().to_vec(), sk.to_bytes())
            }
        }
    }

    /// Rebuild a key from its private encoding.
    ///
    /// Ed25519 takes the 64-byte expanded form (seed || public key); the EC
    /// curves take a 32-byte big-endian scalar in `[1, n-1]`.
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, CryptoError> {
        match algorithm {
            Algorithm::Ed25519 => {
                let sk = Ed25519SecretKey::from_expanded(bytes)?;
                Ok(Self::new(
                    algorithm,
                    sk.public_key().to_bytes().to_vec(),
                    sk.to_seed(),
                ))
            }
            Algorithm::Secp256k1 => {
                let sk = Secp256k1SecretKey::from_bytes(bytes)?;
                Ok(Self::new(
                    algorithm,
                    sk.public_key().to_bytes().to_vec(),
                    sk.to_bytes(),
                ))
            }
            Algorithm::Secp256r1 => {
                let sk = Secp256r1SecretKey::from_bytes(bytes)?;
                Ok(Self::new(
                    algorithm,
                    sk.public_key().to_bytes().to_vec(),
                    sk.to_bytes(),
                ))
            }
        }
    }

    fn new(algorithm: Algorithm, public_key: Vec<u8>, mut secret: [u8; 32]) -> Self {
        let bytes = SecretArray::new(secret);
        secret.zeroize();
        Self {
            algorithm,
            public_key: PublicKey {
                algorithm,
                bytes: public_key,
            },
            secret: RwLock::new(KeySecret { bytes, live: true }),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign `msg`.
    ///
    /// Ed25519 signs the raw message. The ECDSA curves sign `SHA-256(msg)`
    /// with an RFC 6979 nonce and always return the low-S form.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let secret = self.secret.read();
        if !secret.live {
            return Err(CryptoError::Zeroized);
        }
        let raw = secret.bytes.expose_secret();
        let sig = match self.algorithm {
            Algorithm::Ed25519 => Ed25519SecretKey::from_seed(raw).sign(msg),
            Algorithm::Secp256k1 => Secp256k1SecretKey::from_bytes(raw)?.sign(msg),
            Algorithm::Secp256r1 => Secp256r1SecretKey::from_bytes(raw)?.sign(msg),
        };
        Ok(sig.to_vec())
    }

    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        self.public_key.verify(msg, signature)
    }

    /// Private encoding accepted by [`KeyMaterial::from_bytes`]
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let secret = self.secret.read();
        if !secret.live {
            return Err(CryptoError::Zeroized);
        }
        let mut out = Zeroizing::new(Vec::with_capacity(self.algorithm.private_key_size()));
        out.extend_from_slice(secret.bytes.expose_secret());
        if self.algorithm == Algorithm::Ed25519 {
            out.extend_from_slice(self.public_key.as_bytes());
            debug_assert_eq!(out.len(), ED25519_PRIVATE_KEY_SIZE);
        }
        Ok(out)
    }

    /// Wipe the private bytes. Idempotent.
    pub fn zeroize(&self) {
        let mut secret = self.secret.write();
        secret.bytes.zeroize();
        secret.live = false;
    }

    pub fn is_zeroized(&self) -> bool {
        !self.secret.read().live
    }

    #[cfg(test)]
    pub(crate) fn secret_is_zeroed(&self) -> bool {
        self.secret.read().bytes.is_zeroed()
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("public_key", &self.public_key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Named handle to a key, shareable across threads
#[derive(Clone)]
pub struct Signer {
    name: String,
    key: Arc<KeyMaterial>,
}

impl Signer {
    pub fn new(name: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            name: name.into(),
            key: Arc::new(key),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn sign(&self, msg: &[u8]) -> Result<Signature, CryptoError> {
        let bytes = self.key.sign(msg)?;
        Ok(Signature {
            algorithm: self.key.algorithm(),
            public_key: self.key.public_key().to_vec(),
            bytes,
        })
    }

    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        self.key.verify(msg, signature)
    }

    /// Wipe the underlying key for every clone of this signer
    pub fn zeroize(&self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("name", &self.name)
            .field("public_key", self.key.public_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_algorithms() {
        for &algorithm in Algorithm::all() {
            let key = KeyMaterial::generate(algorithm);
            let sig = key.sign(b"hello").unwrap();
            assert_eq!(sig.len(), algorithm.signature_size());
            assert!(key.verify(b"hello", &sig));
            assert!(!key.verify(b"hellO", &sig));
            assert_eq!(key.public_key().as_bytes().len(), algorithm.key_size());
        }
    }

    #[test]
    fn test_cross_key_rejection() {
        for &algorithm in Algorithm::all() {
            let k1 = KeyMaterial::generate(algorithm);
            let k2 = KeyMaterial::generate(algorithm);
            let sig = k1.sign(b"payload").unwrap();
            assert!(!k2.verify(b"payload", &sig));
            assert_ne!(k1, k2);
        }
    }

    #[test]
    fn test_ed25519_signature_len() {
        let key = KeyMaterial::generate(Algorithm::Ed25519);
        assert_eq!(key.sign(b"hello").unwrap().len(), 64);
    }

    #[test]
    fn test_secp256k1_public_key_len() {
        let key = KeyMaterial::generate(Algorithm::Secp256k1);
        let pk = key.public_key().as_bytes();
        assert_eq!(pk.len(), 33);
        assert!(pk[0] == 0x02 || pk[0] == 0x03);
    }

    #[test]
    fn test_bytes_roundtrip_is_deterministic() {
        for &algorithm in Algorithm::all() {
            let key = KeyMaterial::generate(algorithm);
            let bytes = key.to_bytes().unwrap();
            assert_eq!(bytes.len(), algorithm.private_key_size());

            let a = KeyMaterial::from_bytes(algorithm, &bytes).unwrap();
            let b = KeyMaterial::from_bytes(algorithm, &bytes).unwrap();
            assert_eq!(a, key);
            assert_eq!(a.sign(b"same").unwrap(), b.sign(b"same").unwrap());
        }
    }

    #[test]
    fn test_from_bytes_wrong_size() {
        let err = KeyMaterial::from_bytes(Algorithm::Secp256k1, &[1u8; 31]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeySize {
                algorithm: Algorithm::Secp256k1,
                expected: 32,
                actual: 31
            }
        );
        assert!(matches!(
            KeyMaterial::from_bytes(Algorithm::Ed25519, &[1u8; 32]),
            Err(CryptoError::InvalidKeySize { expected: 64, .. })
        ));
    }

    #[test]
    fn test_from_bytes_zero_scalar() {
        for algorithm in [Algorithm::Secp256k1, Algorithm::Secp256r1] {
            assert_eq!(
                KeyMaterial::from_bytes(algorithm, &[0u8; 32]).unwrap_err(),
                CryptoError::InvalidScalarRange
            );
        }
    }

    #[test]
    fn test_zeroize_wipes_and_blocks_use() {
        for &algorithm in Algorithm::all() {
            let key = KeyMaterial::generate(algorithm);
            assert!(!key.secret_is_zeroed());

            key.zeroize();
            assert!(key.is_zeroized());
            assert!(key.secret_is_zeroed());
            assert_eq!(key.sign(b"after").unwrap_err(), CryptoError::Zeroized);
            assert!(matches!(key.to_bytes(), Err(CryptoError::Zeroized)));

            // Idempotent
            key.zeroize();
            assert!(key.is_zeroized());
        }
    }

    #[test]
    fn test_zeroize_through_signer_clone() {
        let signer = Signer::new("k", KeyMaterial::generate(Algorithm::Secp256r1));
        let other = signer.clone();
        signer.zeroize();
        assert_eq!(other.sign(b"x").unwrap_err(), CryptoError::Zeroized);
    }

    #[test]
    fn test_public_key_parse_and_display() {
        let key = KeyMaterial::generate(Algorithm::Secp256k1);
        let parsed = PublicKey::from_bytes(Algorithm::Secp256k1, key.public_key().as_bytes())
            .unwrap();
        assert_eq!(&parsed, key.public_key());
        assert_eq!(
            parsed.to_string(),
            BASE64.encode(key.public_key().as_bytes())
        );

        assert_eq!(
            PublicKey::from_bytes(Algorithm::Ed25519, &[0u8; 33]).unwrap_err(),
            CryptoError::InvalidPublicKey
        );
    }

    #[test]
    fn test_public_key_algorithm_sensitive_eq() {
        let key = KeyMaterial::generate(Algorithm::Secp256k1);
        let other = PublicKey {
            algorithm: Algorithm::Secp256r1,
            bytes: key.public_key().to_vec(),
        };
        assert_ne!(&other, key.public_key());
    }

    #[test]
    fn test_signer_output() {
        let signer = Signer::new("alice", KeyMaterial::generate(Algorithm::Ed25519));
        let sig = signer.sign(b"msg").unwrap();
        assert_eq!(signer.name(), "alice");
        assert_eq!(sig.algorithm, Algorithm::Ed25519);
        assert_eq!(sig.public_key, signer.public_key().to_vec());
        assert!(sig.verify(b"msg"));
        assert!(signer.verify(b"msg", &sig.bytes));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = KeyMaterial::generate(Algorithm::Ed25519);
        let bytes = key.to_bytes().unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&hex::encode(&bytes[..32])));
    }
}
