//! Ed25519 signing keys
//!
//! Thin wrappers over `ed25519-consensus`. Messages are signed as-is (no
//! prehash); signing is deterministic per RFC 8032.

use ed25519_consensus::{Signature as Ed25519Sig, SigningKey, VerificationKey};
use rand::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::algorithm::{Algorithm, ED25519_KEY_SIZE, ED25519_PRIVATE_KEY_SIZE, SIGNATURE_SIZE};
use crate::error::CryptoError;

/// Ed25519 secret key (32-byte seed)
pub struct Ed25519SecretKey(SigningKey);

impl Ed25519SecretKey {
    /// Generate a new random secret key
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let key = Self::from_seed(&seed);
        seed.zeroize();
        key
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from(*seed))
    }

    /// Load from the 64-byte expanded form (seed || public key).
    ///
    /// The embedded public half must match the one derived from the seed.
    pub fn from_expanded(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ED25519_PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                algorithm: Algorithm::Ed25519,
                expected: ED25519_PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let key = Self::from_seed(&seed);
        seed.zeroize();

        let derived = key.public_key().to_bytes();
        if !bool::from(derived[..].ct_eq(&bytes[32..])) {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(key)
    }

    /// Seed bytes
    pub fn to_seed(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0.verification_key())
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.0.sign(msg).to_bytes()
    }
}

impl std::fmt::Debug for Ed25519SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Ed25519 public key (32 bytes)
#[derive(Clone)]
pub struct Ed25519PublicKey(VerificationKey);

impl PartialEq for Ed25519PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Ed25519PublicKey {}

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; ED25519_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        VerificationKey::try_from(arr)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub fn to_bytes(&self) -> [u8; ED25519_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Verify a raw 64-byte signature. Wrong lengths are rejected.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let Ok(arr) = <[u8; SIGNATURE_SIZE]>::try_from(sig) else {
            return false;
        };
        self.0.verify(&Ed25519Sig::from(arr), msg).is_ok()
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "Ed25519PublicKey({})", hex::encode(&bytes[..8]))
    }
}
