//! Secp256r1 (NIST P-256) ECDSA keys
//!
//! Same contract as the secp256k1 module: SHA-256 prehash, RFC 6979 nonces,
//! low-S output, both S forms accepted on verify.

use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature as P256Signature, SigningKey, VerifyingKey,
};
use rand::{CryptoRng, RngCore};

use crate::algorithm::{Algorithm, COMPRESSED_KEY_SIZE, EC_PRIVATE_KEY_SIZE, SIGNATURE_SIZE};
use crate::error::CryptoError;

/// Secp256r1 secret key (32-byte scalar)
pub struct Secp256r1SecretKey(SigningKey);

impl Secp256r1SecretKey {
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self(SigningKey::random(rng))
    }

    /// Load a big-endian scalar, which must lie in `[1, n-1]`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != EC_PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                algorithm: Algorithm::Secp256r1,
                expected: EC_PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidScalarRange)
    }

    pub fn to_bytes(&self) -> [u8; EC_PRIVATE_KEY_SIZE] {
        self.0.to_bytes().into()
    }

    pub fn public_key(&self) -> Secp256r1PublicKey {
        Secp256r1PublicKey(VerifyingKey::from(&self.0))
    }

    /// Sign `SHA-256(msg)`. P-256 signers may emit high S, so normalize here.
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let sig: P256Signature = self.0.sign(msg);
        sig.normalize_s().unwrap_or(sig).to_bytes().into()
    }
}

impl std::fmt::Debug for Secp256r1SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256r1SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Secp256r1 public key
#[derive(Clone, PartialEq, Eq)]
pub struct Secp256r1PublicKey(VerifyingKey);

impl Secp256r1PublicKey {
    /// Load from compressed SEC1 bytes (33 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != COMPRESSED_KEY_SIZE {
            return Err(CryptoError::InvalidPublicKey);
        }
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub fn to_bytes(&self) -> [u8; COMPRESSED_KEY_SIZE] {
        let encoded = self.0.to_encoded_point(true);
        let mut result = [0u8; COMPRESSED_KEY_SIZE];
        result.copy_from_slice(encoded.as_bytes());
        result
    }

    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        if sig.len() != SIGNATURE_SIZE {
            return false;
        }
        let Ok(sig) = P256Signature::from_slice(sig) else {
            return false;
        };
        let sig = sig.normalize_s().unwrap_or(sig);
        self.0.verify(msg, &sig).is_ok()
    }
}

impl std::fmt::Debug for Secp256r1PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "Secp256r1PublicKey({})", hex::encode(&bytes[..8]))
    }
}
