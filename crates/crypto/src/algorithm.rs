//! Supported signing algorithms and their fixed sizes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Ed25519 public key size
pub const ED25519_KEY_SIZE: usize = 32;
/// Ed25519 private key size in expanded form (seed || public key)
pub const ED25519_PRIVATE_KEY_SIZE: usize = 64;
/// Compressed SEC1 point size for both ECDSA curves
pub const COMPRESSED_KEY_SIZE: usize = 33;
/// Raw EC scalar size
pub const EC_PRIVATE_KEY_SIZE: usize = 32;
/// Signature size shared by all algorithms (r || s or R || S)
pub const SIGNATURE_SIZE: usize = 64;

/// Signing algorithm
///
/// The set is closed; every match over it is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// EdDSA over Curve25519
    Ed25519,
    /// ECDSA over secp256k1 (Bitcoin/Ethereum curve)
    Secp256k1,
    /// ECDSA over secp256r1 / NIST P-256
    Secp256r1,
}

impl Algorithm {
    /// Every supported algorithm
    pub fn all() -> &'static [Algorithm] {
        &[
            Algorithm::Ed25519,
            Algorithm::Secp256k1,
            Algorithm::Secp256r1,
        ]
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Secp256k1 => "secp256k1",
            Algorithm::Secp256r1 => "secp256r1",
        }
    }

    /// Public key size in bytes (compressed form for the EC families)
    pub fn key_size(&self) -> usize {
        match self {
            Algorithm::Ed25519 => ED25519_KEY_SIZE,
            Algorithm::Secp256k1 | Algorithm::Secp256r1 => COMPRESSED_KEY_SIZE,
        }
    }

    /// Signature size in bytes
    pub fn signature_size(&self) -> usize {
        SIGNATURE_SIZE
    }

    /// Private key size in bytes as accepted by `KeyMaterial::from_bytes`
    pub fn private_key_size(&self) -> usize {
        match self {
            Algorithm::Ed25519 => ED25519_PRIVATE_KEY_SIZE,
            Algorithm::Secp256k1 | Algorithm::Secp256r1 => EC_PRIVATE_KEY_SIZE,
        }
    }

    /// Whether signatures from this algorithm are subject to low-S normalization
    pub fn is_ecdsa(&self) -> bool {
        matches!(self, Algorithm::Secp256k1 | Algorithm::Secp256r1)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ed25519" => Ok(Algorithm::Ed25519),
            "secp256k1" => Ok(Algorithm::Secp256k1),
            "secp256r1" | "p256" => Ok(Algorithm::Secp256r1),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}
