//! Low-S canonicalization for ECDSA signatures.
//!
//! For any valid ECDSA signature `(r, s)` the pair `(r, n - s)` verifies too,
//! where `n` is the curve order. Signing always emits the canonical form with
//! `s <= n/2`; verification accepts both forms. The helpers here check and
//! convert raw 64-byte `r || s` encodings (each half big-endian, zero-padded).

use k256::elliptic_curve::bigint::Encoding;
use k256::elliptic_curve::Curve;

use crate::algorithm::{Algorithm, SIGNATURE_SIZE};
use crate::error::CryptoError;

/// Curve order `n` as 32 big-endian bytes, `None` for non-ECDSA algorithms
pub fn curve_order(algorithm: Algorithm) -> Option<[u8; 32]> {
    match algorithm {
        Algorithm::Secp256k1 => Some(k256::Secp256k1::ORDER.to_be_bytes()),
        Algorithm::Secp256r1 => Some(p256::NistP256::ORDER.to_be_bytes()),
        Algorithm::Ed25519 => None,
    }
}

/// `floor(n / 2)` as 32 big-endian bytes, the low-S threshold
pub fn half_curve_order(algorithm: Algorithm) -> Option<[u8; 32]> {
    match algorithm {
        Algorithm::Secp256k1 => Some(k256::Secp256k1::ORDER.shr_vartime(1).to_be_bytes()),
        Algorithm::Secp256r1 => Some(p256::NistP256::ORDER.shr_vartime(1).to_be_bytes()),
        Algorithm::Ed25519 => None,
    }
}

/// Check whether `signature` is in canonical low-S form.
///
/// Returns `false` for wrong lengths, non-ECDSA algorithms, and encodings
/// whose `r` or `s` is zero or not below the curve order.
pub fn is_low_s(signature: &[u8], algorithm: Algorithm) -> bool {
    if signature.len() != SIGNATURE_SIZE {
        return false;
    }
    match algorithm {
        Algorithm::Secp256k1 => k256::ecdsa::Signature::from_slice(signature)
            .map(|sig| sig.normalize_s().is_none())
            .unwrap_or(false),
        Algorithm::Secp256r1 => p256::ecdsa::Signature::from_slice(signature)
            .map(|sig| sig.normalize_s().is_none())
            .unwrap_or(false),
        Algorithm::Ed25519 => false,
    }
}

/// Convert `signature` to low-S form.
///
/// A canonical input is returned as an unchanged copy; otherwise `s` is
/// replaced by `n - s` and `r` is kept. The input is never modified.
pub fn normalize(signature: &[u8], algorithm: Algorithm) -> Result<Vec<u8>, CryptoError> {
    check_len(signature)?;
    match algorithm {
        Algorithm::Secp256k1 => {
            let sig = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignature)?;
            Ok(sig.normalize_s().unwrap_or(sig).to_bytes().to_vec())
        }
        Algorithm::Secp256r1 => {
            let sig = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignature)?;
            Ok(sig.normalize_s().unwrap_or(sig).to_bytes().to_vec())
        }
        Algorithm::Ed25519 => Err(CryptoError::UnsupportedAlgorithm(
            "low-S normalization applies to ECDSA only".to_string(),
        )),
    }
}

/// Convert `signature` to its high-S twin `(r, n - s)`.
///
/// Inverse of [`normalize`]; an input that is already high-S is returned
/// unchanged. Used to exercise verification of non-canonical signatures.
pub fn make_high_s(signature: &[u8], algorithm: Algorithm) -> Result<Vec<u8>, CryptoError> {
    check_len(signature)?;
    match algorithm {
        Algorithm::Secp256k1 => {
            let sig = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignature)?;
            if sig.normalize_s().is_some() {
                return Ok(signature.to_vec());
            }
            let (r, s) = sig.split_scalars();
            k256::ecdsa::Signature::from_scalars(r, -s)
                .map(|flipped| flipped.to_bytes().to_vec())
                .map_err(|_| CryptoError::InvalidSignature)
        }
        Algorithm::Secp256r1 => {
            let sig = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::InvalidSignature)?;
            if sig.normalize_s().is_some() {
                return Ok(signature.to_vec());
            }
            let (r, s) = sig.split_scalars();
            p256::ecdsa::Signature::from_scalars(r, -s)
                .map(|flipped| flipped.to_bytes().to_vec())
                .map_err(|_| CryptoError::InvalidSignature)
        }
        Algorithm::Ed25519 => Err(CryptoError::UnsupportedAlgorithm(
            "low-S normalization applies to ECDSA only".to_string(),
        )),
    }
}

fn check_len(signature: &[u8]) -> Result<(), CryptoError> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(CryptoError::InvalidSignature);
    }
    Ok(())
}
