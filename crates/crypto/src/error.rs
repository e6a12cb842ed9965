//! Key material error types

use thiserror::Error;

use crate::algorithm::Algorithm;

/// Errors raised while constructing or using signing keys
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Raw key bytes have the wrong length for the algorithm
    #[error("invalid {algorithm} key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        algorithm: Algorithm,
        expected: usize,
        actual: usize,
    },

    /// EC scalar is zero or not below the curve order
    #[error("private scalar out of range [1, n-1]")]
    InvalidScalarRange,

    /// Public key bytes do not decode to a valid point
    #[error("invalid public key bytes")]
    InvalidPublicKey,

    /// Signature bytes are malformed or out of range
    #[error("invalid signature bytes")]
    InvalidSignature,

    /// Algorithm name is not one of the supported set
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material has been zeroized and can no longer be used
    #[error("key material has been zeroized")]
    Zeroized,
}
