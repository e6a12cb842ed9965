//! Secret byte containers

use secrecy::SecretString as SecrecySecretString;
use zeroize::Zeroize;

/// Secret text, used for store passwords.
pub type SecretString = SecrecySecretString;

/// A fixed-size secret, wiped on drop or on an explicit `zeroize()`.
///
/// Holds Ed25519 seeds and EC scalars inside `KeyMaterial`.
///
/// ```rust
/// use sigvault_crypto::SecretArray;
/// use zeroize::Zeroize;
///
/// let mut seed = SecretArray::new([7u8; 32]);
/// assert_eq!(seed.expose_secret()[0], 7);
/// seed.zeroize();
/// assert!(seed.is_zeroed());
/// ```
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SecretArray<const N: usize> {
    inner: [u8; N],
}

impl<const N: usize> SecretArray<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        Self { inner: bytes }
    }

    /// Borrow the secret bytes. Do not keep the reference around.
    pub fn expose_secret(&self) -> &[u8; N] {
        &self.inner
    }

    /// True when every byte is zero
    pub fn is_zeroed(&self) -> bool {
        self.inner.iter().all(|b| *b == 0)
    }
}

impl<const N: usize> std::fmt::Debug for SecretArray<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretArray")
            .field("length", &N)
            .field("value", &"[REDACTED]")
            .finish()
    }
}
