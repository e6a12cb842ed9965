//! Zeroizing containers for secret bytes
//!
//! Everything that holds a private scalar, a seed, a password or a derived
//! encryption key goes through the types here:
//! - contents are wiped on drop via `zeroize` (volatile writes plus a
//!   compiler fence, so the wipe is not optimized away)
//! - `Debug` prints `[REDACTED]`
//! - no `Clone`; copies must be made explicitly

mod secret;

pub use secrecy::ExposeSecret;
pub use secret::{SecretArray, SecretString};
