#![forbid(unsafe_code)]

//! Secure random source.

use kapsel_core::{Error, Result};
use rand::RngCore;

/// A cryptographically secure source of random bytes.
///
/// Implementations must be safe to share between threads.
pub trait SecureRandom: Send + Sync {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>>;
}

/// The operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        rand::rngs::OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| Error::RandomSourceUnavailable(e.to_string()))?;
        Ok(buf)
    }
}
