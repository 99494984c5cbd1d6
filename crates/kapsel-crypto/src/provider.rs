#![forbid(unsafe_code)]

//! The crypto backend seam.

use kapsel_core::{Error, Result};
use kapsel_keys::{AsymmetricKey, SymmetricKey};

/// Raw cryptographic operations, selected by algorithm URI.
///
/// Implementations hold no per-call mutable state and are shared freely
/// between threads.
pub trait CryptoProvider: Send + Sync {
    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>>;

    fn encrypt(&self, algorithm: &str, key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, algorithm: &str, key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>>;

    fn wrap_key(&self, algorithm: &str, key_bytes: &[u8], key: &AsymmetricKey) -> Result<Vec<u8>>;

    fn unwrap_key(&self, algorithm: &str, wrapped: &[u8], key: &AsymmetricKey) -> Result<Vec<u8>>;

    /// Whether the backend implements `algorithm`.
    fn supports(&self, algorithm: &str) -> bool;
}

/// Backend built on the RustCrypto crates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoBackend;

impl RustCryptoBackend {
    /// Every URI this backend implements.
    pub fn algorithms() -> impl Iterator<Item = &'static str> {
        crate::digest::SUPPORTED
            .iter()
            .chain(crate::cipher::SUPPORTED)
            .chain(crate::keytransport::SUPPORTED)
            .copied()
    }
}

impl CryptoProvider for RustCryptoBackend {
    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
        crate::digest::digest(algorithm, data)
    }

    fn encrypt(&self, algorithm: &str, key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        crate::cipher::from_uri(algorithm)?.encrypt(key.as_bytes(), plaintext)
    }

    fn decrypt(&self, algorithm: &str, key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        crate::cipher::from_uri(algorithm)?.decrypt(key.as_bytes(), ciphertext)
    }

    fn wrap_key(&self, algorithm: &str, key_bytes: &[u8], key: &AsymmetricKey) -> Result<Vec<u8>> {
        crate::keytransport::from_uri(algorithm)?.encrypt(key.public(), key_bytes)
    }

    fn unwrap_key(&self, algorithm: &str, wrapped: &[u8], key: &AsymmetricKey) -> Result<Vec<u8>> {
        let private = key
            .private()
            .ok_or_else(|| Error::Key("key unwrap requires an RSA private key".into()))?;
        crate::keytransport::from_uri(algorithm)?.decrypt(private, wrapped)
    }

    fn supports(&self, algorithm: &str) -> bool {
        Self::algorithms().any(|uri| uri == algorithm)
    }
}
