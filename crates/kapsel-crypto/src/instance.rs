#![forbid(unsafe_code)]

//! Algorithm instances bound to a key by a factory.

use crate::provider::CryptoProvider;
use kapsel_core::{AlgorithmFamily, Result};
use kapsel_keys::{AsymmetricKey, SymmetricKey};
use std::sync::Arc;

/// A keyed algorithm that turns bytes into ciphertext and back.
///
/// For a [`BlockCipher`] the bytes are the payload; for a [`KeyTransport`]
/// they are session key material.
pub trait EncryptionAlgorithm: Send + Sync {
    fn algorithm_id(&self) -> &str;
    fn family(&self) -> AlgorithmFamily;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// A digest algorithm resolved through a [`crate::DigestFactory`].
pub struct Digester {
    pub(crate) uri: String,
    pub(crate) backend: Arc<dyn CryptoProvider>,
}

impl Digester {
    pub fn algorithm_id(&self) -> &str {
        &self.uri
    }

    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        tracing::trace!(algorithm = %self.uri, len = data.len(), "digesting");
        self.backend.digest(&self.uri, data)
    }
}

/// A bulk cipher bound to a symmetric key.
pub struct BlockCipher {
    pub(crate) uri: String,
    pub(crate) key: SymmetricKey,
    pub(crate) backend: Arc<dyn CryptoProvider>,
}

impl BlockCipher {
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }
}

impl EncryptionAlgorithm for BlockCipher {
    fn algorithm_id(&self) -> &str {
        &self.uri
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::BlockCipher
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.backend.encrypt(&self.uri, &self.key, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.backend.decrypt(&self.uri, &self.key, ciphertext)
    }
}

/// A key transport algorithm bound to an RSA key.
pub struct KeyTransport {
    pub(crate) uri: String,
    pub(crate) key: AsymmetricKey,
    pub(crate) backend: Arc<dyn CryptoProvider>,
}

impl EncryptionAlgorithm for KeyTransport {
    fn algorithm_id(&self) -> &str {
        &self.uri
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::KeyTransport
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.backend.wrap_key(&self.uri, plaintext, &self.key)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.backend.unwrap_key(&self.uri, ciphertext, &self.key)
    }
}

macro_rules! impl_instance_debug {
    ($($ty:ident),+) => {
        $(
            impl std::fmt::Debug for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct(stringify!($ty)).field("uri", &self.uri).finish_non_exhaustive()
                }
            }
        )+
    };
}

impl_instance_debug!(Digester, BlockCipher, KeyTransport);
