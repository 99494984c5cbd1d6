#![forbid(unsafe_code)]

//! Encryption context: registry, backend, randomness and policy.

use kapsel_core::algorithm;
use kapsel_crypto::{
    AlgorithmFactory, AlgorithmKind, AlgorithmRegistry, BlockCipherFactory, CryptoProvider,
    KeyTransportFactory, RustCryptoBackend,
};
use kapsel_keys::{OsRandom, SecureRandom};
use std::sync::Arc;

/// Shared configuration for building and opening envelopes.
///
/// Every factory the context builds gets the same registry, backend and
/// blacklist policy.
#[derive(Clone)]
pub struct EncContext {
    pub registry: Arc<AlgorithmRegistry>,
    pub backend: Arc<dyn CryptoProvider>,
    pub random: Arc<dyn SecureRandom>,
    /// `None` keeps each family's default blacklist; `Some` replaces all of them.
    pub blacklist: Option<Vec<String>>,
    /// Bulk cipher used under a key transport algorithm.
    pub block_cipher: String,
    /// Session key length in bytes. `None` uses the bulk cipher's key length
    /// (32 bytes for the default AES-256-GCM) rather than a fixed 16 bytes,
    /// and an explicit length must match the bulk cipher.
    pub session_key_len: Option<usize>,
    pub type_: Option<String>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    /// `Recipient` written on generated `EncryptedKey` elements.
    pub recipient: Option<String>,
    /// `CarriedKeyName` written on generated `EncryptedKey` elements.
    pub carried_key_name: Option<String>,
}

impl EncContext {
    pub fn new() -> Self {
        Self {
            registry: AlgorithmRegistry::shared(),
            backend: Arc::new(RustCryptoBackend),
            random: Arc::new(OsRandom),
            blacklist: None,
            block_cipher: algorithm::AES256_GCM.to_owned(),
            session_key_len: None,
            type_: None,
            mime_type: None,
            encoding: None,
            recipient: None,
            carried_key_name: None,
        }
    }

    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    pub fn with_block_cipher(mut self, uri: &str) -> Self {
        self.block_cipher = uri.to_owned();
        self
    }

    pub fn with_random(mut self, random: Arc<dyn SecureRandom>) -> Self {
        self.random = random;
        self
    }

    pub fn factory<K: AlgorithmKind>(&self) -> AlgorithmFactory<K> {
        AlgorithmFactory::with_parts(
            Arc::clone(&self.registry),
            Arc::clone(&self.backend),
            self.blacklist.clone(),
        )
    }

    pub fn block_cipher_factory(&self) -> BlockCipherFactory {
        self.factory()
    }

    pub fn key_transport_factory(&self) -> KeyTransportFactory {
        self.factory()
    }
}

impl Default for EncContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncContext")
            .field("blacklist", &self.blacklist)
            .field("block_cipher", &self.block_cipher)
            .field("session_key_len", &self.session_key_len)
            .field("type_", &self.type_)
            .field("mime_type", &self.mime_type)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}
