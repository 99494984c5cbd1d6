#![forbid(unsafe_code)]

//! Algorithm registry mapping URIs to tagged descriptors.
//!
//! The registry is open: new identifiers are added with
//! [`AlgorithmRegistry::register`], never by editing a dispatch chain. The
//! descriptor tag decides the family, so an identifier's family cannot change
//! once it is registered.

use kapsel_core::{algorithm, AlgorithmFamily, Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// What the registry knows about an algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmDescriptor {
    Digest { output_len: usize },
    BlockCipher { key_len: usize, iv_len: usize, parity: bool },
    KeyTransport,
    Signature,
}

impl AlgorithmDescriptor {
    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::Digest { .. } => AlgorithmFamily::Digest,
            Self::BlockCipher { .. } => AlgorithmFamily::BlockCipher,
            Self::KeyTransport => AlgorithmFamily::KeyTransport,
            Self::Signature => AlgorithmFamily::Signature,
        }
    }
}

static DEFAULT_REGISTRY: LazyLock<Arc<AlgorithmRegistry>> =
    LazyLock::new(|| Arc::new(AlgorithmRegistry::with_defaults()));

#[derive(Debug, Clone, Default)]
pub struct AlgorithmRegistry {
    entries: HashMap<String, AlgorithmDescriptor>,
}

impl AlgorithmRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every algorithm kapsel knows about.
    pub fn with_defaults() -> Self {
        use AlgorithmDescriptor::*;

        let defaults: [(&str, AlgorithmDescriptor); 25] = [
            // ── Digests ──
            (algorithm::SHA1, Digest { output_len: 20 }),
            (algorithm::SHA224, Digest { output_len: 28 }),
            (algorithm::SHA256, Digest { output_len: 32 }),
            (algorithm::SHA384, Digest { output_len: 48 }),
            (algorithm::SHA512, Digest { output_len: 64 }),
            (algorithm::SHA3_256, Digest { output_len: 32 }),
            (algorithm::SHA3_512, Digest { output_len: 64 }),
            (algorithm::MD5, Digest { output_len: 16 }),
            // ── Block ciphers ──
            (algorithm::AES128_CBC, BlockCipher { key_len: 16, iv_len: 16, parity: false }),
            (algorithm::AES192_CBC, BlockCipher { key_len: 24, iv_len: 16, parity: false }),
            (algorithm::AES256_CBC, BlockCipher { key_len: 32, iv_len: 16, parity: false }),
            (algorithm::AES128_GCM, BlockCipher { key_len: 16, iv_len: 12, parity: false }),
            (algorithm::AES192_GCM, BlockCipher { key_len: 24, iv_len: 12, parity: false }),
            (algorithm::AES256_GCM, BlockCipher { key_len: 32, iv_len: 12, parity: false }),
            (algorithm::TRIPLEDES_CBC, BlockCipher { key_len: 24, iv_len: 8, parity: true }),
            // ── Key transport ──
            (algorithm::RSA_PKCS1, KeyTransport),
            (algorithm::RSA_OAEP_MGF1P, KeyTransport),
            (algorithm::RSA_OAEP, KeyTransport),
            // ── Signatures ──
            (algorithm::RSA_SHA1, Signature),
            (algorithm::RSA_SHA256, Signature),
            (algorithm::RSA_SHA384, Signature),
            (algorithm::RSA_SHA512, Signature),
            (algorithm::HMAC_SHA1, Signature),
            (algorithm::HMAC_SHA256, Signature),
            (algorithm::ECDSA_SHA256, Signature),
        ];

        let entries = defaults
            .into_iter()
            .map(|(uri, desc)| (uri.to_owned(), desc))
            .collect();
        Self { entries }
    }

    /// The process-wide default registry.
    pub fn shared() -> Arc<AlgorithmRegistry> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    /// Add an identifier. Existing entries are never replaced.
    pub fn register(&mut self, uri: &str, descriptor: AlgorithmDescriptor) -> Result<()> {
        if self.entries.contains_key(uri) {
            return Err(Error::DuplicateAlgorithm(uri.to_owned()));
        }
        tracing::debug!(uri, family = %descriptor.family(), "registered algorithm");
        self.entries.insert(uri.to_owned(), descriptor);
        Ok(())
    }

    pub fn lookup(&self, uri: &str) -> Option<&AlgorithmDescriptor> {
        self.entries.get(uri)
    }

    pub fn family(&self, uri: &str) -> Option<AlgorithmFamily> {
        self.lookup(uri).map(AlgorithmDescriptor::family)
    }

    /// Registered URIs of one family, sorted.
    pub fn uris(&self, family: AlgorithmFamily) -> Vec<&str> {
        let mut uris: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, d)| d.family() == family)
            .map(|(uri, _)| uri.as_str())
            .collect();
        uris.sort_unstable();
        uris
    }
}
