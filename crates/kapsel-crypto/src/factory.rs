#![forbid(unsafe_code)]

//! Algorithm factories with blacklist enforcement.
//!
//! One generic [`AlgorithmFactory`] serves every family; the family-specific
//! parts (key type, default blacklist, how a descriptor binds to a key) live
//! in an [`AlgorithmKind`]. Resolution always checks existence first and the
//! blacklist second, so an unknown identifier is reported as unsupported even
//! when it also appears in the blacklist.

use crate::instance::{BlockCipher, Digester, KeyTransport};
use crate::provider::{CryptoProvider, RustCryptoBackend};
use crate::registry::{AlgorithmDescriptor, AlgorithmRegistry};
use kapsel_core::{algorithm, AlgorithmFamily, Error, Result};
use kapsel_keys::{AsymmetricKey, SymmetricKey};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// Family-specific behavior of an [`AlgorithmFactory`].
pub trait AlgorithmKind {
    const FAMILY: AlgorithmFamily;
    type Key: ?Sized;
    type Instance;

    /// Identifiers refused when the caller supplies no blacklist.
    fn default_blacklist() -> &'static [&'static str];

    fn bind(
        uri: &str,
        descriptor: &AlgorithmDescriptor,
        key: &Self::Key,
        backend: Arc<dyn CryptoProvider>,
    ) -> Result<Self::Instance>;
}

pub enum DigestKind {}
pub enum BlockCipherKind {}
pub enum KeyTransportKind {}

impl AlgorithmKind for DigestKind {
    const FAMILY: AlgorithmFamily = AlgorithmFamily::Digest;
    type Key = ();
    type Instance = Digester;

    fn default_blacklist() -> &'static [&'static str] {
        &[algorithm::MD5]
    }

    fn bind(
        uri: &str,
        _descriptor: &AlgorithmDescriptor,
        _key: &(),
        backend: Arc<dyn CryptoProvider>,
    ) -> Result<Digester> {
        Ok(Digester {
            uri: uri.to_owned(),
            backend,
        })
    }
}

impl AlgorithmKind for BlockCipherKind {
    const FAMILY: AlgorithmFamily = AlgorithmFamily::BlockCipher;
    type Key = SymmetricKey;
    type Instance = BlockCipher;

    fn default_blacklist() -> &'static [&'static str] {
        &[]
    }

    fn bind(
        uri: &str,
        descriptor: &AlgorithmDescriptor,
        key: &SymmetricKey,
        backend: Arc<dyn CryptoProvider>,
    ) -> Result<BlockCipher> {
        if let AlgorithmDescriptor::BlockCipher { key_len, .. } = descriptor {
            if key.len() != *key_len {
                return Err(Error::Key(format!(
                    "{uri} needs a {key_len} byte key, got {}",
                    key.len()
                )));
            }
        }
        Ok(BlockCipher {
            uri: uri.to_owned(),
            key: key.clone(),
            backend,
        })
    }
}

impl AlgorithmKind for KeyTransportKind {
    const FAMILY: AlgorithmFamily = AlgorithmFamily::KeyTransport;
    type Key = AsymmetricKey;
    type Instance = KeyTransport;

    fn default_blacklist() -> &'static [&'static str] {
        &[algorithm::RSA_PKCS1]
    }

    fn bind(
        uri: &str,
        _descriptor: &AlgorithmDescriptor,
        key: &AsymmetricKey,
        backend: Arc<dyn CryptoProvider>,
    ) -> Result<KeyTransport> {
        Ok(KeyTransport {
            uri: uri.to_owned(),
            key: key.clone(),
            backend,
        })
    }
}

pub type DigestFactory = AlgorithmFactory<DigestKind>;
pub type BlockCipherFactory = AlgorithmFactory<BlockCipherKind>;
pub type KeyTransportFactory = AlgorithmFactory<KeyTransportKind>;

/// Resolves identifiers of one family to key-bound instances.
///
/// The blacklist is fixed at construction.
pub struct AlgorithmFactory<K: AlgorithmKind> {
    registry: Arc<AlgorithmRegistry>,
    backend: Arc<dyn CryptoProvider>,
    blacklist: BTreeSet<String>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: AlgorithmKind> AlgorithmFactory<K> {
    /// A factory over the default registry and backend.
    ///
    /// `None` selects the family's default blacklist; `Some(list)` replaces it.
    pub fn new(blacklist: Option<Vec<String>>) -> Self {
        Self::with_parts(
            AlgorithmRegistry::shared(),
            Arc::new(RustCryptoBackend),
            blacklist,
        )
    }

    pub fn with_parts(
        registry: Arc<AlgorithmRegistry>,
        backend: Arc<dyn CryptoProvider>,
        blacklist: Option<Vec<String>>,
    ) -> Self {
        let blacklist = match blacklist {
            Some(list) => list.into_iter().collect(),
            None => K::default_blacklist().iter().map(|s| (*s).to_owned()).collect(),
        };
        Self {
            registry,
            backend,
            blacklist,
            _kind: PhantomData,
        }
    }

    pub fn registry(&self) -> &Arc<AlgorithmRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn CryptoProvider> {
        &self.backend
    }

    pub fn blacklist(&self) -> impl Iterator<Item = &str> {
        self.blacklist.iter().map(String::as_str)
    }

    pub fn is_blacklisted(&self, uri: &str) -> bool {
        self.blacklist.contains(uri)
    }

    /// Check that `uri` exists in this family and is not blacklisted.
    pub fn ensure_allowed(&self, uri: &str) -> Result<&AlgorithmDescriptor> {
        let descriptor = self
            .registry
            .lookup(uri)
            .filter(|d| d.family() == K::FAMILY && self.backend.supports(uri))
            .ok_or_else(|| {
                tracing::debug!(uri, family = %K::FAMILY, "unsupported algorithm");
                Error::UnsupportedAlgorithm(format!("{} algorithm: {uri}", K::FAMILY))
            })?;
        if self.blacklist.contains(uri) {
            tracing::debug!(uri, family = %K::FAMILY, "blacklisted algorithm refused");
            return Err(Error::BlacklistedAlgorithm(uri.to_owned()));
        }
        Ok(descriptor)
    }

    /// Resolve `uri` and bind it to `key`.
    pub fn get_algorithm(&self, uri: &str, key: &K::Key) -> Result<K::Instance> {
        let descriptor = self.ensure_allowed(uri)?;
        let instance = K::bind(uri, descriptor, key, Arc::clone(&self.backend))?;
        tracing::debug!(uri, family = %K::FAMILY, "resolved algorithm");
        Ok(instance)
    }
}

impl DigestFactory {
    pub fn get_digest(&self, uri: &str) -> Result<Digester> {
        self.get_algorithm(uri, &())
    }
}

impl<K: AlgorithmKind> Clone for AlgorithmFactory<K> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            backend: Arc::clone(&self.backend),
            blacklist: self.blacklist.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: AlgorithmKind> Default for AlgorithmFactory<K> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<K: AlgorithmKind> std::fmt::Debug for AlgorithmFactory<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmFactory")
            .field("family", &K::FAMILY)
            .field("blacklist", &self.blacklist)
            .finish_non_exhaustive()
    }
}
