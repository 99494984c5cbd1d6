//! Factories over a caller-supplied registry and backend.
//!
//! Validates that:
//! - Every operation of a bound instance goes through the factory's backend
//! - A registered identifier the backend lacks is unsupported, not blacklisted
//! - New identifiers are added by registration alone

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kapsel_core::{algorithm, Error, Result};
use kapsel_crypto::{
    AlgorithmDescriptor, AlgorithmRegistry, BlockCipherFactory, CryptoProvider, DigestFactory,
    EncryptionAlgorithm, RustCryptoBackend,
};
use kapsel_keys::{AsymmetricKey, SymmetricKey};

const TRUNCATED_SHA256: &str = "urn:example:digest:sha256-128";

/// Delegates to RustCrypto, counts calls, drops AES-GCM and adds one digest.
#[derive(Default)]
struct AuditingBackend {
    calls: AtomicUsize,
}

impl AuditingBackend {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CryptoProvider for AuditingBackend {
    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.tick();
        if algorithm == TRUNCATED_SHA256 {
            let mut full = RustCryptoBackend.digest(algorithm::SHA256, data)?;
            full.truncate(16);
            return Ok(full);
        }
        RustCryptoBackend.digest(algorithm, data)
    }

    fn encrypt(&self, algorithm: &str, key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.tick();
        RustCryptoBackend.encrypt(algorithm, key, plaintext)
    }

    fn decrypt(&self, algorithm: &str, key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.tick();
        RustCryptoBackend.decrypt(algorithm, key, ciphertext)
    }

    fn wrap_key(&self, algorithm: &str, key_bytes: &[u8], key: &AsymmetricKey) -> Result<Vec<u8>> {
        self.tick();
        RustCryptoBackend.wrap_key(algorithm, key_bytes, key)
    }

    fn unwrap_key(&self, algorithm: &str, wrapped: &[u8], key: &AsymmetricKey) -> Result<Vec<u8>> {
        self.tick();
        RustCryptoBackend.unwrap_key(algorithm, wrapped, key)
    }

    fn supports(&self, algorithm: &str) -> bool {
        algorithm == TRUNCATED_SHA256
            || (!algorithm.ends_with("-gcm") && RustCryptoBackend.supports(algorithm))
    }
}

fn registry() -> Arc<AlgorithmRegistry> {
    let mut registry = AlgorithmRegistry::with_defaults();
    registry
        .register(TRUNCATED_SHA256, AlgorithmDescriptor::Digest { output_len: 16 })
        .unwrap();
    Arc::new(registry)
}

#[test]
fn bound_cipher_uses_factory_backend() {
    let backend = Arc::new(AuditingBackend::default());
    let factory = BlockCipherFactory::with_parts(registry(), backend.clone(), None);
    let key = SymmetricKey::generate(16, false).unwrap();
    let cipher = factory.get_algorithm(algorithm::AES128_CBC, &key).unwrap();

    let ciphertext = cipher.encrypt(b"routed").unwrap();
    assert_eq!(cipher.decrypt(&ciphertext).unwrap(), b"routed");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn registered_but_unimplemented_is_unsupported() {
    let backend = Arc::new(AuditingBackend::default());
    let factory = BlockCipherFactory::with_parts(
        registry(),
        backend,
        Some(vec![algorithm::AES128_GCM.to_owned()]),
    );
    let key = SymmetricKey::generate(16, false).unwrap();
    for uri in [algorithm::AES128_GCM, algorithm::AES256_GCM] {
        assert!(matches!(
            factory.get_algorithm(uri, &key),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}

#[test]
fn registered_digest_resolves() {
    let backend = Arc::new(AuditingBackend::default());
    let factory = DigestFactory::with_parts(registry(), backend.clone(), None);
    let digester = factory.get_digest(TRUNCATED_SHA256).unwrap();
    assert_eq!(digester.algorithm_id(), TRUNCATED_SHA256);
    assert_eq!(digester.digest(b"abc").unwrap().len(), 16);

    // The shared default registry is untouched.
    assert!(matches!(
        DigestFactory::new(None).get_digest(TRUNCATED_SHA256),
        Err(Error::UnsupportedAlgorithm(_))
    ));
}
