//! Hybrid envelope tests across the enc, crypto and keys crates.
//!
//! Validates that:
//! - Every allowed bulk cipher round-trips under both OAEP transports
//! - Envelopes survive serialization to markup and back
//! - Exactly one session key is drawn per envelope
//! - Tampering, wrong recipients and broken randomness are reported correctly

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use kapsel_core::{algorithm, AlgorithmFamily, Error, Result};
use kapsel_crypto::AlgorithmRegistry;
use kapsel_enc::{CipherData, EncContext, EncryptedData};
use kapsel_keys::{AsymmetricKey, Key, OsRandom, SecureRandom, SymmetricKey};
use kapsel_xml::XmlElement;
use rand::RngCore;

fn recipient() -> &'static AsymmetricKey {
    static KEY: OnceLock<AsymmetricKey> = OnceLock::new();
    KEY.get_or_init(|| AsymmetricKey::generate(1024).unwrap())
}

fn random_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut payload);
    payload
}

struct CountingRandom {
    calls: AtomicUsize,
}

impl SecureRandom for CountingRandom {
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        OsRandom.random_bytes(len)
    }
}

struct BrokenRandom;

impl SecureRandom for BrokenRandom {
    fn random_bytes(&self, _len: usize) -> Result<Vec<u8>> {
        Err(Error::RandomSourceUnavailable("entropy pool closed".into()))
    }
}

#[test]
fn hybrid_roundtrip_every_bulk_cipher() {
    let key = Key::Asymmetric(recipient().clone());
    let registry = AlgorithmRegistry::shared();
    for transport in [algorithm::RSA_OAEP, algorithm::RSA_OAEP_MGF1P] {
        for bulk in registry.uris(AlgorithmFamily::BlockCipher) {
            let ctx = EncContext::new().with_block_cipher(bulk);
            for len in [0usize, 1, 16, 100] {
                let payload = random_payload(len);
                let data = ctx.encrypt(&payload, transport, &key).unwrap();
                assert_eq!(data.algorithm("EncryptedData").unwrap(), bulk);
                assert_eq!(ctx.decrypt(&data, &key).unwrap(), payload, "{transport} {bulk}");
            }
        }
    }
}

#[test]
fn envelope_survives_markup() {
    let key = Key::Asymmetric(recipient().clone());
    let mut ctx = EncContext::new();
    ctx.mime_type = Some("application/octet-stream".into());
    ctx.recipient = Some("alice@example.com".into());
    let data = ctx.encrypt(b"wire payload", algorithm::RSA_OAEP, &key).unwrap();

    let markup = data.to_element().to_xml_string();
    let parsed = EncryptedData::parse(&markup).unwrap();
    assert_eq!(parsed, data);
    let ek = parsed.key_info.as_ref().unwrap().encrypted_key().unwrap();
    assert_eq!(ek.recipient.as_deref(), Some("alice@example.com"));
    assert_eq!(ctx.decrypt(&parsed, &key).unwrap(), b"wire payload");
}

#[test]
fn one_session_key_per_envelope() {
    let random = Arc::new(CountingRandom {
        calls: AtomicUsize::new(0),
    });
    let ctx = EncContext::new().with_random(random.clone());
    let key = Key::Asymmetric(recipient().clone());

    let first = ctx.encrypt(b"a", algorithm::RSA_OAEP, &key).unwrap();
    let second = ctx.encrypt(b"a", algorithm::RSA_OAEP, &key).unwrap();
    assert_eq!(random.calls.load(Ordering::SeqCst), 2);

    let unwrap = |data: &EncryptedData| {
        let ek = data.key_info.as_ref().unwrap().encrypted_key().unwrap();
        ctx.decrypt_key(ek, recipient()).unwrap()
    };
    let (k1, k2) = (unwrap(&first), unwrap(&second));
    assert_eq!(k1.len(), 32);
    assert_ne!(k1.as_bytes(), k2.as_bytes());

    // Direct block cipher encryption draws no session key.
    let aes = Key::Symmetric(SymmetricKey::generate(16, false).unwrap());
    ctx.encrypt(b"a", algorithm::AES128_GCM, &aes).unwrap();
    assert_eq!(random.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn triple_des_session_key_has_odd_parity() {
    let ctx = EncContext::new().with_block_cipher(algorithm::TRIPLEDES_CBC);
    let key = Key::Asymmetric(recipient().clone());
    let data = ctx.encrypt(b"legacy", algorithm::RSA_OAEP, &key).unwrap();
    let ek = data.key_info.as_ref().unwrap().encrypted_key().unwrap();
    let session = ctx.decrypt_key(ek, recipient()).unwrap();
    assert_eq!(session.len(), 24);
    assert!(session.as_bytes().iter().all(|b| b.count_ones() % 2 == 1));
}

#[test]
fn broken_random_source_is_fatal() {
    let ctx = EncContext::new().with_random(Arc::new(BrokenRandom));
    let key = Key::Asymmetric(recipient().clone());
    assert!(matches!(
        ctx.encrypt(b"a", algorithm::RSA_OAEP, &key),
        Err(Error::RandomSourceUnavailable(_))
    ));
}

#[test]
fn tampered_cipher_value_is_rejected() {
    let ctx = EncContext::new();
    let key = Key::Asymmetric(recipient().clone());
    let mut data = ctx.encrypt(b"integrity", algorithm::RSA_OAEP, &key).unwrap();
    let mut ciphertext = data.cipher_data.decode().unwrap();
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x01;
    data.encrypted.cipher_data = CipherData::from_bytes(&ciphertext);
    let err = ctx.decrypt(&data, &key).unwrap_err();
    assert!(matches!(err, Error::Decryption));
    assert_eq!(err.to_string(), "decryption failed");
}

#[test]
fn wrong_recipient_is_rejected() {
    let ctx = EncContext::new();
    let data = ctx
        .encrypt(b"for alice", algorithm::RSA_OAEP, &Key::Asymmetric(recipient().clone()))
        .unwrap();
    let mallory = Key::Asymmetric(AsymmetricKey::generate(1024).unwrap());
    assert!(matches!(ctx.decrypt(&data, &mallory), Err(Error::Decryption)));
}
