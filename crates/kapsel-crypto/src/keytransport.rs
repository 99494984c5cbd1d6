#![forbid(unsafe_code)]

//! Key transport algorithms (RSA PKCS#1 v1.5, RSA-OAEP).

use kapsel_core::{algorithm, Error, Result};
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

/// Wraps and unwraps symmetric key bytes under an RSA key.
pub trait KeyTransportAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;
    fn encrypt(&self, public_key: &RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, private_key: &RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>>;
}

/// Key transport URIs this backend implements.
pub const SUPPORTED: &[&str] = &[
    algorithm::RSA_PKCS1,
    algorithm::RSA_OAEP_MGF1P,
    algorithm::RSA_OAEP,
];

/// Create a key transport algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn KeyTransportAlgorithm>> {
    match uri {
        algorithm::RSA_PKCS1 => Ok(Box::new(RsaPkcs1Transport)),
        algorithm::RSA_OAEP_MGF1P => Ok(Box::new(RsaOaepTransport {
            uri: algorithm::RSA_OAEP_MGF1P,
        })),
        algorithm::RSA_OAEP => Ok(Box::new(RsaOaepTransport {
            uri: algorithm::RSA_OAEP,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!("key transport: {uri}"))),
    }
}

struct RsaPkcs1Transport;

impl KeyTransportAlgorithm for RsaPkcs1Transport {
    fn uri(&self) -> &'static str {
        algorithm::RSA_PKCS1
    }

    fn encrypt(&self, public_key: &RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>> {
        public_key
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, key_data)
            .map_err(|e| Error::Crypto(format!("RSA PKCS#1 encrypt: {e}")))
    }

    fn decrypt(&self, private_key: &RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>> {
        private_key
            .decrypt(Pkcs1v15Encrypt, encrypted)
            .map_err(|e| Error::Crypto(format!("RSA PKCS#1 decrypt: {e}")))
    }
}

/// RSA-OAEP with the default parameters: SHA-1 digest, MGF1 with SHA-1,
/// empty label.
struct RsaOaepTransport {
    uri: &'static str,
}

impl KeyTransportAlgorithm for RsaOaepTransport {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn encrypt(&self, public_key: &RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>> {
        public_key
            .encrypt(&mut rand::thread_rng(), Oaep::new::<sha1::Sha1>(), key_data)
            .map_err(|e| Error::Crypto(format!("RSA-OAEP encrypt: {e}")))
    }

    fn decrypt(&self, private_key: &RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>> {
        private_key
            .decrypt(Oaep::new::<sha1::Sha1>(), encrypted)
            .map_err(|e| Error::Crypto(format!("RSA-OAEP decrypt: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_all_transports() {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let public = private.to_public_key();
        let session = [0x5au8; 32];
        for uri in SUPPORTED {
            let transport = from_uri(uri).unwrap();
            let wrapped = transport.encrypt(&public, &session).unwrap();
            assert_eq!(wrapped.len(), 128);
            assert_eq!(transport.decrypt(&private, &wrapped).unwrap(), session, "{uri}");
        }
    }

    #[test]
    fn test_unwrap_with_wrong_key_fails() {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let other = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let transport = from_uri(algorithm::RSA_OAEP).unwrap();
        let wrapped = transport.encrypt(&private.to_public_key(), b"key").unwrap();
        assert!(transport.decrypt(&other, &wrapped).is_err());
    }
}
