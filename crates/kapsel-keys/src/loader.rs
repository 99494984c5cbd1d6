#![forbid(unsafe_code)]

//! Key loading from PEM (PKCS#8, SPKI, PKCS#1) and raw binary.

use crate::asymmetric::AsymmetricKey;
use crate::key::Key;
use crate::symmetric::SymmetricKey;
use kapsel_core::{Error, Result};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};

fn pem_str(pem_data: &[u8]) -> Result<&str> {
    std::str::from_utf8(pem_data).map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))
}

/// Load an RSA private key from PEM data (PKCS#8, then PKCS#1).
pub fn load_rsa_private_pem(pem_data: &[u8]) -> Result<AsymmetricKey> {
    let pem = pem_str(pem_data)?;
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(AsymmetricKey::from_private(pk));
    }
    let pk = rsa::RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| Error::Key(format!("failed to parse RSA private key PEM: {e}")))?;
    Ok(AsymmetricKey::from_private(pk))
}

/// Load an RSA public key from PEM data (SPKI, then PKCS#1).
pub fn load_rsa_public_pem(pem_data: &[u8]) -> Result<AsymmetricKey> {
    let pem = pem_str(pem_data)?;
    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_pem(pem) {
        return Ok(AsymmetricKey::from_public(pk));
    }
    let pk = rsa::RsaPublicKey::from_pkcs1_pem(pem)
        .map_err(|e| Error::Key(format!("failed to parse RSA public key PEM: {e}")))?;
    Ok(AsymmetricKey::from_public(pk))
}

/// Load a symmetric key from raw bytes.
pub fn load_symmetric_key(data: &[u8]) -> Result<SymmetricKey> {
    if data.is_empty() {
        return Err(Error::Key("empty symmetric key".into()));
    }
    Ok(SymmetricKey::new(data))
}

/// Load a key from a file, detecting PEM private/public keys and falling
/// back to raw symmetric key bytes.
pub fn load_key_file(path: &std::path::Path) -> Result<Key> {
    let data = std::fs::read(path)?;
    if data.starts_with(b"-----BEGIN") {
        let header = data
            .split(|b| *b == b'\n')
            .next()
            .unwrap_or_default();
        if header.windows(10).any(|w| w == b"PUBLIC KEY") {
            return load_rsa_public_pem(&data).map(Key::Asymmetric);
        }
        return load_rsa_private_pem(&data).map(Key::Asymmetric);
    }
    load_symmetric_key(&data).map(Key::Symmetric)
}

/// Encode the private half as PKCS#8 PEM.
pub fn private_key_to_pem(key: &AsymmetricKey) -> Result<String> {
    let private = key.require_private("PEM export")?;
    let pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::Key(format!("failed to encode private key: {e}")))?;
    Ok(pem.as_str().to_owned())
}

/// Encode the public half as SPKI PEM.
pub fn public_key_to_pem(key: &AsymmetricKey) -> Result<String> {
    key.public()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| Error::Key(format!("failed to encode public key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_roundtrip() {
        let pair = AsymmetricKey::generate(1024).unwrap();
        let private_pem = private_key_to_pem(&pair).unwrap();
        let public_pem = public_key_to_pem(&pair).unwrap();

        let private = load_rsa_private_pem(private_pem.as_bytes()).unwrap();
        assert!(private.private().is_some());
        assert_eq!(private.public(), pair.public());

        let public = load_rsa_public_pem(public_pem.as_bytes()).unwrap();
        assert!(public.private().is_none());
        assert_eq!(public.public(), pair.public());
    }

    #[test]
    fn test_pkcs1_private_fallback() {
        use rsa::pkcs1::EncodeRsaPrivateKey;
        let pair = AsymmetricKey::generate(1024).unwrap();
        let pem = pair
            .private()
            .unwrap()
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();
        let loaded = load_rsa_private_pem(pem.as_bytes()).unwrap();
        assert_eq!(loaded.public(), pair.public());
    }

    #[test]
    fn test_garbage_pem_is_key_error() {
        let err = load_rsa_private_pem(b"-----BEGIN NOTHING-----").unwrap_err();
        assert!(matches!(err, Error::Key(_)));
    }

    #[test]
    fn test_empty_symmetric_rejected() {
        assert!(load_symmetric_key(&[]).is_err());
        assert_eq!(load_symmetric_key(&[1, 2, 3]).unwrap().len(), 3);
    }
}
