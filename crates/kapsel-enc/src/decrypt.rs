#![forbid(unsafe_code)]

//! Envelope opening.
//!
//! Order of checks:
//! 1. `EncryptionMethod` must be present (`NoAlgorithm` otherwise).
//! 2. The bulk algorithm, and the key transport algorithm of a carried
//!    `EncryptedKey`, must be registered and allowed. These errors are
//!    reported as they are.
//! 3. Everything after that (key unwrap, key binding, base64, cipher) fails
//!    with the single [`Error::Decryption`].

use crate::context::EncContext;
use crate::model::{CipherData, EncryptedData, EncryptedKey, KeyInfo};
use kapsel_core::{algorithm, ns, Error, Result};
use kapsel_crypto::EncryptionAlgorithm;
use kapsel_keys::{AsymmetricKey, Key, SymmetricKey};
use kapsel_xml::{Element, XmlElement};

fn rejected(algorithm: &str) -> Error {
    tracing::debug!(algorithm, "decryption rejected");
    Error::Decryption
}

impl EncContext {
    /// Decrypt `data` with `key`.
    ///
    /// When `data` carries an `EncryptedKey`, `key` must be the recipient's
    /// RSA private key; otherwise it is the content key itself.
    pub fn decrypt(&self, data: &EncryptedData, key: &Key) -> Result<Vec<u8>> {
        let bulk = data.algorithm(ns::node::ENCRYPTED_DATA)?;
        self.block_cipher_factory().ensure_allowed(bulk)?;
        if let CipherData::Reference(r) = &data.cipher_data {
            return Err(Error::InvalidUri(format!(
                "CipherReference is not dereferenced: {}",
                r.uri
            )));
        }

        let encrypted_key = data.key_info.as_ref().and_then(KeyInfo::encrypted_key);
        if let Some(ek) = encrypted_key {
            let transport = ek.algorithm(ns::node::ENCRYPTED_KEY)?;
            self.key_transport_factory().ensure_allowed(transport)?;
        }

        self.open(data, bulk, encrypted_key, key)
            .map_err(|_| rejected(bulk))
    }

    fn open(
        &self,
        data: &EncryptedData,
        bulk: &str,
        encrypted_key: Option<&EncryptedKey>,
        key: &Key,
    ) -> Result<Vec<u8>> {
        let session;
        let content_key = match encrypted_key {
            Some(ek) => {
                session = self.unwrap(ek, key.as_asymmetric()?)?;
                &session
            }
            None => key.as_symmetric()?,
        };
        let cipher = self.block_cipher_factory().get_algorithm(bulk, content_key)?;
        cipher.decrypt(&data.cipher_data.decode()?)
    }

    fn unwrap(&self, ek: &EncryptedKey, recipient: &AsymmetricKey) -> Result<SymmetricKey> {
        let transport = self
            .key_transport_factory()
            .get_algorithm(ek.algorithm(ns::node::ENCRYPTED_KEY)?, recipient)?;
        let material = transport.decrypt(&ek.cipher_data.decode()?)?;
        Ok(SymmetricKey::new(&material))
    }

    /// Recover the key material wrapped in `ek`.
    pub fn decrypt_key(&self, ek: &EncryptedKey, recipient: &AsymmetricKey) -> Result<SymmetricKey> {
        let transport = ek.algorithm(ns::node::ENCRYPTED_KEY)?;
        self.key_transport_factory().ensure_allowed(transport)?;
        if matches!(ek.cipher_data, CipherData::Reference(_)) {
            return Err(Error::InvalidUri("CipherReference in EncryptedKey".into()));
        }
        self.unwrap(ek, recipient).map_err(|_| rejected(transport))
    }

    /// Decrypt the first `EncryptedData` in `xml` and put the plaintext in
    /// its place.
    ///
    /// Only `Type` Element and Content are spliced back; any other type is
    /// refused since its plaintext is not markup.
    pub fn decrypt_document(&self, xml: &str, key: &Key) -> Result<String> {
        let doc = kapsel_xml::parse_document(xml)?;
        let node = doc
            .descendants()
            .find(|n| n.has_tag_name((ns::ENC, ns::node::ENCRYPTED_DATA)))
            .ok_or_else(|| Error::MissingElement(ns::node::ENCRYPTED_DATA.into()))?;
        let data = EncryptedData::from_xml(&Element::from_node(node))?;
        match data.type_.as_deref() {
            Some(algorithm::ENC_TYPE_ELEMENT) | Some(algorithm::ENC_TYPE_CONTENT) => {}
            other => {
                return Err(Error::InvalidAttribute(format!(
                    "cannot splice EncryptedData of Type {}",
                    other.unwrap_or("(none)")
                )))
            }
        }

        let plaintext = self.decrypt(&data, key)?;
        let bulk = data.algorithm(ns::node::ENCRYPTED_DATA)?;
        let text = String::from_utf8(plaintext).map_err(|_| rejected(bulk))?;

        let range = node.range();
        let mut out = String::with_capacity(xml.len() + text.len());
        out.push_str(&xml[..range.start]);
        out.push_str(&text);
        out.push_str(&xml[range.end..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypt::Encryptable;
    use crate::model::{EncryptedType, EncryptionMethod};

    fn symmetric(len: usize) -> Key {
        Key::Symmetric(SymmetricKey::generate(len, false).unwrap())
    }

    #[test]
    fn test_symmetric_roundtrip() {
        let ctx = EncContext::new();
        let key = symmetric(16);
        let data = ctx.encrypt(b"hello", algorithm::AES128_GCM, &key).unwrap();
        assert_eq!(ctx.decrypt(&data, &key).unwrap(), b"hello");
    }

    #[test]
    fn test_missing_method_is_no_algorithm() {
        let ctx = EncContext::new();
        let data = EncryptedData {
            encrypted: EncryptedType::new(CipherData::from_bytes(b"xyz")),
        };
        let err = ctx.decrypt(&data, &symmetric(16)).unwrap_err();
        assert!(matches!(err, Error::NoAlgorithm(_)));
        assert!(err.to_string().contains("no algorithm specified"));
    }

    #[test]
    fn test_failures_collapse() {
        let ctx = EncContext::new();
        let key = symmetric(16);
        let data = ctx.encrypt(b"hello", algorithm::AES128_GCM, &key).unwrap();

        // wrong key
        assert!(matches!(ctx.decrypt(&data, &symmetric(16)), Err(Error::Decryption)));
        // wrong key length
        assert!(matches!(ctx.decrypt(&data, &symmetric(32)), Err(Error::Decryption)));
        // wrong key kind
        let rsa = Key::Asymmetric(AsymmetricKey::generate(1024).unwrap());
        assert!(matches!(ctx.decrypt(&data, &rsa), Err(Error::Decryption)));
        // bad base64
        let mut broken = data.clone();
        broken.encrypted.cipher_data = CipherData::Value("!!!".into());
        assert!(matches!(ctx.decrypt(&broken, &key), Err(Error::Decryption)));
        // truncated ciphertext
        let mut short = data.clone();
        short.encrypted.cipher_data = CipherData::from_bytes(&[0u8; 4]);
        assert!(matches!(ctx.decrypt(&short, &key), Err(Error::Decryption)));
    }

    #[test]
    fn test_algorithm_errors_are_not_collapsed() {
        let ctx = EncContext::new();
        let mut data = ctx.encrypt(b"x", algorithm::AES128_CBC, &symmetric(16)).unwrap();
        data.encrypted.encryption_method = Some(EncryptionMethod::new("urn:nope"));
        assert!(matches!(
            ctx.decrypt(&data, &symmetric(16)),
            Err(Error::UnsupportedAlgorithm(_))
        ));

        let strict = EncContext::new().with_blacklist(vec![algorithm::AES128_CBC.to_owned()]);
        data.encrypted.encryption_method = Some(EncryptionMethod::new(algorithm::AES128_CBC));
        assert!(matches!(
            strict.decrypt(&data, &symmetric(16)),
            Err(Error::BlacklistedAlgorithm(_))
        ));
    }

    #[test]
    fn test_carried_pkcs1_key_is_refused_by_default() {
        let pair = AsymmetricKey::generate(1024).unwrap();
        let recipient = Key::Asymmetric(pair);
        let lenient = EncContext::new().with_blacklist(vec![]);
        let data = lenient.encrypt(b"x", algorithm::RSA_PKCS1, &recipient).unwrap();
        assert_eq!(lenient.decrypt(&data, &recipient).unwrap(), b"x");
        assert!(matches!(
            EncContext::new().decrypt(&data, &recipient),
            Err(Error::BlacklistedAlgorithm(_))
        ));
    }

    #[test]
    fn test_decrypt_key() {
        let pair = AsymmetricKey::generate(1024).unwrap();
        let ctx = EncContext::new();
        let session = SymmetricKey::generate(24, true).unwrap();
        let ek = ctx.encrypt_key(&session, algorithm::RSA_OAEP, &pair).unwrap();
        let recovered = ctx.decrypt_key(&ek, &pair).unwrap();
        assert_eq!(recovered.as_bytes(), session.as_bytes());
        assert!(matches!(
            ctx.decrypt_key(&ek, &pair.to_public()),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_decrypt_document_element() {
        let ctx = EncContext::new();
        let key = symmetric(32);
        let secret = Element::parse(r#"<card number="1234"/>"#).unwrap();
        let data = secret.encrypt(&ctx, algorithm::AES256_CBC, &key).unwrap();
        let doc = format!("<order><item/>{}</order>", data.to_element());
        let plain = ctx.decrypt_document(&doc, &key).unwrap();
        assert_eq!(plain, r#"<order><item/><card number="1234"/></order>"#);
    }

    #[test]
    fn test_decrypt_document_refuses_opaque_payload() {
        let ctx = EncContext::new();
        let key = symmetric(32);
        let data = ctx.encrypt(b"\x00\x01", algorithm::AES256_CBC, &key).unwrap();
        let doc = format!("<r>{}</r>", data.to_element());
        assert!(matches!(
            ctx.decrypt_document(&doc, &key),
            Err(Error::InvalidAttribute(_))
        ));
    }

    #[test]
    fn test_cipher_reference_is_invalid_uri() {
        let ctx = EncContext::new();
        let xml = r#"<xenc:EncryptedData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"><xenc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes128-cbc"/><xenc:CipherData><xenc:CipherReference URI="http://example.com/ct"/></xenc:CipherData></xenc:EncryptedData>"#;
        let data = EncryptedData::parse(xml).unwrap();
        assert!(matches!(
            ctx.decrypt(&data, &symmetric(16)),
            Err(Error::InvalidUri(_))
        ));
    }
}
