#![forbid(unsafe_code)]

//! Envelope building.
//!
//! A block cipher identifier encrypts the payload directly with the
//! caller's symmetric key. A key transport identifier switches to hybrid
//! mode: a fresh session key is generated for this call only, wrapped for the
//! recipient into an `EncryptedKey`, and the payload is encrypted under the
//! context's bulk cipher. `EncryptionMethod` always names the cipher that
//! produced `CipherValue`.

use crate::context::EncContext;
use crate::model::{
    CipherData, EncryptedData, EncryptedKey, EncryptedType, EncryptionMethod, KeyInfo,
};
use kapsel_core::{algorithm, AlgorithmFamily, Error, Result};
use kapsel_crypto::{AlgorithmDescriptor, BlockCipher, EncryptionAlgorithm};
use kapsel_keys::{AsymmetricKey, Key, SymmetricKey};
use kapsel_xml::{Element, Node};

/// Backend cipher errors surface as encryption failures.
fn encryption_failure(err: Error) -> Error {
    match err {
        Error::Crypto(msg) => Error::Encryption(msg),
        other => other,
    }
}

fn seal(cipher: &dyn EncryptionAlgorithm, plaintext: &[u8]) -> Result<Vec<u8>> {
    cipher.encrypt(plaintext).map_err(encryption_failure)
}

impl EncContext {
    /// Encrypt `payload` under `algorithm` with `key`.
    ///
    /// `key` is the recipient's RSA key for a key transport algorithm and
    /// the content key for a block cipher.
    pub fn encrypt(&self, payload: &[u8], algorithm: &str, key: &Key) -> Result<EncryptedData> {
        self.encrypt_typed(payload, self.type_.as_deref(), algorithm, key)
    }

    pub(crate) fn encrypt_typed(
        &self,
        payload: &[u8],
        type_: Option<&str>,
        algorithm: &str,
        key: &Key,
    ) -> Result<EncryptedData> {
        let (bulk, key_info, ciphertext) = match self.registry.family(algorithm) {
            Some(AlgorithmFamily::KeyTransport) => {
                let (encrypted_key, cipher) = self.wrap_session_key(algorithm, key)?;
                let ciphertext = seal(&cipher, payload)?;
                (
                    cipher.algorithm_id().to_owned(),
                    Some(KeyInfo::with_encrypted_key(encrypted_key)),
                    ciphertext,
                )
            }
            _ => {
                let factory = self.block_cipher_factory();
                factory.ensure_allowed(algorithm)?;
                let cipher = factory.get_algorithm(algorithm, key.as_symmetric()?)?;
                (algorithm.to_owned(), None, seal(&cipher, payload)?)
            }
        };

        Ok(EncryptedData {
            encrypted: EncryptedType {
                id: None,
                type_: type_.map(str::to_owned),
                mime_type: self.mime_type.clone(),
                encoding: self.encoding.clone(),
                encryption_method: Some(EncryptionMethod::new(&bulk)),
                key_info,
                cipher_data: CipherData::from_bytes(&ciphertext),
            },
        })
    }

    /// Generate a session key, wrap it for `recipient` and bind the bulk
    /// cipher to it.
    fn wrap_session_key(&self, transport_uri: &str, recipient: &Key) -> Result<(EncryptedKey, BlockCipher)> {
        let transport_factory = self.key_transport_factory();
        transport_factory.ensure_allowed(transport_uri)?;
        let transport = transport_factory.get_algorithm(transport_uri, recipient.as_asymmetric()?)?;

        let block_factory = self.block_cipher_factory();
        let AlgorithmDescriptor::BlockCipher { key_len, parity, .. } =
            *block_factory.ensure_allowed(&self.block_cipher)?
        else {
            return Err(Error::UnsupportedAlgorithm(format!(
                "block cipher: {}",
                self.block_cipher
            )));
        };
        let session = SymmetricKey::generate_with(
            self.random.as_ref(),
            self.session_key_len.unwrap_or(key_len),
            parity,
        )?;
        let cipher = block_factory.get_algorithm(&self.block_cipher, &session)?;
        let wrapped = seal(&transport, session.as_bytes())?;
        tracing::debug!(
            transport = transport_uri,
            bulk = %self.block_cipher,
            key_len = session.len(),
            "wrapped session key"
        );

        let encrypted_key = EncryptedKey {
            encrypted: EncryptedType {
                encryption_method: Some(EncryptionMethod::new(transport_uri)),
                ..EncryptedType::new(CipherData::from_bytes(&wrapped))
            },
            recipient: self.recipient.clone(),
            carried_key_name: self.carried_key_name.clone(),
        };
        Ok((encrypted_key, cipher))
    }

    /// Wrap existing key material for `recipient` as an `EncryptedKey`.
    pub fn encrypt_key(
        &self,
        key: &SymmetricKey,
        algorithm: &str,
        recipient: &AsymmetricKey,
    ) -> Result<EncryptedKey> {
        let transport = self.key_transport_factory().get_algorithm(algorithm, recipient)?;
        let wrapped = seal(&transport, key.as_bytes())?;
        Ok(EncryptedKey {
            encrypted: EncryptedType {
                type_: Some(algorithm::ENC_TYPE_ENCRYPTED_KEY.to_owned()),
                encryption_method: Some(EncryptionMethod::new(algorithm)),
                ..EncryptedType::new(CipherData::from_bytes(&wrapped))
            },
            recipient: self.recipient.clone(),
            carried_key_name: self.carried_key_name.clone(),
        })
    }
}

// ── Encryptable capability ───────────────────────────────────────────

/// Something that can be turned into an `EncryptedData`.
///
/// Implementors only say what their plaintext is and which `Type` URI
/// describes it; the envelope itself is always built by [`EncContext`].
pub trait Encryptable {
    fn plaintext(&self) -> Vec<u8>;

    fn encryption_type(&self) -> Option<&str> {
        None
    }

    fn encrypt(&self, ctx: &EncContext, algorithm: &str, key: &Key) -> Result<EncryptedData> {
        let type_ = self.encryption_type().or(ctx.type_.as_deref());
        ctx.encrypt_typed(&self.plaintext(), type_, algorithm, key)
    }
}

/// A whole element, encrypted as its serialized markup.
impl Encryptable for Element {
    fn plaintext(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }

    fn encryption_type(&self) -> Option<&str> {
        Some(algorithm::ENC_TYPE_ELEMENT)
    }
}

/// The children of an element, without the element's own tags.
#[derive(Debug, Clone, Copy)]
pub struct ElementContent<'a>(pub &'a Element);

impl Encryptable for ElementContent<'_> {
    fn plaintext(&self) -> Vec<u8> {
        let mut out = String::new();
        for child in self.0.children() {
            match child {
                Node::Element(e) => out.push_str(&e.to_xml_string()),
                Node::Text(t) => out.push_str(&kapsel_xml::escape::escape_text(t)),
                Node::Comment(c) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                }
            }
        }
        out.into_bytes()
    }

    fn encryption_type(&self) -> Option<&str> {
        Some(algorithm::ENC_TYPE_CONTENT)
    }
}

/// Opaque octets.
impl Encryptable for [u8] {
    fn plaintext(&self) -> Vec<u8> {
        self.to_vec()
    }
}
