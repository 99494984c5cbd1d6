#![forbid(unsafe_code)]

//! The xenc vocabulary and the ds:KeyInfo carrier.
//!
//! ```text
//! EncryptedData { Id?, Type?, MimeType?, Encoding? }
//!   EncryptionMethod?  ds:KeyInfo?  CipherData
//! EncryptedKey  { ...same..., Recipient? }
//!   EncryptionMethod?  ds:KeyInfo?  CipherData  CarriedKeyName?
//! ```

use base64::Engine;
use kapsel_core::{ns, Error, Result};
use kapsel_xml::model::{at_most_one, exactly_one, required_attribute};
use kapsel_xml::{impl_canonical_eq, Element, XmlElement};

fn base64_engine() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

fn set_optional(element: &mut Element, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        element.set_attribute(name, value);
    }
}

fn optional(element: &Element, name: &str) -> Option<String> {
    element.attribute(name).map(str::to_owned)
}

// ── EncryptionMethod ─────────────────────────────────────────────────

/// `xenc:EncryptionMethod`.
#[derive(Debug, Clone)]
pub struct EncryptionMethod {
    pub algorithm: String,
    pub key_size: Option<u32>,
    /// Algorithm parameters this library does not interpret (OAEPparams, ds:DigestMethod).
    pub params: Vec<Element>,
}

impl EncryptionMethod {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_owned(),
            key_size: None,
            params: Vec::new(),
        }
    }
}

impl XmlElement for EncryptionMethod {
    const NAMESPACE: &'static str = ns::ENC;
    const LOCAL_NAME: &'static str = ns::node::ENCRYPTION_METHOD;
    const PREFIX: &'static str = ns::prefix::ENC;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let algorithm = required_attribute(element, ns::attr::ALGORITHM)?.to_owned();
        let key_size = at_most_one(element, ns::ENC, ns::node::KEY_SIZE)?
            .map(|k| {
                k.text().trim().parse::<u32>().map_err(|_| {
                    Error::InvalidElement(format!("KeySize is not an integer: {}", k.text()))
                })
            })
            .transpose()?;
        let params = element
            .child_elements()
            .filter(|e| !e.is(ns::ENC, ns::node::KEY_SIZE))
            .cloned()
            .collect();
        Ok(Self {
            algorithm,
            key_size,
            params,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        element.set_attribute(ns::attr::ALGORITHM, &self.algorithm);
        if let Some(size) = self.key_size {
            element
                .append_child(Element::new_ns(ns::ENC, Some(ns::prefix::ENC), ns::node::KEY_SIZE))
                .append_text(&size.to_string());
        }
        for param in &self.params {
            element.append_child(param.clone());
        }
        element
    }
}

// ── CipherData ───────────────────────────────────────────────────────

/// `xenc:CipherReference`: ciphertext stored elsewhere.
#[derive(Debug, Clone)]
pub struct CipherReference {
    pub uri: String,
    /// The `xenc:Transforms` child, kept as-is.
    pub transforms: Option<Element>,
}

impl XmlElement for CipherReference {
    const NAMESPACE: &'static str = ns::ENC;
    const LOCAL_NAME: &'static str = ns::node::CIPHER_REFERENCE;
    const PREFIX: &'static str = ns::prefix::ENC;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        Ok(Self {
            uri: required_attribute(element, ns::attr::URI)?.to_owned(),
            transforms: at_most_one(element, ns::ENC, ns::node::TRANSFORMS)?.cloned(),
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        element.set_attribute(ns::attr::URI, &self.uri);
        if let Some(transforms) = &self.transforms {
            element.append_child(transforms.clone());
        }
        element
    }
}

/// `xenc:CipherData`: a choice of inline value or reference.
#[derive(Debug, Clone)]
pub enum CipherData {
    /// Base64 text of `xenc:CipherValue`, decoded only when decrypting.
    Value(String),
    Reference(CipherReference),
}

impl CipherData {
    pub fn from_bytes(ciphertext: &[u8]) -> Self {
        CipherData::Value(base64_engine().encode(ciphertext))
    }

    /// Decode an inline value. References are not dereferenced.
    pub fn decode(&self) -> Result<Vec<u8>> {
        match self {
            CipherData::Value(text) => {
                let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                base64_engine()
                    .decode(clean)
                    .map_err(|e| Error::Base64(e.to_string()))
            }
            CipherData::Reference(r) => Err(Error::InvalidUri(format!(
                "CipherReference is not dereferenced: {}",
                r.uri
            ))),
        }
    }
}

impl XmlElement for CipherData {
    const NAMESPACE: &'static str = ns::ENC;
    const LOCAL_NAME: &'static str = ns::node::CIPHER_DATA;
    const PREFIX: &'static str = ns::prefix::ENC;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let value = at_most_one(element, ns::ENC, ns::node::CIPHER_VALUE)?;
        let reference = at_most_one(element, ns::ENC, ns::node::CIPHER_REFERENCE)?;
        match (value, reference) {
            (Some(v), None) => Ok(CipherData::Value(v.text().trim().to_owned())),
            (None, Some(r)) => Ok(CipherData::Reference(CipherReference::from_xml(r)?)),
            (None, None) => Err(Error::MissingElement(
                "CipherValue or CipherReference in CipherData".into(),
            )),
            (Some(_), Some(_)) => Err(Error::TooManyElements(
                "both CipherValue and CipherReference in CipherData".into(),
            )),
        }
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        match self {
            CipherData::Value(text) => {
                element
                    .append_child(Element::new_ns(
                        ns::ENC,
                        Some(ns::prefix::ENC),
                        ns::node::CIPHER_VALUE,
                    ))
                    .append_text(text);
            }
            CipherData::Reference(r) => {
                r.to_xml(&mut element);
            }
        }
        element
    }
}

// ── KeyInfo ──────────────────────────────────────────────────────────

/// One child of `ds:KeyInfo`.
#[derive(Debug, Clone)]
pub enum KeyInfoItem {
    KeyName(String),
    EncryptedKey(Box<EncryptedKey>),
    /// Any other key description, kept as-is.
    Other(Element),
}

/// `ds:KeyInfo`. Never empty.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub id: Option<String>,
    pub items: Vec<KeyInfoItem>,
}

impl KeyInfo {
    pub fn with_encrypted_key(key: EncryptedKey) -> Self {
        Self {
            id: None,
            items: vec![KeyInfoItem::EncryptedKey(Box::new(key))],
        }
    }

    pub fn with_key_name(name: &str) -> Self {
        Self {
            id: None,
            items: vec![KeyInfoItem::KeyName(name.to_owned())],
        }
    }

    /// The first carried `EncryptedKey`, if any.
    pub fn encrypted_key(&self) -> Option<&EncryptedKey> {
        self.items.iter().find_map(|item| match item {
            KeyInfoItem::EncryptedKey(k) => Some(k.as_ref()),
            _ => None,
        })
    }

    pub fn key_name(&self) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            KeyInfoItem::KeyName(n) => Some(n.as_str()),
            _ => None,
        })
    }
}

impl XmlElement for KeyInfo {
    const NAMESPACE: &'static str = ns::DSIG;
    const LOCAL_NAME: &'static str = ns::node::KEY_INFO;
    const PREFIX: &'static str = ns::prefix::DSIG;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let items = element
            .child_elements()
            .map(|child| {
                if child.is(ns::DSIG, ns::node::KEY_NAME) {
                    Ok(KeyInfoItem::KeyName(child.text().trim().to_owned()))
                } else if child.is(ns::ENC, ns::node::ENCRYPTED_KEY) {
                    Ok(KeyInfoItem::EncryptedKey(Box::new(EncryptedKey::from_xml(child)?)))
                } else {
                    Ok(KeyInfoItem::Other(child.clone()))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        if items.is_empty() {
            return Err(Error::MissingElement("content in KeyInfo".into()));
        }
        Ok(Self {
            id: optional(element, ns::attr::ID),
            items,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        set_optional(&mut element, ns::attr::ID, &self.id);
        for item in &self.items {
            match item {
                KeyInfoItem::KeyName(name) => {
                    element
                        .append_child(Element::new_ns(
                            ns::DSIG,
                            Some(ns::prefix::DSIG),
                            ns::node::KEY_NAME,
                        ))
                        .append_text(name);
                }
                KeyInfoItem::EncryptedKey(key) => {
                    key.to_xml(&mut element);
                }
                KeyInfoItem::Other(other) => {
                    element.append_child(other.clone());
                }
            }
        }
        element
    }
}

// ── EncryptedData / EncryptedKey ─────────────────────────────────────

/// The parts `EncryptedData` and `EncryptedKey` share (xenc:EncryptedType).
#[derive(Debug, Clone)]
pub struct EncryptedType {
    pub id: Option<String>,
    pub type_: Option<String>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub encryption_method: Option<EncryptionMethod>,
    pub key_info: Option<KeyInfo>,
    pub cipher_data: CipherData,
}

impl EncryptedType {
    pub fn new(cipher_data: CipherData) -> Self {
        Self {
            id: None,
            type_: None,
            mime_type: None,
            encoding: None,
            encryption_method: None,
            key_info: None,
            cipher_data,
        }
    }

    /// The algorithm named by `EncryptionMethod`, or `NoAlgorithm`.
    pub fn algorithm(&self, what: &str) -> Result<&str> {
        self.encryption_method
            .as_ref()
            .map(|m| m.algorithm.as_str())
            .ok_or_else(|| Error::NoAlgorithm(format!("{what} has no EncryptionMethod")))
    }

    fn read(element: &Element) -> Result<Self> {
        let encryption_method = at_most_one(element, ns::ENC, ns::node::ENCRYPTION_METHOD)?
            .map(EncryptionMethod::from_xml)
            .transpose()?;
        let key_info = at_most_one(element, ns::DSIG, ns::node::KEY_INFO)?
            .map(KeyInfo::from_xml)
            .transpose()?;
        let cipher_data = CipherData::from_xml(exactly_one(element, ns::ENC, ns::node::CIPHER_DATA)?)?;
        Ok(Self {
            id: optional(element, ns::attr::ID),
            type_: optional(element, ns::attr::TYPE),
            mime_type: optional(element, ns::attr::MIME_TYPE),
            encoding: optional(element, ns::attr::ENCODING),
            encryption_method,
            key_info,
            cipher_data,
        })
    }

    fn write(&self, element: &mut Element) {
        set_optional(element, ns::attr::ID, &self.id);
        set_optional(element, ns::attr::TYPE, &self.type_);
        set_optional(element, ns::attr::MIME_TYPE, &self.mime_type);
        set_optional(element, ns::attr::ENCODING, &self.encoding);
        if let Some(method) = &self.encryption_method {
            method.to_xml(element);
        }
        if let Some(key_info) = &self.key_info {
            key_info.to_xml(element);
        }
        self.cipher_data.to_xml(element);
    }
}

/// `xenc:EncryptedData`.
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub encrypted: EncryptedType,
}

impl std::ops::Deref for EncryptedData {
    type Target = EncryptedType;

    fn deref(&self) -> &EncryptedType {
        &self.encrypted
    }
}

impl XmlElement for EncryptedData {
    const NAMESPACE: &'static str = ns::ENC;
    const LOCAL_NAME: &'static str = ns::node::ENCRYPTED_DATA;
    const PREFIX: &'static str = ns::prefix::ENC;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        Ok(Self {
            encrypted: EncryptedType::read(element)?,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        self.encrypted.write(&mut element);
        element
    }
}

/// `xenc:EncryptedKey`: an encrypted type whose plaintext is key material.
#[derive(Debug, Clone)]
pub struct EncryptedKey {
    pub encrypted: EncryptedType,
    pub recipient: Option<String>,
    pub carried_key_name: Option<String>,
}

impl std::ops::Deref for EncryptedKey {
    type Target = EncryptedType;

    fn deref(&self) -> &EncryptedType {
        &self.encrypted
    }
}

impl XmlElement for EncryptedKey {
    const NAMESPACE: &'static str = ns::ENC;
    const LOCAL_NAME: &'static str = ns::node::ENCRYPTED_KEY;
    const PREFIX: &'static str = ns::prefix::ENC;

    fn from_xml(element: &Element) -> Result<Self> {
        Self::check_name(element)?;
        let carried_key_name = at_most_one(element, ns::ENC, ns::node::CARRIED_KEY_NAME)?
            .map(|e| e.text().trim().to_owned());
        Ok(Self {
            encrypted: EncryptedType::read(element)?,
            recipient: optional(element, ns::attr::RECIPIENT),
            carried_key_name,
        })
    }

    fn to_element(&self) -> Element {
        let mut element = Self::new_element();
        set_optional(&mut element, ns::attr::RECIPIENT, &self.recipient);
        self.encrypted.write(&mut element);
        if let Some(name) = &self.carried_key_name {
            element
                .append_child(Element::new_ns(
                    ns::ENC,
                    Some(ns::prefix::ENC),
                    ns::node::CARRIED_KEY_NAME,
                ))
                .append_text(name);
        }
        element
    }
}

impl_canonical_eq!(
    EncryptionMethod,
    CipherReference,
    CipherData,
    KeyInfo,
    EncryptedData,
    EncryptedKey
);

#[cfg(test)]
mod tests {
    use super::*;
    use kapsel_core::algorithm;

    const ENCRYPTED_DATA: &str = r#"<xenc:EncryptedData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="ed1" Type="http://www.w3.org/2001/04/xmlenc#Element"><xenc:EncryptionMethod Algorithm="http://www.w3.org/2009/xmlenc11#aes256-gcm"/><ds:KeyInfo><xenc:EncryptedKey Recipient="bob"><xenc:EncryptionMethod Algorithm="http://www.w3.org/2009/xmlenc11#rsa-oaep"/><xenc:CipherData><xenc:CipherValue>AAEC</xenc:CipherValue></xenc:CipherData><xenc:CarriedKeyName>session</xenc:CarriedKeyName></xenc:EncryptedKey></ds:KeyInfo><xenc:CipherData><xenc:CipherValue>
            AAECAw==
        </xenc:CipherValue></xenc:CipherData></xenc:EncryptedData>"#;

    #[test]
    fn test_parse_encrypted_data() {
        let data = EncryptedData::parse(ENCRYPTED_DATA).unwrap();
        assert_eq!(data.id.as_deref(), Some("ed1"));
        assert_eq!(data.algorithm("EncryptedData").unwrap(), algorithm::AES256_GCM);
        assert_eq!(data.cipher_data.decode().unwrap(), vec![0, 1, 2, 3]);
        let key = data.key_info.as_ref().unwrap().encrypted_key().unwrap();
        assert_eq!(key.recipient.as_deref(), Some("bob"));
        assert_eq!(key.carried_key_name.as_deref(), Some("session"));
        assert_eq!(key.algorithm("EncryptedKey").unwrap(), algorithm::RSA_OAEP);
    }

    #[test]
    fn test_canonical_equality_survives_reencoding() {
        let data = EncryptedData::parse(ENCRYPTED_DATA).unwrap();
        let encoded = data.to_element().to_xml_string();
        let reparsed = EncryptedData::parse(&encoded).unwrap();
        assert_eq!(reparsed, data);
        assert_eq!(reparsed.to_element().to_xml_string(), encoded);
    }

    #[test]
    fn test_missing_encryption_method_parses() {
        let xml = r#"<xenc:EncryptedData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"><xenc:CipherData><xenc:CipherValue>AA==</xenc:CipherValue></xenc:CipherData></xenc:EncryptedData>"#;
        let data = EncryptedData::parse(xml).unwrap();
        assert!(data.encryption_method.is_none());
        assert!(matches!(
            data.algorithm("EncryptedData"),
            Err(Error::NoAlgorithm(_))
        ));
    }

    #[test]
    fn test_structural_errors() {
        let wrong_name = r#"<xenc:EncryptedKey xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"><xenc:CipherData><xenc:CipherValue>AA==</xenc:CipherValue></xenc:CipherData></xenc:EncryptedKey>"#;
        assert!(matches!(
            EncryptedData::parse(wrong_name),
            Err(Error::InvalidElement(_))
        ));

        let no_cipher_data = r#"<xenc:EncryptedData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"/>"#;
        assert!(matches!(
            EncryptedData::parse(no_cipher_data),
            Err(Error::MissingElement(_))
        ));

        let two_methods = r#"<xenc:EncryptedData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"><xenc:EncryptionMethod Algorithm="a"/><xenc:EncryptionMethod Algorithm="b"/><xenc:CipherData><xenc:CipherValue>AA==</xenc:CipherValue></xenc:CipherData></xenc:EncryptedData>"#;
        assert!(matches!(
            EncryptedData::parse(two_methods),
            Err(Error::TooManyElements(_))
        ));

        let both = r#"<xenc:CipherData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"><xenc:CipherValue>AA==</xenc:CipherValue><xenc:CipherReference URI="x"/></xenc:CipherData>"#;
        assert!(CipherData::parse(both).unwrap_err().is_schema_violation());

        let method_without_algorithm = r#"<xenc:EncryptionMethod xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"/>"#;
        assert!(matches!(
            EncryptionMethod::parse(method_without_algorithm),
            Err(Error::MissingAttribute(_))
        ));
    }

    #[test]
    fn test_empty_key_info_rejected() {
        let xml = r#"<ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/>"#;
        assert!(matches!(KeyInfo::parse(xml), Err(Error::MissingElement(_))));
    }

    #[test]
    fn test_key_info_keeps_unknown_children() {
        let xml = r#"<ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:KeyName>k1</ds:KeyName><ds:X509Data><ds:X509SubjectName>CN=a</ds:X509SubjectName></ds:X509Data></ds:KeyInfo>"#;
        let info = KeyInfo::parse(xml).unwrap();
        assert_eq!(info.key_name(), Some("k1"));
        assert!(matches!(info.items[1], KeyInfoItem::Other(_)));
        assert_eq!(info.to_element().to_xml_string(), xml);
    }

    #[test]
    fn test_cipher_reference_roundtrip() {
        let xml = r#"<xenc:CipherData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#"><xenc:CipherReference URI="http://example.com/ct.bin"/></xenc:CipherData>"#;
        let data = CipherData::parse(xml).unwrap();
        assert!(matches!(&data, CipherData::Reference(r) if r.uri == "http://example.com/ct.bin"));
        assert!(matches!(data.decode(), Err(Error::InvalidUri(_))));
        assert_eq!(data.to_element().to_xml_string(), xml);
    }

    #[test]
    fn test_key_size() {
        let xml = r#"<xenc:EncryptionMethod xmlns:xenc="http://www.w3.org/2001/04/xmlenc#" Algorithm="http://www.w3.org/2001/04/xmlenc#aes128-cbc"><xenc:KeySize>128</xenc:KeySize></xenc:EncryptionMethod>"#;
        let method = EncryptionMethod::parse(xml).unwrap();
        assert_eq!(method.key_size, Some(128));
        assert!(method.params.is_empty());
        assert_eq!(method.to_element().to_xml_string(), xml);
    }
}
