#![forbid(unsafe_code)]

/// Errors produced by the kapsel XML Security library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("unexpected element: {0}")]
    InvalidElement(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("too many elements: {0}")]
    TooManyElements(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid attribute value: {0}")]
    InvalidAttribute(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("algorithm disabled for security reasons: {0}")]
    BlacklistedAlgorithm(String),

    #[error("algorithm already registered: {0}")]
    DuplicateAlgorithm(String),

    #[error("no algorithm specified: {0}")]
    NoAlgorithm(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    /// Deliberately carries no detail: every decryption failure looks the same.
    #[error("decryption failed")]
    Decryption,

    #[error("no secure random source available: {0}")]
    RandomSourceUnavailable(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error reports a violation of the XML schema: wrong
    /// element name or namespace, bad cardinality, or a missing attribute.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Error::InvalidElement(_)
                | Error::MissingElement(_)
                | Error::TooManyElements(_)
                | Error::MissingAttribute(_)
                | Error::InvalidAttribute(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_kinds() {
        assert!(Error::MissingElement("DigestMethod".into()).is_schema_violation());
        assert!(Error::TooManyElements("DigestMethod".into()).is_schema_violation());
        assert!(Error::InvalidElement("Foo".into()).is_schema_violation());
        assert!(!Error::Decryption.is_schema_violation());
        assert!(!Error::UnsupportedAlgorithm("x".into()).is_schema_violation());
    }

    #[test]
    fn test_decryption_message_has_no_detail() {
        assert_eq!(Error::Decryption.to_string(), "decryption failed");
    }
}
