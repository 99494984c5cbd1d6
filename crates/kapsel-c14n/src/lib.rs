#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for the kapsel XML Security library.
//!
//! The reference engine only depends on the [`Canonicalizer`] trait. The
//! bundled [`DefaultCanonicalizer`] renders:
//! - Canonical XML 1.0 (with and without comments)
//! - Canonical XML 1.1, rendered with the 1.0 rules
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod exclusive;
pub mod inclusive;
pub mod render;

use kapsel_core::{algorithm, Error, Result};
use kapsel_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Canonical XML 1.1
    Inclusive11,
    /// Canonical XML 1.1 with comments
    Inclusive11WithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Inclusive11 => algorithm::C14N11,
            Self::Inclusive11WithComments => algorithm::C14N11_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::C14N11 => Some(Self::Inclusive11),
            algorithm::C14N11_WITH_COMMENTS => Some(Self::Inclusive11WithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments
                | Self::Inclusive11WithComments
                | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Serializes a document (or a subset of it) into canonical bytes.
pub trait Canonicalizer: Send + Sync {
    /// Canonicalize `node_set` of `doc` (the whole document when `None`).
    ///
    /// `inclusive_prefixes` is the InclusiveNamespaces PrefixList and only
    /// matters for the exclusive modes.
    fn canonicalize(
        &self,
        doc: &roxmltree::Document<'_>,
        node_set: Option<&NodeSet>,
        mode: C14nMode,
        inclusive_prefixes: &[String],
    ) -> Result<Vec<u8>>;

    /// Canonicalize by algorithm URI.
    fn canonicalize_uri(
        &self,
        doc: &roxmltree::Document<'_>,
        node_set: Option<&NodeSet>,
        algorithm: &str,
        inclusive_prefixes: &[String],
    ) -> Result<Vec<u8>> {
        let mode = C14nMode::from_uri(algorithm)
            .ok_or_else(|| Error::UnsupportedAlgorithm(algorithm.to_owned()))?;
        self.canonicalize(doc, node_set, mode, inclusive_prefixes)
    }
}

/// The built-in canonicalizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCanonicalizer;

impl Canonicalizer for DefaultCanonicalizer {
    fn canonicalize(
        &self,
        doc: &roxmltree::Document<'_>,
        node_set: Option<&NodeSet>,
        mode: C14nMode,
        inclusive_prefixes: &[String],
    ) -> Result<Vec<u8>> {
        match mode {
            C14nMode::Inclusive
            | C14nMode::InclusiveWithComments
            | C14nMode::Inclusive11
            | C14nMode::Inclusive11WithComments => {
                inclusive::canonicalize(doc, mode.with_comments(), node_set)
            }
            C14nMode::Exclusive | C14nMode::ExclusiveWithComments => {
                exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
            }
        }
    }
}

/// Convenience: parse `xml` and canonicalize the whole document.
pub fn canonicalize_str(xml: &str, mode: C14nMode) -> Result<Vec<u8>> {
    let doc = kapsel_xml::parse_document(xml)?;
    DefaultCanonicalizer.canonicalize(&doc, None, mode, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_uri_roundtrip() {
        for mode in [
            C14nMode::Inclusive,
            C14nMode::InclusiveWithComments,
            C14nMode::Inclusive11,
            C14nMode::Inclusive11WithComments,
            C14nMode::Exclusive,
            C14nMode::ExclusiveWithComments,
        ] {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
        }
        assert_eq!(C14nMode::from_uri(algorithm::SHA256), None);
    }

    #[test]
    fn test_canonicalize_unknown_uri() {
        let doc = kapsel_xml::parse_document("<a/>").unwrap();
        let err = DefaultCanonicalizer
            .canonicalize_uri(&doc, None, "urn:nope", &[])
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_comments_follow_mode() {
        let xml = "<a><!--note-->x</a>";
        let without = canonicalize_str(xml, C14nMode::Inclusive).unwrap();
        let with = canonicalize_str(xml, C14nMode::InclusiveWithComments).unwrap();
        assert_eq!(without, b"<a>x</a>");
        assert_eq!(with, b"<a><!--note-->x</a>");
    }
}
