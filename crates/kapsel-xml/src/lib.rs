#![forbid(unsafe_code)]

//! XML element model for the kapsel XML Security library.
//!
//! Two views of XML live here. [`Element`] is an owned, mutable tree used to
//! build and parse the xenc/ds vocabularies. [`DocumentContext`] and
//! [`NodeSet`] work over a borrowed `roxmltree` document and are what the
//! reference engine dereferences, transforms and canonicalizes.

pub mod document;
pub mod element;
pub mod escape;
pub mod model;
pub mod nodeset;

pub use document::DocumentContext;
pub use element::{Attribute, Element, Node};
pub use model::XmlElement;
pub use nodeset::NodeSet;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree never expands external entities, so documents carrying an
/// internal subset are accepted.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse a document with [`parsing_options`], mapping the error.
pub fn parse_document(text: &str) -> kapsel_core::Result<roxmltree::Document<'_>> {
    roxmltree::Document::parse_with_options(text, parsing_options())
        .map_err(|e| kapsel_core::Error::XmlParse(e.to_string()))
}
