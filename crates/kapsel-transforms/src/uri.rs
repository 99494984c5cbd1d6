#![forbid(unsafe_code)]

//! Same-document reference URIs.
//!
//! - `""`: the whole document minus comments
//! - `#id`: the identified element's subtree minus comments
//! - `#xpointer(/)`: the whole document with comments
//! - `#xpointer(id('id'))`: the identified subtree with comments
//!
//! Anything else is an external reference and is refused.

use crate::pipeline::TransformData;
use kapsel_core::{Error, Result};
use kapsel_xml::{DocumentContext, NodeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceUri {
    Document,
    Id(String),
    XPointerRoot,
    XPointerId(String),
}

impl ReferenceUri {
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.is_empty() {
            return Ok(ReferenceUri::Document);
        }
        let fragment = uri
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidUri(format!("external URI not supported: {uri}")))?;
        if let Some(pointer) = fragment
            .strip_prefix("xpointer(")
            .and_then(|r| r.strip_suffix(')'))
        {
            if pointer == "/" {
                return Ok(ReferenceUri::XPointerRoot);
            }
            let id = pointer
                .strip_prefix("id(")
                .and_then(|r| r.strip_suffix(')'))
                .map(|q| q.trim_matches(|c| c == '\'' || c == '"'))
                .filter(|id| !id.is_empty())
                .ok_or_else(|| Error::InvalidUri(format!("unsupported XPointer: {uri}")))?;
            return Ok(ReferenceUri::XPointerId(id.to_owned()));
        }
        if fragment.is_empty() {
            return Err(Error::InvalidUri("empty fragment".into()));
        }
        Ok(ReferenceUri::Id(fragment.to_owned()))
    }

    /// The node set this URI selects in `document`.
    pub fn dereference(&self, document: &DocumentContext<'_, '_>) -> Result<TransformData> {
        let set = match self {
            ReferenceUri::Document => NodeSet::all(document.document(), false),
            ReferenceUri::XPointerRoot => NodeSet::all(document.document(), true),
            ReferenceUri::Id(id) => NodeSet::tree(document.find_by_id(id)?, false),
            ReferenceUri::XPointerId(id) => NodeSet::tree(document.find_by_id(id)?, true),
        };
        Ok(TransformData::NodeSet(set))
    }
}

impl std::fmt::Display for ReferenceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceUri::Document => Ok(()),
            ReferenceUri::Id(id) => write!(f, "#{id}"),
            ReferenceUri::XPointerRoot => f.write_str("#xpointer(/)"),
            ReferenceUri::XPointerId(id) => write!(f, "#xpointer(id('{id}'))"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(ReferenceUri::parse("").unwrap(), ReferenceUri::Document);
        assert_eq!(ReferenceUri::parse("#a").unwrap(), ReferenceUri::Id("a".into()));
        assert_eq!(
            ReferenceUri::parse("#xpointer(/)").unwrap(),
            ReferenceUri::XPointerRoot
        );
        assert_eq!(
            ReferenceUri::parse("#xpointer(id('a'))").unwrap(),
            ReferenceUri::XPointerId("a".into())
        );
        assert!(ReferenceUri::parse("http://example.com/doc.xml").is_err());
        assert!(ReferenceUri::parse("#xpointer(//x)").is_err());
        assert!(ReferenceUri::parse("#").is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for uri in ["", "#a", "#xpointer(/)", "#xpointer(id('a'))"] {
            assert_eq!(ReferenceUri::parse(uri).unwrap().to_string(), uri);
        }
    }

    #[test]
    fn test_comments_follow_form() {
        let doc = kapsel_xml::parse_document(r#"<r><!--c--><a Id="a"><!--d--></a></r>"#).unwrap();
        let ctx = DocumentContext::new(&doc, &[]);
        let size = |uri: &str| match ReferenceUri::parse(uri).unwrap().dereference(&ctx).unwrap() {
            TransformData::NodeSet(set) => set.len(),
            TransformData::Octets(_) => unreachable!(),
        };
        assert_eq!(size("#xpointer(/)"), size("") + 2);
        assert_eq!(size("#xpointer(id('a'))"), size("#a") + 1);
    }
}
