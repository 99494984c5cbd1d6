#![forbid(unsafe_code)]

//! Document context for reference dereferencing.
//!
//! Wraps a parsed `roxmltree` document together with its ID attribute map
//! and, when verifying an enveloped signature, the signature element.

use kapsel_core::{Error, Result};
use roxmltree::{Document, Node, NodeId};
use std::collections::{HashMap, HashSet};

/// Attribute names registered as IDs by default.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// A parsed document plus the lookups the reference engine needs.
pub struct DocumentContext<'a, 'input> {
    doc: &'a Document<'input>,
    id_map: HashMap<String, NodeId>,
    /// ID values carried by more than one element.
    duplicate_ids: HashSet<String>,
    signature: Option<NodeId>,
}

impl<'a, 'input> DocumentContext<'a, 'input> {
    /// Build the context, registering `Id`/`ID`/`id` plus `extra_id_attrs`.
    pub fn new(doc: &'a Document<'input>, extra_id_attrs: &[String]) -> Self {
        let mut id_map: HashMap<String, NodeId> = HashMap::new();
        let mut duplicate_ids = HashSet::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            let names = DEFAULT_ID_ATTRS
                .into_iter()
                .chain(extra_id_attrs.iter().map(String::as_str));
            for attr_name in names {
                let Some(val) = node.attribute(attr_name) else {
                    continue;
                };
                match id_map.get(val) {
                    Some(existing) if *existing != node.id() => {
                        tracing::debug!(id = val, "duplicate ID value");
                        duplicate_ids.insert(val.to_owned());
                    }
                    Some(_) => {}
                    None => {
                        id_map.insert(val.to_owned(), node.id());
                    }
                }
            }
        }
        Self {
            doc,
            id_map,
            duplicate_ids,
            signature: None,
        }
    }

    /// Mark the signature element that an enveloped-signature transform removes.
    pub fn with_signature(mut self, signature: Node<'_, '_>) -> Self {
        self.signature = Some(signature.id());
        self
    }

    /// Mark the first `{namespace}local_name` element as the signature, if any.
    pub fn with_signature_element(mut self, namespace: &str, local_name: &str) -> Self {
        self.signature = self
            .doc
            .descendants()
            .find(|n| {
                n.is_element()
                    && n.tag_name().name() == local_name
                    && n.tag_name().namespace().unwrap_or("") == namespace
            })
            .map(|n| n.id());
        self
    }

    pub fn document(&self) -> &'a Document<'input> {
        self.doc
    }

    pub fn signature(&self) -> Option<Node<'a, 'input>> {
        self.signature.and_then(|id| self.doc.get_node(id))
    }

    /// Find an element by its registered ID value.
    ///
    /// An ID carried by two different elements matches neither.
    pub fn find_by_id(&self, id: &str) -> Result<Node<'a, 'input>> {
        if self.duplicate_ids.contains(id) {
            return Err(Error::InvalidUri(format!("duplicate ID: {id}")));
        }
        self.id_map
            .get(id)
            .and_then(|nid| self.doc.get_node(*nid))
            .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_default_id_attrs() {
        let doc = crate::parse_document(r#"<r><a Id="x"/><b ID="y"/><c id="z"/></r>"#).unwrap();
        let ctx = DocumentContext::new(&doc, &[]);
        assert_eq!(ctx.find_by_id("x").unwrap().tag_name().name(), "a");
        assert_eq!(ctx.find_by_id("y").unwrap().tag_name().name(), "b");
        assert_eq!(ctx.find_by_id("z").unwrap().tag_name().name(), "c");
        assert!(matches!(ctx.find_by_id("nope"), Err(Error::InvalidUri(_))));
    }

    #[test]
    fn test_duplicate_id_is_ambiguous() {
        let doc =
            crate::parse_document(r#"<r><a Id="x">signed</a><b Id="x">other</b><c id="y"/></r>"#)
                .unwrap();
        let ctx = DocumentContext::new(&doc, &[]);
        let err = ctx.find_by_id("x").unwrap_err();
        assert!(matches!(err, Error::InvalidUri(_)));
        assert!(err.to_string().contains("duplicate ID"));
        assert!(ctx.find_by_id("y").is_ok());

        // Across attribute names too.
        let doc = crate::parse_document(r#"<r><a Id="x"/><b AssertionID="x"/></r>"#).unwrap();
        assert!(DocumentContext::new(&doc, &[]).find_by_id("x").is_ok());
        assert!(DocumentContext::new(&doc, &["AssertionID".to_owned()])
            .find_by_id("x")
            .is_err());
    }

    #[test]
    fn test_same_element_under_two_id_attrs() {
        let doc = crate::parse_document(r#"<r><a Id="x" id="x"/></r>"#).unwrap();
        let ctx = DocumentContext::new(&doc, &[]);
        assert_eq!(ctx.find_by_id("x").unwrap().tag_name().name(), "a");
    }

    #[test]
    fn test_extra_id_attr() {
        let doc = crate::parse_document(r#"<r><a AssertionID="q"/></r>"#).unwrap();
        assert!(DocumentContext::new(&doc, &[]).find_by_id("q").is_err());
        let ctx = DocumentContext::new(&doc, &["AssertionID".to_owned()]);
        assert!(ctx.find_by_id("q").is_ok());
    }

    #[test]
    fn test_signature_element_lookup() {
        let doc = crate::parse_document(
            r#"<r><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/></r>"#,
        )
        .unwrap();
        let ctx = DocumentContext::new(&doc, &[])
            .with_signature_element(kapsel_core::ns::DSIG, "Signature");
        assert!(ctx.signature().is_some());
    }
}
