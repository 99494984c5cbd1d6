#![forbid(unsafe_code)]

//! Shared rendering utilities for C14N output.

use kapsel_core::ns;
use kapsel_xml::escape;
use roxmltree::{NodeType, Node};
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    pub uri: String,
}

impl NsDecl {
    pub fn render(&self) -> String {
        if self.prefix.is_empty() {
            format!(" xmlns=\"{}\"", escape::escape_attr(&self.uri))
        } else {
            format!(" xmlns:{}=\"{}\"", self.prefix, escape::escape_attr(&self.uri))
        }
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        // Default namespace first, then by prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Namespace URI ("" for none).
    pub ns_uri: String,
    pub local_name: String,
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn from_roxml(node: &Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> Self {
        let ns_uri = attr.namespace().unwrap_or("");
        let qualified_name = match attribute_prefix(node, ns_uri) {
            Some(p) => format!("{p}:{}", attr.name()),
            None => attr.name().to_owned(),
        };
        Self {
            ns_uri: ns_uri.to_owned(),
            local_name: attr.name().to_owned(),
            qualified_name,
            value: attr.value().to_owned(),
        }
    }

    pub fn render(&self) -> String {
        format!(" {}=\"{}\"", self.qualified_name, escape::escape_attr(&self.value))
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        // Unqualified attributes first, then by (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Prefix the element name is written with ("" for default/no namespace).
pub fn element_prefix(node: &Node<'_, '_>) -> String {
    let Some(uri) = node.tag_name().namespace() else {
        return String::new();
    };
    if node.namespaces().any(|n| n.name().is_none() && n.uri() == uri) {
        return String::new();
    }
    attribute_prefix(node, uri).unwrap_or_default()
}

fn attribute_prefix(node: &Node<'_, '_>, uri: &str) -> Option<String> {
    if uri.is_empty() {
        return None;
    }
    if uri == ns::XML {
        return Some("xml".to_owned());
    }
    node.namespaces()
        .find(|n| n.name().is_some() && n.uri() == uri)
        .and_then(|n| n.name())
        .map(str::to_owned)
}

/// The qualified element name (prefix:local or just local).
pub fn qualified_element_name(node: &Node<'_, '_>) -> String {
    let prefix = element_prefix(node);
    if prefix.is_empty() {
        node.tag_name().name().to_owned()
    } else {
        format!("{prefix}:{}", node.tag_name().name())
    }
}

fn parent_is_root(node: &Node<'_, '_>) -> bool {
    node.parent()
        .is_some_and(|p| p.node_type() == NodeType::Root)
}

/// Render a comment or PI, adding the line breaks C14N requires around
/// top-level nodes outside the document element.
pub fn render_outside_markup(node: &Node<'_, '_>, output: &mut Vec<u8>) {
    let top_level = parent_is_root(node);
    if top_level && node.prev_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }

    match node.node_type() {
        NodeType::Comment => {
            output.extend_from_slice(b"<!--");
            output.extend_from_slice(node.text().unwrap_or("").as_bytes());
            output.extend_from_slice(b"-->");
        }
        NodeType::PI => {
            if let Some(pi) = node.pi() {
                output.extend_from_slice(b"<?");
                output.extend_from_slice(pi.target.as_bytes());
                if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                    output.push(b' ');
                    output.extend_from_slice(escape::escape_pi(value).as_bytes());
                }
                output.extend_from_slice(b"?>");
            }
        }
        _ => {}
    }

    if top_level && node.next_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_decl_order() {
        let mut decls = vec![
            NsDecl { prefix: "b".into(), uri: "urn:b".into() },
            NsDecl { prefix: String::new(), uri: "urn:d".into() },
            NsDecl { prefix: "a".into(), uri: "urn:a".into() },
        ];
        decls.sort();
        let prefixes: Vec<&str> = decls.iter().map(|d| d.prefix.as_str()).collect();
        assert_eq!(prefixes, ["", "a", "b"]);
    }

    #[test]
    fn test_attr_order_unqualified_first() {
        let mut attrs = vec![
            Attr { ns_uri: "urn:z".into(), local_name: "a".into(), qualified_name: "z:a".into(), value: String::new() },
            Attr { ns_uri: String::new(), local_name: "b".into(), qualified_name: "b".into(), value: String::new() },
            Attr { ns_uri: "urn:a".into(), local_name: "c".into(), qualified_name: "a:c".into(), value: String::new() },
        ];
        attrs.sort();
        let names: Vec<&str> = attrs.iter().map(|a| a.qualified_name.as_str()).collect();
        assert_eq!(names, ["b", "a:c", "z:a"]);
    }
}
