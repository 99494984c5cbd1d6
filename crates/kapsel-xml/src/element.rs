#![forbid(unsafe_code)]

//! Owned XML element tree.
//!
//! Vocabulary types (EncryptedData, Reference, ...) are built from and
//! serialized to [`Element`]. The tree keeps namespace URIs next to the
//! prefixes they were written with, and the serializer emits whatever
//! `xmlns` declarations are needed for the output to be well-formed.

use crate::escape;
use kapsel_core::{ns, Result};
use std::collections::BTreeMap;
use std::fmt;

/// An attribute on an [`Element`].
#[derive(Debug, Clone)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub local_name: String,
    pub value: String,
}

impl Attribute {
    fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }
}

/// A child of an [`Element`].
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An owned XML element.
///
/// Equality is canonical: two elements are equal when they serialize to the
/// same bytes.
#[derive(Debug, Clone)]
pub struct Element {
    prefix: Option<String>,
    namespace: Option<String>,
    local_name: String,
    namespace_decls: Vec<(Option<String>, String)>,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

type Scope = BTreeMap<Option<String>, String>;

impl Element {
    /// Create an element with no namespace.
    pub fn new(local_name: &str) -> Self {
        Self {
            prefix: None,
            namespace: None,
            local_name: local_name.to_owned(),
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element in `namespace`, written with `prefix`.
    pub fn new_ns(namespace: &str, prefix: Option<&str>, local_name: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_owned),
            namespace: Some(namespace.to_owned()),
            ..Self::new(local_name)
        }
    }

    /// Parse the document element of `xml`.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = crate::parse_document(xml)?;
        Ok(Self::from_node(doc.root_element()))
    }

    /// Copy a roxmltree element (and its subtree) into an owned element.
    ///
    /// Every element records all namespaces in scope at it, so a detached
    /// subtree serializes on its own and QName-valued content (XPath
    /// expressions) can still be resolved. The serializer drops bindings
    /// the parent already made.
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let namespace_decls = node
            .namespaces()
            .filter(|n| n.name() != Some("xml"))
            .map(|n| (n.name().map(str::to_owned), n.uri().to_owned()))
            .collect();

        let namespace = node.tag_name().namespace().map(str::to_owned);
        let prefix = namespace
            .as_deref()
            .and_then(|uri| element_prefix(&node, uri));

        let attributes = node
            .attributes()
            .map(|a| Attribute {
                prefix: a.namespace().and_then(|uri| attribute_prefix(&node, uri)),
                namespace: a.namespace().map(str::to_owned),
                local_name: a.name().to_owned(),
                value: a.value().to_owned(),
            })
            .collect();

        let mut children = Vec::new();
        for child in node.children() {
            match child.node_type() {
                roxmltree::NodeType::Element => children.push(Node::Element(Self::from_node(child))),
                roxmltree::NodeType::Text => {
                    children.push(Node::Text(child.text().unwrap_or("").to_owned()))
                }
                roxmltree::NodeType::Comment => {
                    children.push(Node::Comment(child.text().unwrap_or("").to_owned()))
                }
                _ => {}
            }
        }

        Self {
            prefix,
            namespace,
            local_name: node.tag_name().name().to_owned(),
            namespace_decls,
            attributes,
            children,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Whether this element has the given namespace and local name.
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref().unwrap_or("") == namespace
    }

    /// Get an unqualified attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    /// Get an unqualified attribute, or `default` when it is absent.
    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attribute(name).unwrap_or(default)
    }

    /// Get a namespaced attribute.
    pub fn attribute_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Set an unqualified attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.local_name == name)
        {
            Some(attr) => attr.value = value.to_owned(),
            None => self.attributes.push(Attribute {
                prefix: None,
                namespace: None,
                local_name: name.to_owned(),
                value: value.to_owned(),
            }),
        }
    }

    /// Namespace bindings recorded on this element, `None` for the default.
    pub fn namespace_declarations(&self) -> &[(Option<String>, String)] {
        &self.namespace_decls
    }

    /// Declare a namespace binding on this element even if nothing uses it.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        let key = prefix.map(str::to_owned);
        self.namespace_decls.retain(|(p, _)| *p != key);
        self.namespace_decls.push((key, uri.to_owned()));
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Iterate over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterate over child elements with the given namespace and local name.
    pub fn children_named<'a, 'b>(
        &'a self,
        namespace: &'b str,
        local_name: &'b str,
    ) -> impl Iterator<Item = &'a Element> + 'b
    where
        'a: 'b,
    {
        self.child_elements()
            .filter(move |e| e.is(namespace, local_name))
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Append a child element and return a reference to it.
    pub fn append_child(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        match self.children.last_mut() {
            Some(Node::Element(e)) => e,
            _ => unreachable!("just pushed an element"),
        }
    }

    pub fn append_text(&mut self, text: &str) {
        self.children.push(Node::Text(text.to_owned()));
    }

    /// Serialize this element and its subtree to markup.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, &Scope::new());
        out
    }

    fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    fn write(&self, out: &mut String, inherited: &Scope) {
        let mut scope = inherited.clone();
        let mut decls: Vec<(Option<String>, String)> = Vec::new();

        for (prefix, uri) in &self.namespace_decls {
            bind(&mut scope, &mut decls, prefix.clone(), uri);
        }
        bind(
            &mut scope,
            &mut decls,
            self.prefix.clone(),
            self.namespace.as_deref().unwrap_or(""),
        );
        for attr in &self.attributes {
            if let (Some(p), Some(uri)) = (&attr.prefix, &attr.namespace) {
                if uri != ns::XML {
                    bind(&mut scope, &mut decls, Some(p.clone()), uri);
                }
            }
        }

        let qname = self.qualified_name();
        out.push('<');
        out.push_str(&qname);
        for (prefix, uri) in &decls {
            match prefix {
                Some(p) => out.push_str(&format!(" xmlns:{p}=\"{}\"", escape::escape_attr(uri))),
                None => out.push_str(&format!(" xmlns=\"{}\"", escape::escape_attr(uri))),
            }
        }
        for attr in &self.attributes {
            out.push_str(&format!(
                " {}=\"{}\"",
                attr.qualified_name(),
                escape::escape_attr(&attr.value)
            ));
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write(out, &scope),
                Node::Text(t) => out.push_str(&escape::escape_text(t)),
                Node::Comment(c) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&qname);
        out.push('>');
    }
}

/// Record a binding for `prefix` unless the scope already maps it to `uri`.
fn bind(scope: &mut Scope, decls: &mut Vec<(Option<String>, String)>, prefix: Option<String>, uri: &str) {
    let current = scope.get(&prefix).map(String::as_str).unwrap_or("");
    if current == uri {
        return;
    }
    decls.retain(|(p, _)| *p != prefix);
    decls.push((prefix.clone(), uri.to_owned()));
    scope.insert(prefix, uri.to_owned());
}

fn element_prefix(node: &roxmltree::Node<'_, '_>, uri: &str) -> Option<String> {
    if node
        .namespaces()
        .any(|n| n.name().is_none() && n.uri() == uri)
    {
        return None;
    }
    attribute_prefix(node, uri)
}

fn attribute_prefix(node: &roxmltree::Node<'_, '_>, uri: &str) -> Option<String> {
    if uri == ns::XML {
        return Some("xml".to_owned());
    }
    node.namespaces()
        .find(|n| n.name().is_some() && n.uri() == uri)
        .and_then(|n| n.name())
        .map(str::to_owned)
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.to_xml_string() == other.to_xml_string()
    }
}

impl Eq for Element {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize_namespaces() {
        let xml = r#"<a:root xmlns:a="urn:a"><a:child x="1">text</a:child><plain/></a:root>"#;
        let el = Element::parse(xml).unwrap();
        assert_eq!(el.prefix(), Some("a"));
        assert_eq!(el.namespace(), Some("urn:a"));
        assert_eq!(el.to_xml_string(), xml);
    }

    #[test]
    fn test_default_namespace_undeclared_for_plain_child() {
        let mut root = Element::new_ns("urn:d", None, "root");
        root.append_child(Element::new("plain"));
        assert_eq!(
            root.to_xml_string(),
            r#"<root xmlns="urn:d"><plain xmlns=""/></root>"#
        );
    }

    #[test]
    fn test_children_named_filters_by_namespace() {
        let xml = r#"<r xmlns:p="urn:p" xmlns:q="urn:q"><p:x/><q:x/><p:x/><p:y/></r>"#;
        let el = Element::parse(xml).unwrap();
        assert_eq!(el.children_named("urn:p", "x").count(), 2);
        assert_eq!(el.children_named("urn:q", "x").count(), 1);
        assert_eq!(el.child_elements().count(), 4);
    }

    #[test]
    fn test_append_child_returns_appended() {
        let mut root = Element::new("root");
        let child = root.append_child(Element::new("child"));
        child.set_attribute("Id", "c1");
        child.append_text("a<b");
        assert_eq!(root.to_xml_string(), r#"<root><child Id="c1">a&lt;b</child></root>"#);
    }

    #[test]
    fn test_attribute_or_default() {
        let el = Element::parse(r##"<e URI="#x"/>"##).unwrap();
        assert_eq!(el.attribute_or("URI", ""), "#x");
        assert_eq!(el.attribute_or("Type", "none"), "none");
        assert_eq!(el.attribute("Type"), None);
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut el = Element::new("e");
        el.set_attribute("Id", "one");
        el.set_attribute("Id", "two");
        assert_eq!(el.attributes().len(), 1);
        assert_eq!(el.attribute("Id"), Some("two"));
    }

    #[test]
    fn test_canonical_equality() {
        let a = Element::parse(r#"<x:e xmlns:x="urn:x" a="1"/>"#).unwrap();
        let b = Element::parse(r#"<x:e a="1" xmlns:x="urn:x"></x:e>"#).unwrap();
        let c = Element::parse(r#"<x:e xmlns:x="urn:x" a="2"/>"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_copied_subtree_keeps_inherited_namespace() {
        let doc = crate::parse_document(r#"<r xmlns:p="urn:p"><p:inner><p:leaf/></p:inner></r>"#)
            .unwrap();
        let inner = doc
            .root_element()
            .first_element_child()
            .unwrap();
        let copy = Element::from_node(inner);
        assert_eq!(
            copy.to_xml_string(),
            r#"<p:inner xmlns:p="urn:p"><p:leaf/></p:inner>"#
        );
    }

    #[test]
    fn test_nested_element_sees_inherited_bindings() {
        let el = Element::parse(r#"<r xmlns:p="urn:p"><c xmlns:q="urn:q"/></r>"#).unwrap();
        let child = el.child_elements().next().unwrap();
        let decls = child.namespace_declarations();
        assert!(decls.contains(&(Some("p".to_owned()), "urn:p".to_owned())));
        assert!(decls.contains(&(Some("q".to_owned()), "urn:q".to_owned())));
        assert_eq!(el.to_xml_string(), r#"<r xmlns:p="urn:p"><c xmlns:q="urn:q"/></r>"#);
    }
}
