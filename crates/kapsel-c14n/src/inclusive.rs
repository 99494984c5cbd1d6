#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0.
//!
//! - Namespace declarations sorted by prefix (default first)
//! - Attributes sorted by (namespace URI, local name)
//! - Text and attribute values escaped per C14N rules
//! - Comments kept or stripped depending on the mode
//! - Document subsets through a [`NodeSet`]

use crate::render::{self, Attr, NsDecl};
use kapsel_core::{ns, Result};
use kapsel_xml::{escape, NodeSet};
use roxmltree::{Node, NodeType};
use std::collections::BTreeMap;

/// Canonicalize a document (or a node-set subset) using inclusive C14N.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, inherited_ns);
                }
            }
            NodeType::Element => self.process_element(node, output, inherited_ns),
            NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    render::render_outside_markup(&node, output);
                }
            }
            NodeType::PI => {
                if self.is_visible(&node) {
                    render::render_outside_markup(&node, output);
                }
            }
        }
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) {
        if !self.is_visible(&node) {
            // Invisible elements contribute only their visible descendants,
            // which still compare against the nearest rendered ancestor.
            for child in node.children() {
                self.process_node(child, output, inherited_ns);
            }
            return;
        }

        let current_ns = collect_inscope_namespaces(&node);

        let mut ns_decls: Vec<NsDecl> = current_ns
            .iter()
            .filter(|(prefix, uri)| inherited_ns.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            })
            .collect();

        // A default namespace rendered above but not in scope here is undeclared.
        if inherited_ns.get("").is_some_and(|d| !d.is_empty()) && !current_ns.contains_key("") {
            ns_decls.push(NsDecl {
                prefix: String::new(),
                uri: String::new(),
            });
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = node
            .attributes()
            .map(|a| Attr::from_roxml(&node, &a))
            .collect();

        // xml:* attributes are inherited when the parent element is not rendered.
        if self.node_set.is_some() {
            let parent_not_visible = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_not_visible {
                let extra = inherited_xml_attrs(&node, &attrs);
                attrs.extend(extra);
            }
        }
        attrs.sort();

        let elem_name = render::qualified_element_name(&node);
        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for decl in &ns_decls {
            output.extend_from_slice(decl.render().as_bytes());
        }
        for attr in &attrs {
            output.extend_from_slice(attr.render().as_bytes());
        }
        output.push(b'>');

        for child in node.children() {
            self.process_node(child, output, &current_ns);
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
    }
}

/// Collect xml:* attributes from all ancestors, nearest first, skipping
/// those already present on the element.
fn inherited_xml_attrs(node: &Node<'_, '_>, existing: &[Attr]) -> Vec<Attr> {
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();
    for ancestor in node.ancestors().skip(1).filter(|n| n.is_element()) {
        for attr in ancestor.attributes() {
            if attr.namespace() == Some(ns::XML) {
                inherited
                    .entry(attr.name().to_owned())
                    .or_insert_with(|| attr.value().to_owned());
            }
        }
    }

    inherited
        .into_iter()
        .filter(|(name, _)| {
            !existing
                .iter()
                .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
        })
        .map(|(name, value)| Attr {
            ns_uri: ns::XML.to_owned(),
            qualified_name: format!("xml:{name}"),
            local_name: name,
            value,
        })
        .collect()
}

/// All namespaces in scope at `node`, keyed by prefix ("" for default).
/// The `xml` prefix is never included.
pub(crate) fn collect_inscope_namespaces(node: &Node<'_, '_>) -> BTreeMap<String, String> {
    node.namespaces()
        .filter(|n| n.name() != Some("xml") && !n.uri().is_empty())
        .map(|n| (n.name().unwrap_or("").to_owned(), n.uri().to_owned()))
        .collect()
}
