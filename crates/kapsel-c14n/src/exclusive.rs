#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Only "visibly utilized" namespace declarations are output. A namespace is
//! visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.

use crate::inclusive::collect_inscope_namespaces;
use crate::render::{self, Attr, NsDecl};
use kapsel_core::Result;
use kapsel_xml::{escape, NodeSet};
use roxmltree::{Node, NodeType};
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    let inclusive_prefixes = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let mut output = Vec::new();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns);
                }
            }
            NodeType::Element => self.process_element(node, output, rendered_ns),
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
        rendered_ns: &BTreeMap<String, String>,
    ) {
        if !self.is_visible(&node) {
            for child in node.children() {
                self.process_node(child, output, rendered_ns);
            }
            return;
        }

        let attrs = {
            let mut attrs: Vec<Attr> = node
                .attributes()
                .map(|a| Attr::from_roxml(&node, &a))
                .collect();
            attrs.sort();
            attrs
        };

        let mut utilized: BTreeSet<String> = BTreeSet::new();
        utilized.insert(render::element_prefix(&node));
        for attr in &attrs {
            if let Some((prefix, _)) = attr.qualified_name.split_once(':') {
                if prefix != "xml" {
                    utilized.insert(prefix.to_owned());
                }
            }
        }
        let inscope = collect_inscope_namespaces(&node);
        for prefix in &self.inclusive_prefixes {
            if inscope.contains_key(prefix) {
                utilized.insert(prefix.clone());
            }
        }

        let mut child_rendered = rendered_ns.clone();
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in utilized {
            let uri = inscope.get(&prefix).cloned().unwrap_or_default();
            let previous = rendered_ns.get(&prefix).map(String::as_str).unwrap_or("");
            if previous == uri {
                continue;
            }
            child_rendered.insert(prefix.clone(), uri.clone());
            ns_decls.push(NsDecl { prefix, uri });
        }
        ns_decls.sort();

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
            self.process_node(child, output, &child_rendered);
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
    }
}
