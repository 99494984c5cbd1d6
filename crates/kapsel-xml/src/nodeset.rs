#![forbid(unsafe_code)]

//! NodeSet type for canonicalization and signature transforms.
//!
//! A `NodeSet` is a set of roxmltree nodes identified by `NodeId`. Attributes
//! and namespace declarations are not separate members: they are visible
//! whenever their owning element is.

use roxmltree::{Document, Node, NodeId, NodeType};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document, optionally leaving out comments.
    pub fn all(doc: &Document<'_>, with_comments: bool) -> Self {
        Self::tree(doc.root(), with_comments)
    }

    /// `node` and all its descendants, optionally leaving out comments.
    pub fn tree(node: Node<'_, '_>, with_comments: bool) -> Self {
        let nodes = node
            .descendants()
            .filter(|n| with_comments || n.node_type() != NodeType::Comment)
            .map(|n| n.id())
            .collect();
        Self { nodes }
    }

    pub fn contains(&self, node: &Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn insert(&mut self, node: &Node<'_, '_>) {
        self.nodes.insert(node.id());
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove `node` and everything beneath it.
    pub fn remove_subtree(&mut self, node: Node<'_, '_>) {
        for n in node.descendants() {
            self.nodes.remove(&n.id());
        }
    }

    /// Keep only members of `doc` for which `keep` returns true.
    pub fn retain<F>(&mut self, doc: &Document<'_>, mut keep: F)
    where
        F: FnMut(Node<'_, '_>) -> bool,
    {
        let mut kept = HashSet::new();
        for node in doc.root().descendants() {
            if self.nodes.contains(&node.id()) && keep(node) {
                kept.insert(node.id());
            }
        }
        self.nodes = kept;
    }

    pub fn intersection(&self, other: &NodeSet) -> NodeSet {
        Self {
            nodes: self.nodes.intersection(&other.nodes).copied().collect(),
        }
    }
}

/// Whether `ancestor` is `node` or one of its ancestors.
pub fn is_ancestor_or_self(ancestor: Node<'_, '_>, node: Node<'_, '_>) -> bool {
    node.ancestors().any(|n| n.id() == ancestor.id())
}
