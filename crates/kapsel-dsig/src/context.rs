#![forbid(unsafe_code)]

//! DSig context: digest policy, canonicalizer, transforms and ID attributes.

use kapsel_c14n::{Canonicalizer, DefaultCanonicalizer};
use kapsel_core::ns;
use kapsel_crypto::DigestFactory;
use kapsel_transforms::TransformRegistry;
use kapsel_xml::DocumentContext;
use std::sync::Arc;

/// Configuration for computing and checking reference digests.
#[derive(Clone)]
pub struct DsigContext {
    pub digests: DigestFactory,
    pub canonicalizer: Arc<dyn Canonicalizer>,
    pub transforms: TransformRegistry,
    /// ID attribute names registered on top of `Id`, `ID` and `id`.
    pub id_attrs: Vec<String>,
}

impl DsigContext {
    pub fn new() -> Self {
        Self {
            digests: DigestFactory::new(None),
            canonicalizer: Arc::new(DefaultCanonicalizer),
            transforms: TransformRegistry::with_defaults(),
            id_attrs: Vec::new(),
        }
    }

    /// Replace the default digest blacklist.
    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.digests = DigestFactory::new(Some(blacklist));
        self
    }

    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    /// A document context using this context's ID attributes, with the
    /// first `ds:Signature` in document order marked for enveloped-signature
    /// transforms.
    ///
    /// Only right for documents holding a single signature. For a Reference
    /// inside any other signature use [`DsigContext::document_for`].
    pub fn document<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
    ) -> DocumentContext<'a, 'input> {
        DocumentContext::new(doc, &self.id_attrs).with_signature_element(ns::DSIG, ns::node::SIGNATURE)
    }

    /// A document context with `signature` as the enveloping signature.
    pub fn document_for<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
        signature: roxmltree::Node<'_, '_>,
    ) -> DocumentContext<'a, 'input> {
        DocumentContext::new(doc, &self.id_attrs).with_signature(signature)
    }
}

impl Default for DsigContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DsigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsigContext")
            .field("digests", &self.digests)
            .field("transforms", &self.transforms)
            .field("id_attrs", &self.id_attrs)
            .finish_non_exhaustive()
    }
}
