#![forbid(unsafe_code)]

//! Transform construction by algorithm URI.

use crate::base64_transform::Base64DecodeTransform;
use crate::enveloped::EnvelopedSignatureTransform;
use crate::pipeline::{C14nTransform, Transform};
use crate::xpath::XPathFilterTransform;
use kapsel_c14n::C14nMode;
use kapsel_core::{algorithm, Error, Result};
use std::collections::HashMap;

/// Parameters carried by a `ds:Transform` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransformParams {
    #[default]
    None,
    XPath {
        expression: String,
        /// (prefix, URI) pairs in scope on the XPath element.
        namespaces: Vec<(String, String)>,
    },
    /// The `PrefixList` of an exclusive C14N `InclusiveNamespaces` element.
    InclusiveNamespaces(Vec<String>),
}

pub type Constructor = fn(&str, &TransformParams) -> Result<Box<dyn Transform>>;

/// Maps transform URIs to constructors.
#[derive(Clone)]
pub struct TransformRegistry {
    constructors: HashMap<String, Constructor>,
}

fn c14n(uri: &str, params: &TransformParams) -> Result<Box<dyn Transform>> {
    let mode = C14nMode::from_uri(uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(uri.to_owned()))?;
    let prefixes = match params {
        TransformParams::InclusiveNamespaces(list) if mode.is_exclusive() => list.clone(),
        TransformParams::InclusiveNamespaces(_) => {
            return Err(Error::Transform(
                "InclusiveNamespaces requires exclusive canonicalization".into(),
            ))
        }
        _ => Vec::new(),
    };
    Ok(Box::new(C14nTransform::new(mode, prefixes)))
}

fn enveloped(_: &str, _: &TransformParams) -> Result<Box<dyn Transform>> {
    Ok(Box::new(EnvelopedSignatureTransform))
}

fn base64(_: &str, _: &TransformParams) -> Result<Box<dyn Transform>> {
    Ok(Box::new(Base64DecodeTransform))
}

fn xpath(_: &str, params: &TransformParams) -> Result<Box<dyn Transform>> {
    match params {
        TransformParams::XPath {
            expression,
            namespaces,
        } => Ok(Box::new(XPathFilterTransform::new(expression, namespaces)?)),
        _ => Err(Error::Transform("XPath transform without expression".into())),
    }
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// The C14N variants, enveloped-signature, XPath filter and base64.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: [(&str, Constructor); 9] = [
            (algorithm::C14N, c14n),
            (algorithm::C14N_WITH_COMMENTS, c14n),
            (algorithm::C14N11, c14n),
            (algorithm::C14N11_WITH_COMMENTS, c14n),
            (algorithm::EXC_C14N, c14n),
            (algorithm::EXC_C14N_WITH_COMMENTS, c14n),
            (algorithm::ENVELOPED_SIGNATURE, enveloped),
            (algorithm::XPATH, xpath),
            (algorithm::BASE64, base64),
        ];
        for (uri, constructor) in defaults {
            registry.constructors.insert(uri.to_owned(), constructor);
        }
        registry
    }

    pub fn register(&mut self, uri: &str, constructor: Constructor) -> Result<()> {
        if self.constructors.contains_key(uri) {
            return Err(Error::DuplicateAlgorithm(uri.to_owned()));
        }
        self.constructors.insert(uri.to_owned(), constructor);
        Ok(())
    }

    /// Registered transform URIs, sorted.
    pub fn uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        uris.sort_unstable();
        uris
    }

    pub fn supports(&self, uri: &str) -> bool {
        self.constructors.contains_key(uri)
    }

    /// Build the transform for `uri` with `params`.
    pub fn create(&self, uri: &str, params: &TransformParams) -> Result<Box<dyn Transform>> {
        let constructor = self
            .constructors
            .get(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))?;
        constructor(uri, params)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry").field("uris", &self.uris()).finish()
    }
}
