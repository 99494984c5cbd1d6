#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use kapsel_c14n::{C14nMode, Canonicalizer};
use kapsel_core::{Error, Result};
use kapsel_xml::{DocumentContext, NodeSet};

/// Data flowing through the transform pipeline.
#[derive(Debug, Clone)]
pub enum TransformData {
    /// A subset of the source document.
    NodeSet(NodeSet),
    /// Raw bytes.
    Octets(Vec<u8>),
}

impl TransformData {
    /// Convert to octets, canonicalizing a node set with inclusive C14N 1.0.
    ///
    /// Comments are rendered only if they are members of the set, so an
    /// `#xpointer(...)` selection keeps them and `""`/`#id` do not.
    pub fn into_octets(self, ctx: &TransformContext<'_, '_, '_>) -> Result<Vec<u8>> {
        match self {
            TransformData::Octets(data) => Ok(data),
            TransformData::NodeSet(set) => ctx.canonicalizer.canonicalize(
                ctx.document.document(),
                Some(&set),
                C14nMode::InclusiveWithComments,
                &[],
            ),
        }
    }

    pub fn require_node_set(self, transform: &str) -> Result<NodeSet> {
        match self {
            TransformData::NodeSet(set) => Ok(set),
            TransformData::Octets(_) => Err(Error::Transform(format!(
                "{transform} requires a node set as input"
            ))),
        }
    }
}

/// What a transform may consult besides its input.
pub struct TransformContext<'c, 'a, 'input> {
    pub document: &'c DocumentContext<'a, 'input>,
    pub canonicalizer: &'c dyn Canonicalizer,
}

/// A single step in a reference's transform chain.
pub trait Transform: Send + Sync {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    fn execute(
        &self,
        input: TransformData,
        ctx: &TransformContext<'_, '_, '_>,
    ) -> Result<TransformData>;
}

/// An ordered chain of transforms.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Run every transform in order.
    pub fn execute(
        &self,
        input: TransformData,
        ctx: &TransformContext<'_, '_, '_>,
    ) -> Result<TransformData> {
        let mut data = input;
        for transform in &self.transforms {
            tracing::trace!(transform = transform.uri(), "applying transform");
            data = transform.execute(data, ctx)?;
        }
        Ok(data)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute(
        &self,
        input: TransformData,
        ctx: &TransformContext<'_, '_, '_>,
    ) -> Result<TransformData> {
        let bytes = match input {
            TransformData::NodeSet(set) => ctx.canonicalizer.canonicalize(
                ctx.document.document(),
                Some(&set),
                self.mode,
                &self.inclusive_prefixes,
            )?,
            TransformData::Octets(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                let doc = kapsel_xml::parse_document(text)?;
                ctx.canonicalizer
                    .canonicalize(&doc, None, self.mode, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Octets(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapsel_c14n::DefaultCanonicalizer;

    #[test]
    fn test_c14n_on_node_set_and_octets() {
        let doc = kapsel_xml::parse_document(r#"<a b="1"   c="2"><!--x--></a>"#).unwrap();
        let document = DocumentContext::new(&doc, &[]);
        let ctx = TransformContext {
            document: &document,
            canonicalizer: &DefaultCanonicalizer,
        };
        let t = C14nTransform::new(C14nMode::Inclusive, vec![]);

        let from_set = t
            .execute(TransformData::NodeSet(NodeSet::all(&doc, true)), &ctx)
            .unwrap()
            .into_octets(&ctx)
            .unwrap();
        assert_eq!(from_set, br#"<a b="1" c="2"></a>"#);

        let from_octets = t
            .execute(TransformData::Octets(br#"<a c="2" b="1"/>"#.to_vec()), &ctx)
            .unwrap()
            .into_octets(&ctx)
            .unwrap();
        assert_eq!(from_octets, br#"<a b="1" c="2"></a>"#);
    }

    #[test]
    fn test_empty_pipeline_canonicalizes_node_set() {
        let doc = kapsel_xml::parse_document("<a><b/></a>").unwrap();
        let document = DocumentContext::new(&doc, &[]);
        let ctx = TransformContext {
            document: &document,
            canonicalizer: &DefaultCanonicalizer,
        };
        let out = TransformPipeline::new()
            .execute(TransformData::NodeSet(NodeSet::all(&doc, false)), &ctx)
            .unwrap()
            .into_octets(&ctx)
            .unwrap();
        assert_eq!(out, b"<a><b></b></a>");
    }
}
