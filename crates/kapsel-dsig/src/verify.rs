#![forbid(unsafe_code)]

//! Reference digest computation and validation.
//!
//! 1. Dereference `URI` against the document (`""`, `#id`, `#xpointer(...)`)
//! 2. Run the `Transforms` chain in order
//! 3. Canonicalize a node set left at the end with inclusive C14N 1.0
//! 4. Digest with `DigestMethod` and compare in constant time

use crate::context::DsigContext;
use crate::model::Reference;
use kapsel_core::{ns, Result};
use kapsel_crypto::constant_time_eq;
use kapsel_transforms::{ReferenceUri, TransformContext, TransformPipeline};
use kapsel_xml::{DocumentContext, Element, XmlElement};

/// Outcome of checking one `ds:Reference` found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOutcome {
    pub uri: String,
    pub valid: bool,
}

impl DsigContext {
    /// The octets a reference digests: dereferenced content after transforms.
    pub fn pre_digest(&self, reference: &Reference, document: &DocumentContext<'_, '_>) -> Result<Vec<u8>> {
        let uri = ReferenceUri::parse(reference.uri())?;
        let mut pipeline = TransformPipeline::new();
        for transform in reference.transform_chain() {
            pipeline.push(self.transforms.create(&transform.algorithm, &transform.params())?);
        }

        let ctx = TransformContext {
            document,
            canonicalizer: self.canonicalizer.as_ref(),
        };
        let data = pipeline.execute(uri.dereference(document)?, &ctx)?;
        data.into_octets(&ctx)
    }

    /// Recompute the digest of `reference` over `document`.
    pub fn compute_digest(&self, reference: &Reference, document: &DocumentContext<'_, '_>) -> Result<Vec<u8>> {
        let digester = self.digests.get_digest(&reference.digest_method.algorithm)?;
        let octets = self.pre_digest(reference, document)?;
        tracing::trace!(uri = reference.uri(), len = octets.len(), "pre-digest octets");
        let digest = digester.digest(&octets)?;
        tracing::debug!(
            uri = reference.uri(),
            algorithm = digester.algorithm_id(),
            "computed reference digest"
        );
        Ok(digest)
    }

    /// Whether the stored `DigestValue` matches the recomputed digest.
    pub fn validate(&self, reference: &Reference, document: &DocumentContext<'_, '_>) -> Result<bool> {
        let computed = self.compute_digest(reference, document)?;
        Ok(constant_time_eq(&computed, &reference.digest_value.0))
    }

    /// Whether every reference validates. An empty list does not.
    pub fn validate_all(&self, references: &[Reference], document: &DocumentContext<'_, '_>) -> Result<bool> {
        if references.is_empty() {
            return Ok(false);
        }
        for reference in references {
            if !self.validate(reference, document)? {
                tracing::debug!(uri = reference.uri(), "reference digest mismatch");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check every `ds:Reference` in `xml`.
    ///
    /// Each reference sees its own enclosing `ds:Signature` as the one an
    /// enveloped-signature transform removes.
    pub fn verify_references(&self, xml: &str) -> Result<Vec<ReferenceOutcome>> {
        let doc = kapsel_xml::parse_document(xml)?;
        let mut outcomes = Vec::new();
        for node in doc
            .descendants()
            .filter(|n| n.has_tag_name((ns::DSIG, ns::node::REFERENCE)))
        {
            let reference = Reference::from_xml(&Element::from_node(node))?;
            let document = match node
                .ancestors()
                .find(|a| a.has_tag_name((ns::DSIG, ns::node::SIGNATURE)))
            {
                Some(signature) => self.document_for(&doc, signature),
                None => DocumentContext::new(&doc, &self.id_attrs),
            };
            outcomes.push(ReferenceOutcome {
                uri: reference.uri().to_owned(),
                valid: self.validate(&reference, &document)?,
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DigestMethod, DigestValue, Transform, Transforms};
    use kapsel_core::{algorithm, Error};

    fn reference(uri: &str, transforms: Vec<Transform>, digest: &str) -> Reference {
        Reference {
            id: None,
            type_: None,
            uri: Some(uri.to_owned()),
            transforms: (!transforms.is_empty()).then(|| Transforms(transforms)),
            digest_method: DigestMethod::new(digest),
            digest_value: DigestValue(Vec::new()),
        }
    }

    #[test]
    fn test_pre_digest_by_id() {
        let doc = kapsel_xml::parse_document(r#"<r><!--c--><a Id="x">t<!--d--></a></r>"#).unwrap();
        let ctx = DsigContext::new();
        let document = ctx.document(&doc);
        let octets = ctx
            .pre_digest(&reference("#x", vec![], algorithm::SHA256), &document)
            .unwrap();
        assert_eq!(octets, br#"<a Id="x">t</a>"#);

        let with_comments = ctx
            .pre_digest(&reference("#xpointer(id('x'))", vec![], algorithm::SHA256), &document)
            .unwrap();
        assert_eq!(with_comments, br#"<a Id="x">t<!--d--></a>"#);
    }

    #[test]
    fn test_transforms_run_in_order() {
        let doc = kapsel_xml::parse_document(r#"<r><b Id="b">aGVsbG8=</b></r>"#).unwrap();
        let ctx = DsigContext::new();
        let document = ctx.document(&doc);
        let octets = ctx
            .pre_digest(
                &reference("#b", vec![Transform::new(algorithm::BASE64)], algorithm::SHA256),
                &document,
            )
            .unwrap();
        assert_eq!(octets, b"hello");
    }

    #[test]
    fn test_unknown_id_and_external_uri() {
        let doc = kapsel_xml::parse_document("<r/>").unwrap();
        let ctx = DsigContext::new();
        let document = ctx.document(&doc);
        for uri in ["#missing", "http://example.com/"] {
            assert!(matches!(
                ctx.compute_digest(&reference(uri, vec![], algorithm::SHA256), &document),
                Err(Error::InvalidUri(_))
            ));
        }
    }

    #[test]
    fn test_md5_refused_unless_allowed() {
        let doc = kapsel_xml::parse_document("<r/>").unwrap();
        let ctx = DsigContext::new();
        let document = ctx.document(&doc);
        let md5 = reference("", vec![], algorithm::MD5);
        assert!(matches!(
            ctx.compute_digest(&md5, &document),
            Err(Error::BlacklistedAlgorithm(_))
        ));
        let lenient = DsigContext::new().with_blacklist(vec![]);
        assert_eq!(lenient.compute_digest(&md5, &document).unwrap().len(), 16);
    }

    #[test]
    fn test_validate_all_requires_every_reference() {
        let doc = kapsel_xml::parse_document(r#"<r><a Id="a"/><b Id="b"/></r>"#).unwrap();
        let ctx = DsigContext::new();
        let document = ctx.document(&doc);
        let good_a = ctx.create_reference("#a", None, algorithm::SHA256, &document).unwrap();
        let good_b = ctx.create_reference("#b", None, algorithm::SHA1, &document).unwrap();
        let mut bad_b = good_b.clone();
        bad_b.digest_value.0[0] ^= 0x80;

        assert!(ctx.validate_all(&[good_a.clone(), good_b], &document).unwrap());
        assert!(!ctx.validate_all(&[good_a, bad_b], &document).unwrap());
        assert!(!ctx.validate_all(&[], &document).unwrap());
    }

    #[test]
    fn test_enveloped_transform_removes_chosen_signature() {
        let doc = kapsel_xml::parse_document(
            r#"<r xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><a/><ds:Signature Id="s1"/><ds:Signature Id="s2"/></r>"#,
        )
        .unwrap();
        let ctx = DsigContext::new();
        let enveloped = reference("", vec![Transform::new(algorithm::ENVELOPED_SIGNATURE)], algorithm::SHA256);

        let first = String::from_utf8(ctx.pre_digest(&enveloped, &ctx.document(&doc)).unwrap()).unwrap();
        assert!(!first.contains(r#"Id="s1""#));
        assert!(first.contains(r#"Id="s2""#));

        let second_node = doc
            .descendants()
            .find(|n| n.attribute("Id") == Some("s2"))
            .unwrap();
        let second = String::from_utf8(
            ctx.pre_digest(&enveloped, &ctx.document_for(&doc, second_node)).unwrap(),
        )
        .unwrap();
        assert!(second.contains(r#"Id="s1""#));
        assert!(!second.contains(r#"Id="s2""#));
    }
}
