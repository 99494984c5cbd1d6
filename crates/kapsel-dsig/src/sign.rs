#![forbid(unsafe_code)]

//! Reference creation on the signing side.

use crate::context::DsigContext;
use crate::model::{DigestMethod, DigestValue, Reference, Transforms};
use kapsel_core::Result;
use kapsel_xml::DocumentContext;

impl DsigContext {
    /// Build a `Reference` to `uri` whose `DigestValue` is computed now.
    pub fn create_reference(
        &self,
        uri: &str,
        transforms: Option<Transforms>,
        digest_method: &str,
        document: &DocumentContext<'_, '_>,
    ) -> Result<Reference> {
        let mut reference = Reference {
            id: None,
            type_: None,
            uri: Some(uri.to_owned()),
            transforms,
            digest_method: DigestMethod::new(digest_method),
            digest_value: DigestValue(Vec::new()),
        };
        reference.digest_value = DigestValue(self.compute_digest(&reference, document)?);
        Ok(reference)
    }
}
