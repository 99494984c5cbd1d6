#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the signature element that contains the reference, together with
//! its descendants, from the node set.

use crate::pipeline::{Transform, TransformContext, TransformData};
use kapsel_core::{algorithm, Error, Result};

pub struct EnvelopedSignatureTransform;

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute(
        &self,
        input: TransformData,
        ctx: &TransformContext<'_, '_, '_>,
    ) -> Result<TransformData> {
        let mut set = input.require_node_set(self.uri())?;
        let signature = ctx.document.signature().ok_or_else(|| {
            Error::Transform("enveloped-signature transform outside a signature".into())
        })?;
        set.remove_subtree(signature);
        Ok(TransformData::NodeSet(set))
    }
}
