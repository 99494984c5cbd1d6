#![forbid(unsafe_code)]

//! Base64 decode transform.

use crate::pipeline::{Transform, TransformContext, TransformData};
use base64::Engine;
use kapsel_core::{algorithm, Error, Result};
use roxmltree::NodeType;

/// Decodes base64 content. A node set is first reduced to the text of its
/// text nodes, in document order.
pub struct Base64DecodeTransform;

impl Transform for Base64DecodeTransform {
    fn uri(&self) -> &str {
        algorithm::BASE64
    }

    fn execute(
        &self,
        input: TransformData,
        ctx: &TransformContext<'_, '_, '_>,
    ) -> Result<TransformData> {
        let text = match input {
            TransformData::Octets(data) => String::from_utf8(data)
                .map_err(|e| Error::Transform(format!("base64 input not UTF-8: {e}")))?,
            TransformData::NodeSet(set) => ctx
                .document
                .document()
                .descendants()
                .filter(|n| n.node_type() == NodeType::Text && set.contains(n))
                .filter_map(|n| n.text())
                .collect(),
        };

        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| Error::Base64(format!("decode error: {e}")))?;
        Ok(TransformData::Octets(decoded))
    }
}
