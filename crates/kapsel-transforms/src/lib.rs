#![forbid(unsafe_code)]

//! Reference transforms for the kapsel XML Security library.
//!
//! A reference's content flows through a [`TransformPipeline`] as either a
//! node set over the source document or an octet stream. Transforms are
//! created by URI through a [`TransformRegistry`].

pub mod base64_transform;
pub mod enveloped;
pub mod pipeline;
pub mod registry;
pub mod uri;
pub mod xpath;

pub use pipeline::{C14nTransform, Transform, TransformContext, TransformData, TransformPipeline};
pub use registry::{TransformParams, TransformRegistry};
pub use uri::ReferenceUri;
pub use xpath::XPathFilterTransform;
