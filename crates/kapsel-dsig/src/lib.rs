#![forbid(unsafe_code)]

//! XML Signature references for the kapsel XML Security library.
//!
//! A [`Reference`] binds a digest to a content selection and a transform
//! chain. [`DsigContext`] dereferences, transforms, digests and compares;
//! checking the signature value over `SignedInfo` is left to the caller.

pub mod context;
pub mod model;
pub mod sign;
pub mod verify;

pub use context::DsigContext;
pub use model::{DigestMethod, DigestValue, InclusiveNamespaces, Reference, Transform, Transforms, XPath};
pub use verify::ReferenceOutcome;
