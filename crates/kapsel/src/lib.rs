#![forbid(unsafe_code)]

//! XML Encryption envelopes and XML Signature reference digests.

pub use kapsel_c14n as c14n;
pub use kapsel_core as core;
pub use kapsel_crypto as crypto;
pub use kapsel_dsig as dsig;
pub use kapsel_enc as enc;
pub use kapsel_keys as keys;
pub use kapsel_transforms as transforms;
pub use kapsel_xml as xml;
