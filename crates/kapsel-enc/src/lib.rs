#![forbid(unsafe_code)]

//! XML Encryption envelopes.
//!
//! [`EncContext`] builds `EncryptedData` from a payload, switching to hybrid
//! encryption (session key wrapped into an `EncryptedKey`) when the chosen
//! algorithm is a key transport algorithm, and opens envelopes again. All
//! decryption failures past algorithm resolution look the same to the caller.

pub mod context;
pub mod decrypt;
pub mod encrypt;
pub mod model;

pub use context::EncContext;
pub use encrypt::{ElementContent, Encryptable};
pub use model::{
    CipherData, CipherReference, EncryptedData, EncryptedKey, EncryptedType, EncryptionMethod,
    KeyInfo, KeyInfoItem,
};
