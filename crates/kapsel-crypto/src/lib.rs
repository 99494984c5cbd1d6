#![forbid(unsafe_code)]

//! Algorithm resolution and cryptographic primitives for kapsel.
//!
//! - [`CryptoProvider`]: the backend seam (digest, bulk encrypt/decrypt,
//!   key wrap/unwrap), with [`RustCryptoBackend`] as the default.
//! - [`AlgorithmRegistry`]: URI → tagged descriptor table; the family of an
//!   identifier is fixed when it is registered.
//! - [`AlgorithmFactory`]: one factory shape for digests, key transport and
//!   block ciphers, with an immutable per-instance blacklist.

pub mod cipher;
pub mod compare;
pub mod digest;
pub mod factory;
pub mod instance;
pub mod keytransport;
pub mod provider;
pub mod registry;

pub use compare::constant_time_eq;
pub use factory::{
    AlgorithmFactory, AlgorithmKind, BlockCipherFactory, BlockCipherKind, DigestFactory,
    DigestKind, KeyTransportFactory, KeyTransportKind,
};
pub use instance::{BlockCipher, Digester, EncryptionAlgorithm, KeyTransport};
pub use provider::{CryptoProvider, RustCryptoBackend};
pub use registry::{AlgorithmDescriptor, AlgorithmRegistry};
