#![forbid(unsafe_code)]

//! Key material for the kapsel XML Security library.
//!
//! Symmetric keys (including per-envelope session keys), RSA key pairs used
//! for key transport, the secure random source, and loaders.

pub mod asymmetric;
pub mod key;
pub mod loader;
pub mod random;
pub mod symmetric;

pub use asymmetric::AsymmetricKey;
pub use key::Key;
pub use random::{OsRandom, SecureRandom};
pub use symmetric::SymmetricKey;
