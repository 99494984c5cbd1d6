#![forbid(unsafe_code)]

//! The key a caller hands to the envelope engine.

use crate::asymmetric::AsymmetricKey;
use crate::symmetric::SymmetricKey;
use kapsel_core::{Error, Result};

#[derive(Debug, Clone)]
pub enum Key {
    Symmetric(SymmetricKey),
    Asymmetric(AsymmetricKey),
}

impl Key {
    pub fn as_symmetric(&self) -> Result<&SymmetricKey> {
        match self {
            Self::Symmetric(k) => Ok(k),
            Self::Asymmetric(_) => Err(Error::Key("expected a symmetric key".into())),
        }
    }

    pub fn as_asymmetric(&self) -> Result<&AsymmetricKey> {
        match self {
            Self::Asymmetric(k) => Ok(k),
            Self::Symmetric(_) => Err(Error::Key("expected an asymmetric key".into())),
        }
    }
}

impl From<SymmetricKey> for Key {
    fn from(k: SymmetricKey) -> Self {
        Self::Symmetric(k)
    }
}

impl From<AsymmetricKey> for Key {
    fn from(k: AsymmetricKey) -> Self {
        Self::Asymmetric(k)
    }
}
