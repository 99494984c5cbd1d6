#![forbid(unsafe_code)]

//! RSA key pairs used for key transport.

use kapsel_core::{Error, Result};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

/// An RSA public key with its optional private half.
#[derive(Clone)]
pub struct AsymmetricKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
}

impl AsymmetricKey {
    pub fn from_private(private: RsaPrivateKey) -> Self {
        Self {
            public: private.to_public_key(),
            private: Some(private),
        }
    }

    pub fn from_public(public: RsaPublicKey) -> Self {
        Self {
            public,
            private: None,
        }
    }

    /// Generate a fresh key pair of `bits` modulus size.
    pub fn generate(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| Error::Key(format!("RSA key generation failed: {e}")))?;
        Ok(Self::from_private(private))
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private(&self) -> Option<&RsaPrivateKey> {
        self.private.as_ref()
    }

    /// The private key, or a key error naming `purpose`.
    pub fn require_private(&self, purpose: &str) -> Result<&RsaPrivateKey> {
        self.private
            .as_ref()
            .ok_or_else(|| Error::Key(format!("{purpose} requires an RSA private key")))
    }

    /// A copy holding only the public half.
    pub fn to_public(&self) -> Self {
        Self::from_public(self.public.clone())
    }

    pub fn size_bits(&self) -> usize {
        self.public.size() * 8
    }
}

impl std::fmt::Debug for AsymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.private.is_some() {
            write!(f, "RSA-{} private+public key", self.size_bits())
        } else {
            write!(f, "RSA-{} public key", self.size_bits())
        }
    }
}
