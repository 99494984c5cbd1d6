#![forbid(unsafe_code)]

//! Symmetric key material.

use crate::random::{OsRandom, SecureRandom};
use kapsel_core::Result;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw symmetric key bytes. Immutable once built; wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    material: Vec<u8>,
}

impl SymmetricKey {
    pub fn new(material: &[u8]) -> Self {
        Self {
            material: material.to_vec(),
        }
    }

    /// Generate `len` random bytes from the OS source.
    ///
    /// With `parity` set, every byte is rewritten to odd parity (DES keys).
    pub fn generate(len: usize, parity: bool) -> Result<Self> {
        Self::generate_with(&OsRandom, len, parity)
    }

    /// Like [`SymmetricKey::generate`], drawing from `rng`.
    pub fn generate_with(rng: &dyn SecureRandom, len: usize, parity: bool) -> Result<Self> {
        let mut material = rng.random_bytes(len)?;
        if parity {
            for b in material.iter_mut() {
                *b = odd_parity(*b);
            }
        }
        tracing::debug!(len, parity, "generated symmetric key");
        Ok(Self { material })
    }

    /// Exact number of key bytes.
    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.material
    }
}

/// Rewrite the low bit of `b` so the byte has an odd number of set bits.
/// The upper seven bits are kept; `0x00` becomes `0x01`.
pub fn odd_parity(b: u8) -> u8 {
    let high = b & 0xfe;
    high | ((high.count_ones() as u8 + 1) & 1)
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey ({} bytes)", self.material.len())
    }
}
