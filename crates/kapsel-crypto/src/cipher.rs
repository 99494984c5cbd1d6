#![forbid(unsafe_code)]

//! Block cipher implementations (AES-CBC, AES-GCM, 3DES-CBC).
//!
//! Output follows the XML Encryption layout: the IV (CBC) or nonce (GCM) is
//! generated per call and prepended to the ciphertext; GCM appends its tag.

use kapsel_core::{algorithm, Error, Result};
use rand::RngCore;

/// A bulk cipher, keyed per call.
pub trait CipherAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;
    fn key_size(&self) -> usize;
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>>;
}

/// Block cipher URIs this backend implements.
pub const SUPPORTED: &[&str] = &[
    algorithm::AES128_CBC,
    algorithm::AES192_CBC,
    algorithm::AES256_CBC,
    algorithm::AES128_GCM,
    algorithm::AES192_GCM,
    algorithm::AES256_GCM,
    algorithm::TRIPLEDES_CBC,
];

/// Create a cipher from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn CipherAlgorithm>> {
    let cipher: Box<dyn CipherAlgorithm> = match uri {
        algorithm::AES128_CBC => Box::new(Cbc { uri: algorithm::AES128_CBC, kind: CbcKind::Aes128 }),
        algorithm::AES192_CBC => Box::new(Cbc { uri: algorithm::AES192_CBC, kind: CbcKind::Aes192 }),
        algorithm::AES256_CBC => Box::new(Cbc { uri: algorithm::AES256_CBC, kind: CbcKind::Aes256 }),
        algorithm::TRIPLEDES_CBC => Box::new(Cbc { uri: algorithm::TRIPLEDES_CBC, kind: CbcKind::TripleDes }),
        algorithm::AES128_GCM => Box::new(Gcm { uri: algorithm::AES128_GCM, key_size: 16 }),
        algorithm::AES192_GCM => Box::new(Gcm { uri: algorithm::AES192_GCM, key_size: 24 }),
        algorithm::AES256_GCM => Box::new(Gcm { uri: algorithm::AES256_GCM, key_size: 32 }),
        _ => return Err(Error::UnsupportedAlgorithm(format!("cipher: {uri}"))),
    };
    Ok(cipher)
}

fn check_key(expected: usize, key: &[u8]) -> Result<()> {
    if key.len() != expected {
        return Err(Error::Crypto(format!(
            "expected {expected} byte key, got {}",
            key.len()
        )));
    }
    Ok(())
}

// ── CBC with XML Encryption padding ──────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum CbcKind {
    Aes128,
    Aes192,
    Aes256,
    TripleDes,
}

impl CbcKind {
    fn key_size(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 | Self::TripleDes => 24,
            Self::Aes256 => 32,
        }
    }

    fn block_size(self) -> usize {
        match self {
            Self::TripleDes => 8,
            _ => 16,
        }
    }
}

struct Cbc {
    uri: &'static str,
    kind: CbcKind,
}

macro_rules! cbc_apply {
    ($kind:expr, $mode:ident, $op:ident, $key:expr, $iv:expr, $($args:expr),+) => {{
        match $kind {
            CbcKind::Aes128 => cbc::$mode::<aes::Aes128>::new_from_slices($key, $iv)
                .map_err(|e| Error::Crypto(format!("CBC init: {e}")))?
                .$op::<cbc::cipher::block_padding::NoPadding>($($args),+)
                .map(|_| ()),
            CbcKind::Aes192 => cbc::$mode::<aes::Aes192>::new_from_slices($key, $iv)
                .map_err(|e| Error::Crypto(format!("CBC init: {e}")))?
                .$op::<cbc::cipher::block_padding::NoPadding>($($args),+)
                .map(|_| ()),
            CbcKind::Aes256 => cbc::$mode::<aes::Aes256>::new_from_slices($key, $iv)
                .map_err(|e| Error::Crypto(format!("CBC init: {e}")))?
                .$op::<cbc::cipher::block_padding::NoPadding>($($args),+)
                .map(|_| ()),
            CbcKind::TripleDes => cbc::$mode::<des::TdesEde3>::new_from_slices($key, $iv)
                .map_err(|e| Error::Crypto(format!("CBC init: {e}")))?
                .$op::<cbc::cipher::block_padding::NoPadding>($($args),+)
                .map(|_| ()),
        }
    }};
}

impl CipherAlgorithm for Cbc {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn key_size(&self) -> usize {
        self.kind.key_size()
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit};

        check_key(self.kind.key_size(), key)?;
        let block = self.kind.block_size();
        let mut iv = vec![0u8; block];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buf = pad(plaintext, block);
        let len = buf.len();
        cbc_apply!(self.kind, Encryptor, encrypt_padded_mut, key, &iv, &mut buf, len)
            .map_err(|e| Error::Crypto(format!("CBC encrypt: {e}")))?;

        iv.extend_from_slice(&buf);
        Ok(iv)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit};

        check_key(self.kind.key_size(), key)?;
        let block = self.kind.block_size();
        if data.len() < 2 * block || data.len() % block != 0 {
            return Err(Error::Crypto("CBC data has invalid length".into()));
        }

        let (iv, ciphertext) = data.split_at(block);
        let mut buf = ciphertext.to_vec();
        cbc_apply!(self.kind, Decryptor, decrypt_padded_mut, key, iv, &mut buf)
            .map_err(|e| Error::Crypto(format!("CBC decrypt: {e}")))?;

        unpad(&buf, block)
    }
}

/// Pad to a whole number of blocks; the last byte holds the pad length.
fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - (data.len() % block_size);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    padded
}

/// Strip XML Encryption padding. Only the last byte is significant, which
/// accepts both PKCS#7 and ISO 10126 filler.
fn unpad(data: &[u8], block_size: usize) -> Result<Vec<u8>> {
    let Some(&last) = data.last() else {
        return Err(Error::Crypto("empty padded block".into()));
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Err(Error::Crypto("invalid padding".into()));
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

// ── AES-GCM ──────────────────────────────────────────────────────────

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

struct Gcm {
    uri: &'static str,
    key_size: usize,
}

type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, aes_gcm::aead::consts::U12>;

macro_rules! gcm_apply {
    ($key_size:expr, $op:ident, $key:expr, $nonce:expr, $data:expr) => {{
        use aes_gcm::aead::Aead;
        use aes_gcm::KeyInit;
        match $key_size {
            16 => aes_gcm::Aes128Gcm::new_from_slice($key)
                .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?
                .$op($nonce, $data),
            24 => Aes192Gcm::new_from_slice($key)
                .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?
                .$op($nonce, $data),
            _ => aes_gcm::Aes256Gcm::new_from_slice($key)
                .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?
                .$op($nonce, $data),
        }
    }};
}

impl CipherAlgorithm for Gcm {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn key_size(&self) -> usize {
        self.key_size
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        check_key(self.key_size, key)?;
        let mut out = vec![0u8; GCM_NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut out);
        let nonce = aes_gcm::Nonce::from_slice(&out[..]).to_owned();

        let ct = gcm_apply!(self.key_size, encrypt, key, &nonce, plaintext)
            .map_err(|e| Error::Crypto(format!("AES-GCM encrypt: {e}")))?;
        out.extend_from_slice(&ct);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        check_key(self.key_size, key)?;
        if data.len() < GCM_NONCE_LEN + GCM_TAG_LEN {
            return Err(Error::Crypto("AES-GCM data too short".into()));
        }
        let (nonce, ct_and_tag) = data.split_at(GCM_NONCE_LEN);
        let nonce = aes_gcm::Nonce::from_slice(nonce);
        gcm_apply!(self.key_size, decrypt, key, nonce, ct_and_tag)
            .map_err(|e| Error::Crypto(format!("AES-GCM decrypt: {e}")))
    }
}
