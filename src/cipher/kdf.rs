use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::super::error::Error;

pub const UNIQUE_DATA_MAX_LEN: usize = 512;
pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Label a failure with the operation it interrupted.
    pub fn fail(self) -> Error {
        match self {
            Self::Encrypt => Error::EncryptionFail,
            Self::Decrypt => Error::DecryptionFail,
        }
    }
}

#[derive(Debug, Error)]
#[error("key derivation failed: {0}")]
pub struct KdfError(pub String);

/// AES-256 key and CBC initialization vector.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl KeyMaterial {
    pub fn new(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        KeyMaterial { key, iv }
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

/// Caller secret the key material is derived from. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct UniqueData {
    buf: [u8; UNIQUE_DATA_MAX_LEN],
    len: usize,
}

impl UniqueData {
    pub const fn empty() -> Self {
        UniqueData {
            buf: [0; UNIQUE_DATA_MAX_LEN],
            len: 0,
        }
    }

    pub fn new(data: &[u8]) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::WrongArgument("unique data is empty"));
        }
        if data.len() > UNIQUE_DATA_MAX_LEN {
            return Err(Error::WrongArgument("unique data is too long"));
        }
        let mut this = Self::empty();
        this.buf[..data.len()].copy_from_slice(data);
        this.len = data.len();
        Ok(this)
    }

    pub fn from_keys(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        let mut this = Self::empty();
        this.buf[..KEY_LEN].copy_from_slice(key);
        this.buf[KEY_LEN..][..IV_LEN].copy_from_slice(iv);
        this.len = KEY_LEN + IV_LEN;
        this
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for UniqueData {
    fn default() -> Self {
        Self::empty()
    }
}

/// Source of the key and IV used by every encrypt and decrypt call.
///
/// Closures of the matching shape implement it, which is how callers plug
/// their own derivation in; any context they need is captured.
pub trait KeyDerivation: Send + Sync {
    fn derive(&self, unique: &UniqueData, direction: Direction) -> Result<KeyMaterial, KdfError>;
}

impl<F> KeyDerivation for F
where
    F: Fn(&UniqueData, Direction) -> Result<KeyMaterial, KdfError> + Send + Sync,
{
    fn derive(&self, unique: &UniqueData, direction: Direction) -> Result<KeyMaterial, KdfError> {
        self(unique, direction)
    }
}

/// SHA3-512 of the unique data seeds a SHAKE256 stream, whose first 48
/// bytes are the key followed by the IV. Direction does not matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Derived;

impl KeyDerivation for Derived {
    fn derive(&self, unique: &UniqueData, direction: Direction) -> Result<KeyMaterial, KdfError> {
        use sha3::{
            Digest, Sha3_512, Shake256,
            digest::{ExtendableOutput, Update, XofReader},
        };

        let _ = direction;
        if unique.is_empty() {
            return Err(KdfError("no unique data".to_owned()));
        }

        let mut seed = <Sha3_512 as Digest>::digest(unique.as_bytes());
        let mut xof = Shake256::default();
        Update::update(&mut xof, seed.as_slice());
        seed.as_mut_slice().zeroize();
        let mut rng = xof.finalize_xof();

        let mut stream = [0; KEY_LEN + IV_LEN];
        rng.read(&mut stream);
        let material = split(&stream);
        stream.zeroize();

        Ok(material)
    }
}

/// The unique data already is `key ‖ iv`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectKeys;

impl KeyDerivation for DirectKeys {
    fn derive(&self, unique: &UniqueData, direction: Direction) -> Result<KeyMaterial, KdfError> {
        let _ = direction;
        let bytes = unique.as_bytes();
        if bytes.len() < KEY_LEN + IV_LEN {
            return Err(KdfError(format!("{} bytes of key material", bytes.len())));
        }
        Ok(split(bytes))
    }
}

fn split(bytes: &[u8]) -> KeyMaterial {
    let mut key = [0; KEY_LEN];
    let mut iv = [0; IV_LEN];
    key.copy_from_slice(&bytes[..KEY_LEN]);
    iv.copy_from_slice(&bytes[KEY_LEN..][..IV_LEN]);
    KeyMaterial::new(key, iv)
}
