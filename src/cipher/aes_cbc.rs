use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::{
    super::{error::Error, utils},
    kdf::{Direction, KeyMaterial},
};

/// AES-256-CBC over a buffer already zero-padded to the block size.
///
/// A fresh cipher context is built per call and always starts from the
/// derived IV, so equal plaintexts under one handle encrypt equally.
pub fn encrypt(material: &KeyMaterial, buf: &mut [u8]) -> Result<(), Error> {
    check(buf, Direction::Encrypt)?;
    let len = buf.len();
    cbc::Encryptor::<Aes256>::new_from_slices(material.key(), material.iv())
        .map_err(|_| Error::EncryptionFail)?
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| Error::EncryptionFail)?;
    Ok(())
}

/// Inverse of [`encrypt`]. Padding stays in place, the caller knows where
/// the content ends.
pub fn decrypt(material: &KeyMaterial, buf: &mut [u8]) -> Result<(), Error> {
    check(buf, Direction::Decrypt)?;
    cbc::Decryptor::<Aes256>::new_from_slices(material.key(), material.iv())
        .map_err(|_| Error::DecryptionFail)?
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| Error::DecryptionFail)?;
    Ok(())
}

/// Zero-pad `parts` and encrypt the result.
pub fn seal(material: &KeyMaterial, parts: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let mut buf = utils::zero_pad(parts)?;
    encrypt(material, &mut buf)?;
    Ok(buf)
}

fn check(buf: &[u8], direction: Direction) -> Result<(), Error> {
    if buf.is_empty() || buf.len() % utils::BLOCK_LEN != 0 {
        return Err(direction.fail());
    }
    Ok(())
}
