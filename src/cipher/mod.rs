mod kdf;
pub mod aes_cbc;

pub use self::kdf::{
    Direction, KdfError, KeyMaterial, KeyDerivation, UniqueData, Derived, DirectKeys,
    UNIQUE_DATA_MAX_LEN, KEY_LEN, IV_LEN,
};
