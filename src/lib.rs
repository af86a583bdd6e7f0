//! Encrypted key-value database
//! Values: UTF-8 strings, 32-bit integers, doubles
//! Every value, and by default every key, is stored AES-256-CBC encrypted
//! Maximal unique data size: 512 B

mod utils;

mod cipher;
mod value;
mod store;

mod error;
mod options;
mod db;
mod registry;

#[cfg(test)]
mod tests;

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_REVISION: u32 = 0;

pub use self::{
    cipher::{
        Direction, KdfError, KeyMaterial, KeyDerivation, UniqueData, Derived, DirectKeys,
        UNIQUE_DATA_MAX_LEN, KEY_LEN, IV_LEN,
    },
    value::{Value, ValueType},
    store::{
        LogStore, StoreStats, StoreError, StoreOptions, OrderedStore, ReadOptions, WriteOptions,
        BlockCache, Bytewise, Comparator,
    },
    error::{Error, Status},
    options::Options,
    db::{CryptoDb, Fetched},
    registry::{Registry, Session},
};
