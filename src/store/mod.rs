//! Ordered persistent key-value store the encryption layer writes through.
//!
//! Layout of a store directory:
//! - `LOCK`: held exclusively while an instance is open
//! - `MANIFEST`: name of the comparator the keys are ordered by
//! - `NNNNNN.log`: append-only segments of checksummed records

mod cache;
mod comparator;
mod engine;
mod record;

use std::io;

use thiserror::Error;

pub use self::{
    cache::BlockCache,
    comparator::{Bytewise, Comparator},
    engine::{destroy, LogStore, StoreStats},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("corruption: {0}")]
    Corruption(String),
}

/// What the encryption layer needs from a store.
pub trait OrderedStore: Send + Sync {
    fn put(&self, opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn get(&self, opts: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Removing an absent key is not an error.
    fn delete(&self, opts: &WriteOptions, key: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub create_if_missing: bool,
    pub error_if_exists: bool,
    /// Fail on a damaged record anywhere but the unsynced tail.
    pub paranoid_checks: bool,
    pub write_buffer_size: usize,
    pub max_open_files: usize,
    pub block_size: usize,
    pub block_restart_interval: usize,
    pub max_file_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: 4 << 20,
            max_open_files: 1000,
            block_size: 4 << 10,
            block_restart_interval: 16,
            max_file_size: 2 << 20,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub verify_checksums: bool,
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            verify_checksums: false,
            fill_cache: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WriteOptions {
    /// fsync the segment before the write returns
    pub sync: bool,
}
