use super::{
    error::Error,
    store::{ReadOptions, StoreOptions, WriteOptions},
};

pub const DEFAULT_CACHE_SIZE: usize = 8 << 20;
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_MAX_OPEN_FILES: usize = 1000;
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;
pub const DEFAULT_BLOCK_RESTART_INTERVAL: usize = 16;
pub const DEFAULT_MAX_FILE_SIZE: usize = 2 * 1024 * 1024;

/// Tuning of the underlying store. Every size must be non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Bytes of record values kept in the LRU cache.
    pub cache_capacity: usize,
    /// Obsolete bytes tolerated before segments are rewritten.
    pub write_buffer_size: usize,
    /// Segment count above which segments are rewritten.
    pub max_open_files: usize,
    pub block_size: usize,
    pub block_restart_interval: usize,
    /// A segment is closed once the next record would grow it past this.
    pub max_file_size: usize,
    /// Store keys as given rather than encrypted.
    pub disable_keys_encryption: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cache_capacity: DEFAULT_CACHE_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            block_size: DEFAULT_BLOCK_SIZE,
            block_restart_interval: DEFAULT_BLOCK_RESTART_INTERVAL,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            disable_keys_encryption: false,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<(), Error> {
        let populated = self.cache_capacity != 0
            && self.write_buffer_size != 0
            && self.max_open_files != 0
            && self.block_size != 0
            && self.block_restart_interval != 0
            && self.max_file_size != 0;
        if populated {
            Ok(())
        } else {
            Err(Error::WrongArgument("options are not fully populated"))
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: true,
            write_buffer_size: self.write_buffer_size,
            max_open_files: self.max_open_files,
            block_size: self.block_size,
            block_restart_interval: self.block_restart_interval,
            max_file_size: self.max_file_size,
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            verify_checksums: true,
            fill_cache: true,
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions { sync: true }
    }
}
