mod basic;
mod recovery;

use std::path::PathBuf;

use tempdir::TempDir;

use crate::{CryptoDb, Options};

pub const UNIQUE: [u8; 512] = [0; 512];

pub fn init_log() {
    let env = env_logger::Env::new().filter_or("RUST_LOG", "cryptodb=info");
    env_logger::try_init_from_env(env).unwrap_or_default();
}

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("db")
}

/// Runs `f` against a freshly created database opened with derived keys.
pub fn with_db<F, T>(options: Option<&Options>, f: F) -> T
where
    F: FnOnce(&CryptoDb, &TempDir) -> T,
{
    init_log();

    let dir = TempDir::new("cryptodb").unwrap();
    let db = CryptoDb::open(db_path(&dir), &UNIQUE, options, None).unwrap();
    drop(db);

    let db = CryptoDb::open(db_path(&dir), &UNIQUE, options, None).unwrap();
    f(&db, &dir)
}
