use std::{ops::Deref, path::Path};

use parking_lot::{Mutex, MutexGuard};

use super::{
    cipher::{KeyDerivation, IV_LEN, KEY_LEN},
    db::CryptoDb,
    error::Error,
    options::Options,
};

/// Admits one open database at a time.
///
/// Acquisition never waits: while a [`Session`] is alive every other open
/// or destroy fails with [`Error::Busy`]. Options must be configured, and
/// fully populated, before anything is admitted.
#[derive(Default)]
pub struct Registry {
    gate: Mutex<()>,
    options: Mutex<Option<Options>>,
}

/// The open database together with the registry lease, released when the
/// session is closed or dropped.
pub struct Session<'a> {
    db: CryptoDb,
    _lease: MutexGuard<'a, ()>,
}

impl Session<'_> {
    pub fn close(self) {}
}

impl Deref for Session<'_> {
    type Target = CryptoDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&self, options: Options) {
        *self.options.lock() = Some(options);
    }

    pub fn configure_defaults(&self) {
        self.configure(Options::default());
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_locked()
    }

    fn acquire(&self) -> Result<(MutexGuard<'_, ()>, Options), Error> {
        let lease = self.gate.try_lock().ok_or(Error::Busy)?;
        let options = self
            .options
            .lock()
            .clone()
            .ok_or(Error::WrongArgument("options are not configured"))?;
        options.validate()?;
        Ok((lease, options))
    }

    pub fn open(
        &self,
        path: impl AsRef<Path>,
        unique_data: &[u8],
        kdf: Option<Box<dyn KeyDerivation>>,
    ) -> Result<Session<'_>, Error> {
        let (lease, options) = self.acquire()?;
        let db = CryptoDb::open(path, unique_data, Some(&options), kdf)?;
        Ok(Session { db, _lease: lease })
    }

    pub fn open_with_keys(
        &self,
        path: impl AsRef<Path>,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
    ) -> Result<Session<'_>, Error> {
        let (lease, options) = self.acquire()?;
        let db = CryptoDb::open_with_keys(path, key, iv, Some(&options))?;
        Ok(Session { db, _lease: lease })
    }

    pub fn destroy(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let (_lease, options) = self.acquire()?;
        CryptoDb::destroy(path, Some(&options))
    }
}
