use std::{
    borrow::Cow,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use zeroize::Zeroize;

use super::{
    cipher::{
        aes_cbc, Derived, DirectKeys, Direction, KeyDerivation, KeyMaterial, UniqueData, IV_LEN,
        KEY_LEN,
    },
    error::{Error, Status},
    options::Options,
    store::{self, BlockCache, Bytewise, LogStore, OrderedStore, ReadOptions, WriteOptions},
    utils,
    value::{self, Value, ValueType},
};

/// Result of a lookup that found an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Found(Value),
    /// The entry holds a value of another type, it was not decoded.
    WrongType(ValueType),
}

impl Fetched {
    /// `0` when found, the positive code of the stored type otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Self::Found(_) => Status::Ok as i32,
            Self::WrongType(kind) => *kind as i32,
        }
    }
}

struct Engine {
    store: Box<dyn OrderedStore>,
    cache: Arc<BlockCache>,
    read: ReadOptions,
    write: WriteOptions,
    path: PathBuf,
}

/// Handle to an encrypted database.
///
/// Values are stored as AES-256-CBC of their tagged text form, keys are
/// encrypted the same way unless [`Options::disable_keys_encryption`] is
/// set. Key material is derived per call from the unique data given at open
/// time, which stays untouched until [`close`](Self::close).
///
/// A handle may be shared between threads; the store serializes writes
/// and every write is synced before it returns.
pub struct CryptoDb {
    engine: Option<Engine>,
    unique: UniqueData,
    kdf: Box<dyn KeyDerivation>,
    disable_keys_encryption: bool,
}

impl Default for CryptoDb {
    fn default() -> Self {
        Self::closed()
    }
}

impl fmt::Debug for CryptoDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoDb")
            .field("path", &self.engine.as_ref().map(|e| &e.path))
            .field("disable_keys_encryption", &self.disable_keys_encryption)
            .finish_non_exhaustive()
    }
}

impl CryptoDb {
    /// A handle that is not open. Every operation on it fails with
    /// [`Error::NotOpen`].
    pub fn closed() -> Self {
        CryptoDb {
            engine: None,
            unique: UniqueData::empty(),
            kdf: Box::new(Derived),
            disable_keys_encryption: false,
        }
    }

    /// Opens or creates the database at `path`.
    ///
    /// Key material is derived from `unique_data` (at most 512 bytes) unless
    /// `kdf` is given, in which case it alone decides.
    pub fn open(
        path: impl AsRef<Path>,
        unique_data: &[u8],
        options: Option<&Options>,
        kdf: Option<Box<dyn KeyDerivation>>,
    ) -> Result<Self, Error> {
        let mut db = Self::closed();
        db.reopen(path, unique_data, options, kdf)?;
        Ok(db)
    }

    /// Opens or creates the database at `path` with a ready AES-256 key and
    /// IV.
    pub fn open_with_keys(
        path: impl AsRef<Path>,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        options: Option<&Options>,
    ) -> Result<Self, Error> {
        let mut db = Self::closed();
        db.reopen_with_keys(path, key, iv, options)?;
        Ok(db)
    }

    /// Closes whatever this handle holds and opens `path` in its place.
    ///
    /// Once the unique data and path are accepted the previous database is
    /// closed, even if opening the new one fails.
    pub fn reopen(
        &mut self,
        path: impl AsRef<Path>,
        unique_data: &[u8],
        options: Option<&Options>,
        kdf: Option<Box<dyn KeyDerivation>>,
    ) -> Result<(), Error> {
        let unique = UniqueData::new(unique_data)?;
        let kdf = kdf.unwrap_or_else(|| Box::new(Derived));
        self.open_inner(path.as_ref(), unique, options, kdf)
    }

    pub fn reopen_with_keys(
        &mut self,
        path: impl AsRef<Path>,
        key: &[u8; KEY_LEN],
        iv: &[u8; IV_LEN],
        options: Option<&Options>,
    ) -> Result<(), Error> {
        let unique = UniqueData::from_keys(key, iv);
        self.open_inner(path.as_ref(), unique, options, Box::new(DirectKeys))
    }

    fn open_inner(
        &mut self,
        path: &Path,
        unique: UniqueData,
        options: Option<&Options>,
        kdf: Box<dyn KeyDerivation>,
    ) -> Result<(), Error> {
        if path.as_os_str().is_empty() {
            return Err(Error::WrongArgument("path is empty"));
        }
        self.close();

        let default = Options::default();
        let options = options.unwrap_or(&default);
        options.validate()?;

        let cache = Arc::new(BlockCache::new(options.cache_capacity));
        let store = LogStore::<Bytewise>::open(path, options.store_options(), cache.clone())?;
        log::info!(
            "open {}, cache {} bytes, keys encryption {}",
            path.display(),
            cache.capacity(),
            if options.disable_keys_encryption { "off" } else { "on" },
        );

        self.engine = Some(Engine {
            store: Box::new(store),
            cache,
            read: options.read_options(),
            write: options.write_options(),
            path: path.to_path_buf(),
        });
        self.unique = unique;
        self.kdf = kdf;
        self.disable_keys_encryption = options.disable_keys_encryption;
        Ok(())
    }

    /// Releases the store and wipes the unique data. Closing a handle that
    /// is not open does nothing.
    pub fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            log::info!(
                "close {}, {} bytes cached",
                engine.path.display(),
                engine.cache.usage(),
            );
        }
        self.unique.zeroize();
        self.kdf = Box::new(Derived);
        self.disable_keys_encryption = false;
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    /// Removes all on-disk state of the database at `path`. Fails if it is
    /// open.
    pub fn destroy(path: impl AsRef<Path>, options: Option<&Options>) -> Result<(), Error> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::WrongArgument("path is empty"));
        }
        if let Some(options) = options {
            options.validate()?;
        }
        store::destroy(path)?;
        Ok(())
    }

    fn engine(&self) -> Result<&Engine, Error> {
        self.engine.as_ref().ok_or(Error::NotOpen)
    }

    fn derive(&self, direction: Direction) -> Result<KeyMaterial, Error> {
        self.kdf.derive(&self.unique, direction).map_err(|err| {
            log::warn!("{err}");
            direction.fail()
        })
    }

    /// The key as the store sees it.
    fn stored_key<'a>(
        &self,
        material: &KeyMaterial,
        key: &'a [u8],
    ) -> Result<Cow<'a, [u8]>, Error> {
        if self.disable_keys_encryption {
            Ok(Cow::Borrowed(key))
        } else {
            aes_cbc::seal(material, &[key]).map(Cow::Owned)
        }
    }

    fn check_key(key: &[u8]) -> Result<(), Error> {
        if key.is_empty() {
            return Err(Error::WrongArgument("key is empty"));
        }
        Ok(())
    }

    pub fn put(&self, key: &[u8], value: &Value) -> Result<(), Error> {
        self.put_typed(key, value.kind(), value)
    }

    /// Stores `value` declared as `kind`; a declaration that is unknown or
    /// does not match the value is rejected.
    pub fn put_typed(&self, key: &[u8], kind: ValueType, value: &Value) -> Result<(), Error> {
        let engine = self.engine()?;
        Self::check_key(key)?;
        if kind == ValueType::Unknown || kind != value.kind() {
            return Err(Error::WrongArgument("unrecognized value type"));
        }

        let mut text = value::encode(value)?;
        let material = self.derive(Direction::Encrypt)?;
        let sealed = aes_cbc::seal(&material, &[text.as_slice(), &[0]]);
        text.zeroize();
        let sealed = sealed?;
        let stored_key = self.stored_key(&material, key)?;

        engine.store.put(&engine.write, &stored_key, &sealed)?;
        log::debug!("put {} bytes under a {} byte key", sealed.len(), stored_key.len());
        Ok(())
    }

    pub fn put_string(&self, key: &[u8], value: &str) -> Result<(), Error> {
        self.put(key, &Value::from(value))
    }

    pub fn put_int(&self, key: &[u8], value: i32) -> Result<(), Error> {
        self.put(key, &Value::Int(value))
    }

    pub fn put_double(&self, key: &[u8], value: f64) -> Result<(), Error> {
        self.put(key, &Value::Double(value))
    }

    /// Looks `key` up expecting a value of type `expected`.
    ///
    /// A missing entry is [`Error::NotFound`]; an entry of another type is
    /// reported as [`Fetched::WrongType`] without decoding it.
    pub fn get(&self, key: &[u8], expected: ValueType) -> Result<Fetched, Error> {
        let engine = self.engine()?;
        Self::check_key(key)?;

        let material = self.derive(Direction::Decrypt)?;
        let stored_key = self.stored_key(&material, key)?;
        let mut raw = engine
            .store
            .get(&engine.read, &stored_key)?
            .ok_or(Error::NotFound)?;
        if raw.is_empty() || raw.len() % utils::BLOCK_LEN != 0 {
            return Err(Error::Malformed("not a whole number of cipher blocks"));
        }

        aes_cbc::decrypt(&material, &mut raw)?;
        let tagged = value::decode(&raw);
        raw.zeroize();
        let tagged = tagged?;

        log::debug!("get {:?} expecting {expected:?}", tagged.kind());
        match tagged.kind() {
            ValueType::Unknown => Err(Error::Malformed("unknown value type")),
            kind if kind != expected => Ok(Fetched::WrongType(kind)),
            _ => tagged.into_value().map(Fetched::Found),
        }
    }

    /// Lookup in the shape of the C interface: the expected type is the
    /// type of `slot`, which is overwritten only when the entry matches.
    ///
    /// Returns `0` on success, the positive [`ValueType`] code of the stored
    /// value when it is of another type, or a negative [`Status`] code.
    pub fn get_into(&self, key: &[u8], slot: &mut Value) -> i32 {
        match self.get(key, slot.kind()) {
            Ok(Fetched::Found(value)) => {
                *slot = value;
                Status::Ok as i32
            }
            Ok(fetched) => fetched.code(),
            Err(err) => err.code(),
        }
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), Error> {
        let engine = self.engine()?;
        Self::check_key(key)?;

        let material = self.derive(Direction::Encrypt)?;
        let stored_key = self.stored_key(&material, key)?;
        engine.store.delete(&engine.write, &stored_key)?;
        log::debug!("delete a {} byte key", stored_key.len());
        Ok(())
    }
}

impl Drop for CryptoDb {
    fn drop(&mut self) {
        self.close();
    }
}
