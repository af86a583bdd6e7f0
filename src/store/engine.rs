use std::{
    collections::BTreeMap,
    fs,
    io::{self, BufReader, Write},
    mem,
    path::{Path, PathBuf},
    sync::Arc,
};

use fs4::fs_std::FileExt;
use parking_lot::RwLock;

use super::{
    super::utils,
    cache::BlockCache,
    comparator::{Bytewise, Comparator, OrdKey},
    record::{ReadOutcome, Record},
    OrderedStore, ReadOptions, StoreError, StoreOptions, WriteOptions,
};

const LOCK: &str = "LOCK";
const MANIFEST: &str = "MANIFEST";
const SEGMENT_EXT: &str = "log";
const STAGING_EXT: &str = "tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub segments: usize,
    /// Bytes held by overwritten values and tombstones.
    pub obsolete_bytes: u64,
}

/// Log-structured ordered store.
///
/// Every mutation is appended to the active segment; an in-memory index
/// ordered by `C` maps each live key to its latest record. Segments rotate
/// at `max_file_size` and are rewritten once the obsolete bytes exceed
/// `write_buffer_size` or there are more than `max_open_files` of them.
pub struct LogStore<C = Bytewise> {
    dir: PathBuf,
    opts: StoreOptions,
    cache: Arc<BlockCache>,
    state: RwLock<State<C>>,
    _lock: fs::File,
}

#[derive(Clone, Copy)]
struct Location {
    segment: u64,
    offset: u64,
    size: u32,
}

struct Segment {
    file: fs::File,
    len: u64,
}

struct State<C> {
    index: BTreeMap<OrdKey<C>, Location>,
    segments: BTreeMap<u64, Segment>,
    active: u64,
    obsolete: u64,
    /// Segments are still under their staging names.
    staging: bool,
}

fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{id:06}.{SEGMENT_EXT}"))
}

fn staging_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{id:06}.{STAGING_EXT}"))
}

// Output of a compaction that never committed.
fn remove_staged(dir: &Path) -> io::Result<()> {
    let mut removed = false;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(STAGING_EXT) {
            log::warn!("removing uncommitted {}", path.display());
            fs::remove_file(&path)?;
            removed = true;
        }
    }
    if removed {
        utils::sync_dir(dir)?;
    }
    Ok(())
}

fn segment_ids(dir: &Path) -> io::Result<Vec<u64>> {
    let mut ids = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXT) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse().ok())
        {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

fn lock_dir(dir: &Path) -> io::Result<fs::File> {
    let lock = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join(LOCK))?;
    FileExt::try_lock_exclusive(&lock)?;
    Ok(lock)
}

fn check_manifest<C>(dir: &Path, exists: bool) -> Result<(), StoreError>
where
    C: Comparator,
{
    let path = dir.join(MANIFEST);
    if exists {
        let stored = fs::read_to_string(&path)?;
        let stored = stored.trim_end();
        if stored != C::name() {
            return Err(StoreError::InvalidArgument(format!(
                "{} does not match existing comparator {stored}",
                C::name(),
            )));
        }
    } else {
        let mut file = fs::File::create(&path)?;
        writeln!(file, "{}", C::name())?;
        file.sync_all()?;
        utils::sync_dir(dir)?;
    }
    Ok(())
}

fn check_options(opts: &StoreOptions) -> Result<(), StoreError> {
    let sizes = [
        ("write_buffer_size", opts.write_buffer_size),
        ("max_open_files", opts.max_open_files),
        ("block_size", opts.block_size),
        ("block_restart_interval", opts.block_restart_interval),
        ("max_file_size", opts.max_file_size),
    ];
    match sizes.iter().find(|(_, v)| *v == 0) {
        Some((name, _)) => Err(StoreError::InvalidArgument(format!("{name} is zero"))),
        None => Ok(()),
    }
}

impl<C> State<C>
where
    C: Comparator,
{
    fn empty(active: u64) -> Self {
        State {
            index: BTreeMap::new(),
            segments: BTreeMap::new(),
            active,
            obsolete: 0,
            staging: false,
        }
    }

    fn recover(dir: &Path, opts: &StoreOptions) -> Result<Self, StoreError> {
        remove_staged(dir)?;
        let ids = segment_ids(dir)?;
        let mut state = Self::empty(ids.last().copied().unwrap_or(1));
        for &id in &ids {
            let file = utils::open_segment(segment_path(dir, id), false)?;
            let len = state.replay(id, &file, opts, id == state.active)?;
            state.segments.insert(id, Segment { file, len });
        }
        if state.segments.is_empty() {
            state.add_segment(dir, state.active)?;
        }
        log::info!(
            "recovered {} entries from {} segments",
            state.index.len(),
            state.segments.len(),
        );
        Ok(state)
    }

    fn replay(
        &mut self,
        id: u64,
        file: &fs::File,
        opts: &StoreOptions,
        last: bool,
    ) -> Result<u64, StoreError> {
        let mut reader = BufReader::with_capacity(opts.block_size, file);
        let mut offset = 0;
        let damage = loop {
            match Record::read_from(&mut reader)? {
                ReadOutcome::Record(record, size) => {
                    let size = size as u32;
                    self.apply(record, Location { segment: id, offset, size });
                    offset += u64::from(size);
                }
                ReadOutcome::End => return Ok(offset),
                ReadOutcome::Truncated => break "truncated record",
                ReadOutcome::Damaged(what) => break what,
            }
        };

        if last {
            // an interrupted append, nothing after it was acknowledged
            log::warn!("segment {id}: {damage} at {offset}, dropping the tail");
            file.set_len(offset)?;
            file.sync_all()?;
        } else if opts.paranoid_checks {
            return Err(StoreError::Corruption(format!(
                "segment {id}: {damage} at {offset}"
            )));
        } else {
            log::warn!("segment {id}: {damage} at {offset}, skipping the rest");
        }
        Ok(offset)
    }

    fn apply(&mut self, record: Record, location: Location) {
        match record {
            Record::Put { key, .. } => {
                if let Some(old) = self.index.insert(OrdKey::new(key), location) {
                    self.obsolete += u64::from(old.size);
                }
            }
            Record::Delete { key } => {
                if let Some(old) = self.index.remove(&OrdKey::new(key)) {
                    self.obsolete += u64::from(old.size);
                }
                self.obsolete += u64::from(location.size);
            }
        }
    }

    fn path(&self, dir: &Path, id: u64) -> PathBuf {
        if self.staging {
            staging_path(dir, id)
        } else {
            segment_path(dir, id)
        }
    }

    fn add_segment(&mut self, dir: &Path, id: u64) -> io::Result<()> {
        let file = utils::open_segment(self.path(dir, id), true)?;
        utils::sync_dir(dir)?;
        self.segments.insert(id, Segment { file, len: 0 });
        self.active = id;
        Ok(())
    }

    fn append(
        &mut self,
        dir: &Path,
        opts: &StoreOptions,
        bytes: &[u8],
        sync: bool,
    ) -> Result<Location, StoreError> {
        let size = u32::try_from(bytes.len())
            .map_err(|_| StoreError::InvalidArgument("record is too large".to_owned()))?;

        let len = self.active_segment()?.len;
        if len != 0 && len + u64::from(size) > opts.max_file_size as u64 {
            log::info!("segment {} is full", self.active);
            self.add_segment(dir, self.active + 1)?;
        }

        let segment = self.active_segment()?;
        let offset = segment.len;
        let written = (&segment.file)
            .write_all(bytes)
            .and_then(|()| if sync { segment.file.sync_data() } else { Ok(()) });
        if let Err(err) = written {
            // keep the segment parseable for the next append
            segment.file.set_len(offset).unwrap_or_default();
            return Err(err.into());
        }
        segment.len += u64::from(size);

        Ok(Location {
            segment: self.active,
            offset,
            size,
        })
    }

    fn active_segment(&mut self) -> Result<&mut Segment, StoreError> {
        let active = self.active;
        self.segments
            .get_mut(&active)
            .ok_or_else(|| StoreError::Corruption(format!("segment {active} is missing")))
    }

    fn read(&self, location: &Location) -> Result<Vec<u8>, StoreError> {
        let segment = self.segments.get(&location.segment).ok_or_else(|| {
            StoreError::Corruption(format!("segment {} is missing", location.segment))
        })?;
        let mut buf = vec![0; location.size as usize];
        utils::read_at(&segment.file, &mut buf, location.offset)?;
        Ok(buf)
    }

    fn needs_compaction(&self, opts: &StoreOptions) -> bool {
        self.segments.len() > 1
            && self.obsolete > 0
            && (self.obsolete > opts.write_buffer_size as u64
                || self.segments.len() > opts.max_open_files)
    }

    /// Copies every live record into fresh segments in key order.
    ///
    /// The copy is written under staging names and renamed into place only
    /// once all of it is synced, so recovery never sees a partial copy.
    /// Every committed segment is complete, and replaying any of them over
    /// the originals yields the same entries.
    fn rewrite(&self, dir: &Path, opts: &StoreOptions) -> Result<Self, StoreError> {
        let mut next = Self::empty(self.active + 1);
        next.staging = true;
        next.add_segment(dir, next.active)?;

        let copied = self.index.iter().try_for_each(|(key, location)| {
            let bytes = self.read(location)?;
            let location = next.append(dir, opts, &bytes, false)?;
            next.index.insert(OrdKey::new(key.as_bytes().to_vec()), location);
            Ok::<_, StoreError>(())
        });
        let committed = copied.and_then(|()| {
            for segment in next.segments.values() {
                segment.file.sync_all()?;
            }
            next.commit(dir).map_err(StoreError::from)
        });

        if let Err(err) = committed {
            // neither name may be replayed over the originals
            for id in next.segments.keys() {
                fs::remove_file(staging_path(dir, *id)).unwrap_or_default();
                fs::remove_file(segment_path(dir, *id)).unwrap_or_default();
            }
            return Err(err);
        }
        Ok(next)
    }

    fn commit(&mut self, dir: &Path) -> io::Result<()> {
        for id in self.segments.keys() {
            fs::rename(staging_path(dir, *id), segment_path(dir, *id))?;
        }
        utils::sync_dir(dir)?;
        self.staging = false;
        Ok(())
    }
}

impl<C> LogStore<C>
where
    C: Comparator,
{
    pub fn open(
        path: impl AsRef<Path>,
        opts: StoreOptions,
        cache: Arc<BlockCache>,
    ) -> Result<Self, StoreError> {
        check_options(&opts)?;
        let dir = path.as_ref().to_path_buf();

        let exists = dir.join(MANIFEST).exists();
        if !exists && !opts.create_if_missing {
            return Err(StoreError::InvalidArgument(format!(
                "{}: does not exist (create_if_missing is false)",
                dir.display(),
            )));
        }
        if exists && opts.error_if_exists {
            return Err(StoreError::InvalidArgument(format!(
                "{}: exists (error_if_exists is true)",
                dir.display(),
            )));
        }

        fs::create_dir_all(&dir)?;
        let lock = lock_dir(&dir)?;
        check_manifest::<C>(&dir, exists)?;
        let state = State::recover(&dir, &opts)?;
        log::info!("opened store at {}", dir.display());

        Ok(LogStore {
            dir,
            opts,
            cache,
            state: RwLock::new(state),
            _lock: lock,
        })
    }

    fn write(&self, record: Record, sync: bool) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if let Record::Delete { key } = &record {
            if !state.index.contains_key(&OrdKey::new(key.clone())) {
                return Ok(());
            }
        }

        let bytes = record.encode();
        let location = state.append(&self.dir, &self.opts, &bytes, sync)?;
        log::debug!(
            "append {} at {}:{}",
            hex::encode(record.key()),
            location.segment,
            location.offset,
        );
        state.apply(record, location);

        // the record is durable already, a failed compaction is retried on
        // the next write
        if state.needs_compaction(&self.opts) {
            if let Err(err) = self.compact(&mut *state) {
                log::warn!("compaction failed: {err}");
            }
        }
        Ok(())
    }

    fn compact(&self, state: &mut State<C>) -> Result<(), StoreError> {
        let next = state.rewrite(&self.dir, &self.opts)?;
        let old = mem::replace(state, next);
        log::info!(
            "compacted {} segments, {} obsolete bytes reclaimed",
            old.segments.len(),
            old.obsolete,
        );
        // oldest first, whatever remains still replays consistently
        for (id, segment) in old.segments {
            drop(segment);
            self.cache.forget_segment(id);
            fs::remove_file(segment_path(&self.dir, id))?;
        }
        utils::sync_dir(&self.dir)?;
        Ok(())
    }

    /// Stored keys in comparator order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let state = self.state.read();
        state.index.keys().map(|k| k.as_bytes().to_vec()).collect()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            entries: state.index.len(),
            segments: state.segments.len(),
            obsolete_bytes: state.obsolete,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl<C> OrderedStore for LogStore<C>
where
    C: Comparator,
{
    fn put(&self, opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let record = Record::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        self.write(record, opts.sync)
    }

    fn get(&self, opts: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.state.read();
        let Some(location) = state.index.get(&OrdKey::new(key.to_vec())).copied() else {
            return Ok(None);
        };
        let cache_key = (location.segment, location.offset);
        if let Some(value) = self.cache.get(cache_key) {
            return Ok(Some(value.to_vec()));
        }
        let bytes = state.read(&location)?;
        drop(state);

        let Some(Record::Put { value, .. }) = Record::decode(&bytes, opts.verify_checksums) else {
            return Err(StoreError::Corruption(format!(
                "segment {}: bad record at {}",
                location.segment, location.offset,
            )));
        };
        if opts.fill_cache {
            self.cache.insert(cache_key, Arc::from(value.as_slice()));
        }
        Ok(Some(value))
    }

    fn delete(&self, opts: &WriteOptions, key: &[u8]) -> Result<(), StoreError> {
        self.write(Record::Delete { key: key.to_vec() }, opts.sync)
    }
}

impl<C> Drop for LogStore<C> {
    fn drop(&mut self) {
        log::info!("closed store at {}", self.dir.display());
    }
}

/// Removes every file of the store at `path`. A missing store is not an
/// error, one that is open elsewhere is.
pub fn destroy(path: impl AsRef<Path>) -> Result<(), StoreError> {
    let dir = path.as_ref();
    if !dir.exists() {
        return Ok(());
    }

    let lock = lock_dir(dir)?;
    for id in segment_ids(dir)? {
        fs::remove_file(segment_path(dir, id))?;
    }
    match fs::remove_file(dir.join(MANIFEST)) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
        _ => {}
    }
    drop(lock);
    fs::remove_file(dir.join(LOCK))?;
    // the directory stays if it holds anything else
    fs::remove_dir(dir).unwrap_or_default();

    log::info!("destroyed store at {}", dir.display());
    Ok(())
}
