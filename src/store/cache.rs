use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

/// Identifies a record by segment number and offset. Records never move, so
/// entries need no invalidation, stale ones simply age out.
pub type CacheKey = (u64, u64);

/// LRU cache of record values, charged by value length.
pub struct BlockCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    map: LruCache<CacheKey, Arc<[u8]>>,
    usage: usize,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        BlockCache {
            capacity,
            inner: Mutex::new(Inner {
                map: LruCache::unbounded(),
                usage: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn usage(&self) -> usize {
        self.inner.lock().usage
    }

    pub fn get(&self, key: CacheKey) -> Option<Arc<[u8]>> {
        self.inner.lock().map.get(&key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: Arc<[u8]>) {
        if value.len() > self.capacity {
            return;
        }
        let mut inner = self.inner.lock();
        inner.usage += value.len();
        if let Some(old) = inner.map.put(key, value) {
            inner.usage -= old.len();
        }
        while inner.usage > self.capacity {
            match inner.map.pop_lru() {
                Some((_, old)) => inner.usage -= old.len(),
                None => break,
            }
        }
    }

    /// Drop every entry of a segment that no longer exists.
    pub fn forget_segment(&self, segment: u64) {
        let mut inner = self.inner.lock();
        let stale = inner
            .map
            .iter()
            .filter(|((s, _), _)| *s == segment)
            .map(|(k, _)| *k)
            .collect::<Vec<_>>();
        for key in stale {
            if let Some(old) = inner.map.pop(&key) {
                inner.usage -= old.len();
            }
        }
    }
}
