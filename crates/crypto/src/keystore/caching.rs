//! LRU cache in front of any [`KeyStore`]
//!
//! The backend is the source of truth. Writes go to the backend first and
//! reach the cache only after they succeed; deletes leave the cache first.
//! `list` always asks the backend.
//!
//! Hits are served under the shared lock and then promoted under the
//! exclusive lock. The closed flag is checked again after the upgrade, and a
//! generation counter bumped by every delete/invalidate keeps a slow backend
//! read from re-inserting a key that was removed meanwhile.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::error::{KeystoreError, KeystoreResult};
use super::record::KeyRecord;
use super::validation;
use super::{KeyStore, StoreBackend};

/// Capacity used when zero is requested
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before the first lookup
    pub hit_rate: f64,
}

struct CacheState {
    entries: LruCache<String, KeyRecord>,
    generation: u64,
    closed: bool,
}

impl CacheState {
    fn wipe_all(&mut self) {
        while let Some((_, mut record)) = self.entries.pop_lru() {
            record.wipe();
        }
    }

    /// Insert a copy, wiping whatever it displaces
    fn insert(&mut self, name: &str, record: &KeyRecord) {
        if let Some((displaced, mut old)) = self.entries.push(name.to_string(), record.clone()) {
            if displaced != name {
                debug!(name = %displaced, "evicted key from cache");
            }
            old.wipe();
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        self.generation = self.generation.wrapping_add(1);
        match self.entries.pop(name) {
            Some(mut record) => {
                record.wipe();
                true
            }
            None => false,
        }
    }
}

/// Fixed-capacity LRU decorator over a [`KeyStore`]
pub struct CachingStore<S> {
    backend: S,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: KeyStore> CachingStore<S> {
    /// Wrap `backend`. A capacity of zero selects [`DEFAULT_CACHE_CAPACITY`].
    pub fn new(backend: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            state: RwLock::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
                closed: false,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn capacity(&self) -> usize {
        self.state.read().entries.cap().get()
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
        }
    }

    /// Drop one cached entry without touching the backend.
    /// Returns whether it was cached.
    pub fn invalidate(&self, name: &str) -> bool {
        self.state.write().remove(name)
    }

    /// Drop every cached entry without touching the backend
    pub fn invalidate_all(&self) {
        let mut state = self.state.write();
        state.generation = state.generation.wrapping_add(1);
        state.wipe_all();
    }

    /// Copy of a cached record, promoted to most recently used
    fn lookup(&self, name: &str) -> KeystoreResult<Option<KeyRecord>> {
        let copy = {
            let state = self.state.read();
            if state.closed {
                return Err(KeystoreError::Closed);
            }
            match state.entries.peek(name) {
                Some(record) => record.clone(),
                None => return Ok(None),
            }
        };

        // Shared lock released; state may have changed before we get here
        let mut state = self.state.write();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        state.entries.promote(name);
        Ok(Some(copy))
    }
}

impl<S: KeyStore> KeyStore for CachingStore<S> {
    fn store(&self, name: &str, record: &KeyRecord) -> KeystoreResult<()> {
        validation::validate_store(name, record)?;

        let generation = {
            let state = self.state.read();
            if state.closed {
                return Err(KeystoreError::Closed);
            }
            state.generation
        };

        self.backend.store(name, record)?;

        let mut state = self.state.write();
        if !state.closed && state.generation == generation {
            state.insert(name, record);
        }
        Ok(())
    }

    fn load(&self, name: &str) -> KeystoreResult<KeyRecord> {
        validation::validate_name(name)?;

        if let Some(record) = self.lookup(name)? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(name, "cache hit");
            return Ok(record);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(name, "cache miss");

        let generation = self.state.read().generation;
        let record = self.backend.load(name)?;

        let mut state = self.state.write();
        if state.closed {
            return Err(KeystoreError::Closed);
        }
        if state.generation == generation {
            state.insert(name, &record);
        }
        Ok(record)
    }

    fn delete(&self, name: &str) -> KeystoreResult<()> {
        {
            let mut state = self.state.write();
            if state.closed {
                return Err(KeystoreError::Closed);
            }
            state.remove(name);
        }
        self.backend.delete(name)
    }

    fn list(&self) -> KeystoreResult<Vec<String>> {
        if self.state.read().closed {
            return Err(KeystoreError::Closed);
        }
        self.backend.list()
    }

    fn contains(&self, name: &str) -> KeystoreResult<bool> {
        {
            let state = self.state.read();
            if state.closed {
                return Err(KeystoreError::Closed);
            }
            if state.entries.contains(name) {
                return Ok(true);
            }
        }
        self.backend.contains(name)
    }

    /// Wipe the cache, then close the backend
    fn close(&self) -> KeystoreResult<()> {
        {
            let mut state = self.state.write();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.wipe_all();
        }
        debug!("closed key cache");
        self.backend.close()
    }

    fn backend_type(&self) -> StoreBackend {
        self.backend.backend_type()
    }
}

impl<S> std::fmt::Debug for CachingStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CachingStore")
            .field("len", &state.entries.len())
            .field("capacity", &state.entries.cap())
            .field("closed", &state.closed)
            .finish()
    }
}
