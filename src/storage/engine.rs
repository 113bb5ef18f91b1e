//! Thread-Safe Storage Engine with Expiry Support
//!
//! In-process backend for the paste store: a sharded byte-keyed map with
//! optional per-key expiry and an atomic integer increment.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over 64 shards.
//! 2. **Lazy Expiry**: Keys are checked for expiry on access plus background cleanup.
//! 3. **Atomic INCR**: The increment runs under the shard's write lock, so every
//!    caller gets a distinct post-increment value.
//! 4. **Grouped Writes**: `set_all` locks every involved shard (in index order)
//!    before writing, so a record and its counter appear together.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// A stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
    pub created_at: Instant,
}

impl Entry {
    /// A `ttl` too large to represent as an `Instant` never expires.
    pub fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            created_at: now,
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

type ShardMap = HashMap<Bytes, Entry>;

#[derive(Debug, Default)]
struct Shard {
    data: RwLock<ShardMap>,
}

// A panic while holding a shard lock leaves the map itself consistent
// (every mutation is a single insert/remove), so poisoning is ignored.
impl Shard {
    fn read(&self) -> RwLockReadGuard<'_, ShardMap> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShardMap> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The in-memory key-value engine behind the `memory` store backend.
///
/// Wrap it in an `Arc` and share it; every operation is thread-safe.
///
/// # Example
///
/// ```
/// use flashpaste::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
/// engine.set_all(vec![(Bytes::from("paste:1"), Bytes::from("{}"), None)]);
/// assert_eq!(engine.get(&Bytes::from("paste:1")), Some(Bytes::from("{}")));
///
/// assert_eq!(engine.incr(&Bytes::from("paste:1:views")), Ok(1));
/// assert_eq!(engine.incr(&Bytes::from("paste:1:views")), Ok(2));
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    /// Statistics: total number of keys (approximate)
    key_count: AtomicU64,
    get_count: AtomicU64,
    set_count: AtomicU64,
    incr_count: AtomicU64,
    /// Statistics: number of expired keys cleaned up
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            incr_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Writes every entry as one unit.
    ///
    /// All involved shards are write-locked (in ascending index order, so two
    /// concurrent groups cannot deadlock) before the first insert. Readers see
    /// either none of the entries or all of them.
    ///
    /// Returns the number of keys that did not exist before.
    pub fn set_all(&self, entries: Vec<(Bytes, Bytes, Option<Duration>)>) -> usize {
        let mut indices: Vec<usize> = entries
            .iter()
            .map(|(key, _, _)| self.shard_index(key))
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let mut guards: Vec<RwLockWriteGuard<'_, ShardMap>> =
            indices.iter().map(|&i| self.shards[i].write()).collect();

        let mut created = 0;
        for (key, value, ttl) in entries {
            let Ok(pos) = indices.binary_search(&self.shard_index(&key)) else {
                continue;
            };
            self.set_count.fetch_add(1, Ordering::Relaxed);
            if guards[pos].insert(key, Entry::new(value, ttl)).is_none() {
                created += 1;
            }
        }

        self.key_count.fetch_add(created as u64, Ordering::Relaxed);
        created
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. Expired keys
    /// are removed on access.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);

        // Fast path: read lock
        {
            let data = shard.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Key exists but is expired - need write lock to remove it
        let mut data = shard.write();
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                data.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            // Race: another thread may have replaced the key
            return Some(entry.value.clone());
        }

        None
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &Bytes) -> bool {
        self.get_shard(key)
            .read()
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    /// Increments an integer value by 1 and returns the new value.
    pub fn incr(&self, key: &Bytes) -> Result<i64, &'static str> {
        self.incr_by(key, 1)
    }

    /// Increments an integer value by `delta`.
    ///
    /// A missing or expired key counts as 0. The key's expiry is preserved.
    pub fn incr_by(&self, key: &Bytes, delta: i64) -> Result<i64, &'static str> {
        self.incr_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.get_shard(key).write();

        let live = data.get(key).filter(|entry| !entry.is_expired());
        let current = match live {
            Some(entry) => std::str::from_utf8(&entry.value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or("value is not an integer or out of range")?,
            None => 0,
        };
        let expires_at = live.and_then(|entry| entry.expires_at);

        let new_value = current
            .checked_add(delta)
            .ok_or("increment would overflow")?;

        let entry = Entry {
            value: Bytes::from(new_value.to_string()),
            expires_at,
            created_at: Instant::now(),
        };
        if data.insert(key.clone(), entry).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(new_value)
    }

    /// Returns the approximate number of keys in the database.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            incr_ops: self.incr_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Removes expired keys from all shards.
    ///
    /// Called by the background expiry sweeper. Returns the number of keys
    /// removed.
    pub fn cleanup_expired(&self) -> u64 {
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let mut data = shard.write();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired());
            cleaned += (before - data.len()) as u64;
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }

        cleaned
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub incr_ops: u64,
    pub expired: u64,
}
