//! Cursor cache for paginated table listings.
//!
//! A `list_tables` call that cannot return everything in one page stores the
//! enumerated name snapshot here under a fresh opaque token. The next call
//! presents the token to continue from where the previous page stopped.
//!
//! Entries are bounded in two ways: each one expires after a TTL (checked
//! lazily on access and by a periodic sweeper), and the cache never holds more
//! than `capacity` entries (the oldest insertion is evicted first). Tokens are
//! single-use: a successful [`CursorCache::take`] removes the entry.

use crate::db::filter::NameFilter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default maximum number of live cursors.
pub const DEFAULT_CURSOR_CAPACITY: usize = 100;

/// Default cursor lifetime in seconds.
pub const DEFAULT_CURSOR_TTL_SECS: u64 = 3600;

/// Default interval between expiry sweeps.
pub const DEFAULT_CURSOR_SWEEP_INTERVAL_SECS: u64 = 60;

/// Time source for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Identity of a paginated request. A cursor is only valid for the exact
/// database, filter and detail level it was created for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeKey {
    pub database: String,
    pub filter: NameFilter,
    pub include_detailed_columns: bool,
}

/// Progress through one enumeration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    pub scope: ScopeKey,
    pub names: Vec<String>,
    /// Always `<= names.len()`
    pub next_index: usize,
}

impl CursorState {
    pub fn new(scope: ScopeKey, names: Vec<String>, next_index: usize) -> Self {
        let next_index = next_index.min(names.len());
        Self {
            scope,
            names,
            next_index,
        }
    }

    pub fn remaining(&self) -> usize {
        self.names.len() - self.next_index
    }
}

/// A cursor removed from the cache by [`CursorCache::take`].
///
/// Keeps the original insertion time and order so a reinstated cursor expires
/// and gets evicted exactly as if it had never been taken.
#[derive(Debug, Clone)]
pub struct TakenCursor {
    pub state: CursorState,
    inserted_at: Instant,
    sequence: u64,
}

struct CacheEntry {
    state: CursorState,
    inserted_at: Instant,
    /// Monotonic insertion order for capacity eviction
    sequence: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

pub struct CursorCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CursorCache {
    /// Create a cache with the default capacity and TTL.
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_CURSOR_CAPACITY,
            Duration::from_secs(DEFAULT_CURSOR_TTL_SECS),
        )
    }

    /// Create a cache with custom limits. A capacity of 0 is treated as 1.
    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    /// Create a cache with a custom time source.
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            ttl,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a cursor and return the newly minted token for it.
    pub async fn insert(&self, state: CursorState) -> String {
        let token = generate_page_token();
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        self.put(
            &mut inner,
            token.clone(),
            CacheEntry {
                state,
                inserted_at: now,
                sequence,
            },
            now,
        );
        token
    }

    /// Put a cursor back under the token it was taken from, so the client can
    /// retry a page whose fetch failed. Its original age is kept, so a cursor
    /// that expired in the meantime is dropped.
    pub async fn reinstate(&self, token: &str, cursor: TakenCursor) {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        let entry = CacheEntry {
            state: cursor.state,
            inserted_at: cursor.inserted_at,
            sequence: cursor.sequence,
        };
        if self.is_expired(&entry, now) {
            debug!(page_token = %token, "Page token expired before it could be reinstated");
            return;
        }
        self.put(&mut inner, token.to_string(), entry, now);
    }

    /// Atomically look up and consume a cursor.
    ///
    /// Returns `None` when the token is unknown or expired, or when it was
    /// minted for a different scope. A mismatched entry is left in place for
    /// its rightful owner.
    pub async fn take(&self, token: &str, scope: &ScopeKey) -> Option<TakenCursor> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        let entry = inner.entries.get(token)?;
        if self.is_expired(entry, now) {
            inner.entries.remove(token);
            debug!(page_token = %token, "Page token expired");
            return None;
        }
        if entry.state.scope != *scope {
            warn!(
                page_token = %token,
                "Page token is for a different database, filter, or metadata setting. \
                 Ignoring token and starting from beginning."
            );
            return None;
        }

        inner.entries.remove(token).map(|entry| TakenCursor {
            state: entry.state,
            inserted_at: entry.inserted_at,
            sequence: entry.sequence,
        })
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) <= self.ttl);
        before - inner.entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start a background task that periodically purges expired cursors.
    ///
    /// This should be called once when the server starts.
    pub fn start_cleanup_task(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired().await;
                if removed > 0 {
                    debug!(removed = removed, "Purged expired page tokens");
                }
            }
        });
    }

    /// Insert an entry, then evict the oldest insertions while over capacity.
    fn put(&self, inner: &mut CacheInner, token: String, entry: CacheEntry, now: Instant) {
        inner
            .entries
            .retain(|_, existing| !self.is_expired(existing, now));
        inner.entries.insert(token, entry);

        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, existing)| existing.sequence)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(evicted) => {
                    inner.entries.remove(&evicted);
                    debug!(page_token = %evicted, "Evicted oldest page token at capacity");
                }
                None => break,
            }
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) > self.ttl
    }
}

impl Default for CursorCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a unique, unguessable page token.
fn generate_page_token() -> String {
    format!("pt_{}", uuid::Uuid::new_v4().simple())
}
