//! Keyed cache of server responses with per-entry staleness.
//!
//! Each entry carries its own staleness window; a fresh entry is returned
//! without touching the network, a stale or missing one triggers exactly one
//! fetch even under concurrent callers (request coalescing through a per-key
//! fetch lock). Invalidation marks entries stale without evicting them, so
//! the previous value stays readable through [`QueryCache::peek`] until the
//! re-fetch completes. A background sweep evicts entries idle past a longer
//! garbage-collection horizon to bound memory.
//!
//! Invalidation is ordered by a logical clock rather than wall time: every
//! fetch records the clock value it started under, and an invalidation that
//! ticks the clock afterwards marks the entry stale even if the response
//! lands later. A mutation racing an in-flight listing fetch therefore
//! cannot be silently undone by the stale response.
//!
//! Staleness timestamps use `tokio::time::Instant` so tests can run under
//! paused time.

use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::gateway::GatewayError;

/// Cache key made of ordered segments, e.g. `products/list/0/20/-`.
///
/// Prefix invalidation is segment-aware: `products` matches
/// `products/search/desk` but not `productsx/anything`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<Value>,
    fetched_at: Instant,
    stale_after: Duration,
    last_access: Instant,
    /// Invalidation-clock value observed when the producing fetch started.
    epoch: u64,
}

/// Per-key coalescing state. The async mutex serializes fetches for the
/// key; the guarded slot holds the most recent attempt's failure so queued
/// waiters share it instead of re-fetching. `attempts` counts completed
/// fetches and is readable without the lock.
#[derive(Default)]
struct FetchSlot {
    attempts: AtomicU64,
    gate: Mutex<Option<GatewayError>>,
}

/// Keyed cache of opaque JSON payloads with request coalescing.
pub struct QueryCache {
    entries: DashMap<QueryKey, CacheEntry>,
    /// Per-key fetch slots. Concurrent callers for the same key queue on the
    /// gate; whoever wins fetches, the rest re-check freshness and reuse the
    /// stored result (or the winner's failure).
    fetch_locks: DashMap<QueryKey, Arc<FetchSlot>>,
    /// Latest invalidation tick per prefix.
    invalidations: DashMap<QueryKey, u64>,
    clock: AtomicU64,
    gc_horizon: Duration,
}

impl QueryCache {
    pub fn new(gc_horizon: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            fetch_locks: DashMap::new(),
            invalidations: DashMap::new(),
            clock: AtomicU64::new(0),
            gc_horizon,
        }
    }

    /// Return the cached value if fresh, otherwise run `fetcher` exactly once
    /// (even under concurrent callers for the same key) and cache the result.
    ///
    /// A failed fetch leaves any existing entry untouched; callers queued
    /// behind it receive the same failure rather than re-fetching.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &QueryKey,
        stale_after: Duration,
        fetcher: F,
    ) -> Result<Arc<Value>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, GatewayError>>,
    {
        if let Some(value) = self.fresh_value(key) {
            return Ok(value);
        }

        let slot = self
            .fetch_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(FetchSlot::default()))
            .clone();
        let observed = slot.attempts.load(Ordering::SeqCst);
        let mut last_error = slot.gate.lock().await;

        // Re-check under the lock: a concurrent caller may have completed
        // the fetch while we were queued.
        if let Some(value) = self.fresh_value(key) {
            return Ok(value);
        }

        // A fetch finished while we queued yet left no fresh entry. Share
        // its failure instead of sending another request at a server that
        // just errored.
        if slot.attempts.load(Ordering::SeqCst) != observed {
            if let Some(e) = last_error.clone() {
                return Err(e);
            }
        }

        // An invalidation arriving while the fetch is in flight ticks the
        // clock past this epoch and the landed entry is already stale.
        let epoch = self.clock.load(Ordering::SeqCst);

        debug!(key = %key, "Cache miss, fetching");
        let result = fetcher().await;
        slot.attempts.fetch_add(1, Ordering::SeqCst);
        match result {
            Ok(value) => {
                let value = Arc::new(value);
                let now = Instant::now();
                self.entries.insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        fetched_at: now,
                        stale_after,
                        last_access: now,
                        epoch,
                    },
                );
                *last_error = None;
                Ok(value)
            }
            Err(e) => {
                *last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Current value for the key regardless of staleness, if present.
    ///
    /// Lets callers keep showing the previous page while a re-fetch after
    /// invalidation is still in flight.
    pub fn peek(&self, key: &QueryKey) -> Option<Arc<Value>> {
        self.entries.get_mut(key).map(|mut entry| {
            entry.last_access = Instant::now();
            entry.value.clone()
        })
    }

    /// Overwrite an entry with a canonical value and reset its age.
    ///
    /// Used after a mutation returns the updated resource, avoiding a
    /// round-trip re-fetch. The entry observes the current clock, so it
    /// stays fresh across invalidations that happened before the write.
    pub fn set(&self, key: QueryKey, value: Value, stale_after: Duration) {
        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::new(value),
                fetched_at: now,
                stale_after,
                last_access: now,
                epoch: self.clock.load(Ordering::SeqCst),
            },
        );
    }

    /// Mark every entry under `prefix` stale without evicting it.
    ///
    /// Returns the number of entries that were fresh before the call.
    /// Idempotent: repeating the call changes nothing further.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let now = Instant::now();
        let marked = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && self.is_fresh(entry.key(), entry.value(), now))
            .count();

        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.invalidations.insert(prefix.clone(), tick);

        if marked > 0 {
            debug!(prefix = %prefix, marked, "Invalidated cache entries");
        }
        marked
    }

    /// Evict entries that have not been accessed within the GC horizon.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_access) < self.gc_horizon);
        // A slot with outstanding clones belongs to an in-flight fetch for a
        // key with no entry yet; dropping it would break coalescing.
        self.fetch_locks
            .retain(|key, slot| self.entries.contains_key(key) || Arc::strong_count(slot) > 1);
        before - self.entries.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn fresh_value(&self, key: &QueryKey) -> Option<Arc<Value>> {
        let now = Instant::now();
        let mut entry = self.entries.get_mut(key)?;
        if self.is_fresh(key, &entry, now) {
            entry.last_access = now;
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn is_fresh(&self, key: &QueryKey, entry: &CacheEntry, now: Instant) -> bool {
        if now.duration_since(entry.fetched_at) >= entry.stale_after {
            return false;
        }
        // Stale if any matching prefix was invalidated after the fetch began.
        !self
            .invalidations
            .iter()
            .any(|inv| key.starts_with(inv.key()) && *inv.value() > entry.epoch)
    }
}

/// Run the idle-entry sweep on an interval.
pub fn spawn_gc_task(cache: Arc<QueryCache>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let evicted = cache.evict_idle();
            if evicted > 0 {
                debug!(evicted, remaining = cache.entry_count(), "Cache sweep complete");
            }
        }
    });
}
