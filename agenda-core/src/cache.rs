//! Read-through TTL cache with in-flight request coalescing.
//!
//! Every store read issued by a loader goes through a [`TimedCache`]. Entries
//! expire after a fixed TTL, and concurrent [`TimedCache::remember`] calls for
//! the same key share a single load instead of each hitting the store.
//!
//! Time comes from `tokio::time::Instant`, so tests can pause and advance the
//! clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::error::AgendaResult;

type PendingLoad<V> = Shared<BoxFuture<'static, AgendaResult<V>>>;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    pending: HashMap<String, PendingLoad<V>>,
}

/// TTL cache keyed by string.
pub struct TimedCache<V> {
    ttl: Duration,
    state: Mutex<CacheState<V>>,
}

impl<V> TimedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        TimedCache {
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> AgendaResult<Self> {
        Ok(Self::new(config.ttl()?))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        // The state is plain maps; a panic elsewhere can't leave it half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a fresh value. Stale entries are evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        Self::fresh(&mut state, key, self.ttl)
    }

    fn fresh(state: &mut CacheState<V>, key: &str, ttl: Duration) -> Option<V> {
        let entry = state.entries.get(key)?;
        if entry.stored_at.elapsed() > ttl {
            tracing::trace!(key, "Cache entry expired");
            state.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: &str, value: V) {
        self.lock().entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Remove a key. An in-flight load for it will not be cached when it settles.
    pub fn delete(&self, key: &str) {
        let mut state = self.lock();
        state.entries.remove(key);
        state.pending.remove(key);
    }

    /// Remove every key starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut state = self.lock();
        state.entries.retain(|k, _| !k.starts_with(prefix));
        state.pending.retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, or load it.
    ///
    /// If a load for `key` is already running, this waits on that load instead
    /// of starting another one. A successful result is cached; a failed one is
    /// not, and the next call retries.
    ///
    /// `loader` is called while the cache lock is held, so it should only build
    /// the future and must not touch this cache itself.
    pub async fn remember<F, Fut>(&self, key: &str, loader: F) -> AgendaResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AgendaResult<V>> + Send + 'static,
    {
        let load = {
            let mut state = self.lock();
            if let Some(value) = Self::fresh(&mut state, key, self.ttl) {
                tracing::debug!(key, "Cache hit");
                return Ok(value);
            }

            match state.pending.get(key) {
                Some(pending) => {
                    tracing::debug!(key, "Joining in-flight load");
                    pending.clone()
                }
                None => {
                    tracing::debug!(key, "Cache miss, loading");
                    let pending = loader().boxed().shared();
                    state.pending.insert(key.to_string(), pending.clone());
                    pending
                }
            }
        };

        let result = load.clone().await;
        self.settle(key, &load, &result);
        result
    }

    /// Clear the in-flight marker for `load` and cache its value. Only the first
    /// waiter to get here does anything; a `delete` in the meantime wins.
    fn settle(&self, key: &str, load: &PendingLoad<V>, result: &AgendaResult<V>) {
        let mut state = self.lock();
        let is_current = state
            .pending
            .get(key)
            .is_some_and(|pending| pending.ptr_eq(load));
        if !is_current {
            return;
        }

        state.pending.remove(key);
        match result {
            Ok(value) => {
                state.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        stored_at: Instant::now(),
                    },
                );
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache load failed, not caching");
            }
        }
    }
}

impl<V> std::fmt::Debug for TimedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedCache").field("ttl", &self.ttl).finish()
    }
}
