//! In-flight deduplication for GET requests.
//!
//! Entries live for a fixed TTL counted from the moment the request was
//! issued. Expiry is checked lazily on lookup and expired entries are swept
//! whenever a new entry is inserted, so the map never holds timers.

use std::{
    collections::HashMap,
    future::Future,
    time::{Duration, Instant},
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ClientError;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(3000);

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, ClientError>>>;

struct CacheEntry<T: Clone> {
    fetch: SharedFetch<T>,
    expires_at: Instant,
    generation: u64,
}

struct CacheState<T: Clone> {
    entries: HashMap<String, CacheEntry<T>>,
    next_generation: u64,
}

impl<T: Clone> CacheState<T> {
    fn sweep(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

pub struct FetchCache<T: Clone> {
    ttl: Duration,
    inner: Mutex<CacheState<T>>,
}

impl<T> FetchCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the outcome of the live request for `key`, starting one with
    /// `fetch` when there is none. Callers that arrive while an entry is live
    /// await the same future and never trigger a second request.
    ///
    /// A failed request is evicted as soon as it resolves so the next call
    /// goes back to the network.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let (shared, generation) = {
            let mut state = self.inner.lock().await;
            let now = Instant::now();
            match state.entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    debug!(key, "fetch cache hit");
                    (entry.fetch.clone(), entry.generation)
                }
                _ => {
                    state.sweep(now);
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    let shared = fetch().boxed().shared();
                    state.entries.insert(
                        key.to_string(),
                        CacheEntry {
                            fetch: shared.clone(),
                            expires_at: now + self.ttl,
                            generation,
                        },
                    );
                    debug!(key, generation, "fetch cache miss");
                    (shared, generation)
                }
            }
        };

        let result = shared.await;
        if result.is_err() {
            self.evict(key, generation).await;
        }
        result
    }

    pub async fn invalidate_all(&self) {
        let mut state = self.inner.lock().await;
        if !state.entries.is_empty() {
            debug!(entries = state.entries.len(), "fetch cache invalidated");
        }
        state.entries.clear();
    }

    /// Number of entries that have not yet expired.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .lock()
            .await
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // Only the entry created by the failed fetch is removed; a newer request
    // stored under the same key stays.
    async fn evict(&self, key: &str, generation: u64) {
        let mut state = self.inner.lock().await;
        if state
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            state.entries.remove(key);
            debug!(key, generation, "evicted failed fetch");
        }
    }
}

impl<T> Default for FetchCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
