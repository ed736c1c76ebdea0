pub mod keys;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{EngineError, ProviderError};

const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

type ComputeFuture = Shared<BoxFuture<'static, Result<Value, ProviderError>>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

struct PendingRequest {
    id: u64,
    waiters: usize,
    future: ComputeFuture,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub dedup_joins: u64,
    pub failures: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    pending: HashMap<String, PendingRequest>,
    next_id: u64,
    stats: CacheStats,
}

impl CacheState {
    fn live_value(&mut self, key: &str, now: Instant) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.is_live(now) {
            return Some(entry.value.clone());
        }
        self.entries.remove(key);
        debug!(key, "cache entry expired");
        None
    }
}

/// TTL cache in front of expensive generation calls.
///
/// Concurrent requests for the same key share a single in-flight computation. Failures are
/// handed to every waiter and never cached. The pending entry for a key is removed when its
/// computation settles, or when every request waiting on it has been dropped.
#[derive(Clone, Default)]
pub struct ResponseCache {
    state: Arc<Mutex<CacheState>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value for `key`, if any. Expired entries are discarded on the way.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().live_value(key, Instant::now())
    }

    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Value, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ProviderError>> + Send + 'static,
    {
        let (id, future) = {
            let mut state = self.state.lock();

            if let Some(value) = state.live_value(key, Instant::now()) {
                state.stats.hits += 1;
                debug!(key, "cache hit");
                return Ok(value);
            }

            let joined = state.pending.get_mut(key).map(|pending| {
                pending.waiters += 1;
                (pending.id, pending.future.clone())
            });

            match joined {
                Some(joined) => {
                    state.stats.dedup_joins += 1;
                    debug!(key, "joined in-flight generation");
                    joined
                }
                None => {
                    state.stats.misses += 1;
                    let id = state.next_id;
                    state.next_id += 1;

                    let future = settle(
                        Arc::clone(&self.state),
                        key.to_string(),
                        id,
                        ttl.min(MAX_TTL),
                        compute(),
                    )
                    .boxed()
                    .shared();

                    state.pending.insert(
                        key.to_string(),
                        PendingRequest {
                            id,
                            waiters: 1,
                            future: future.clone(),
                        },
                    );
                    debug!(key, "cache miss, generation started");
                    (id, future)
                }
            }
        };

        let mut guard = WaiterGuard {
            state: &self.state,
            key,
            id,
            settled: false,
        };
        let result = future.await;
        guard.settled = true;
        result
    }

    /// Typed variant of [`get_or_compute`](Self::get_or_compute); the value is stored as JSON.
    pub async fn get_or_compute_as<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let value = self
            .get_or_compute(key, ttl, move || {
                let typed = compute();
                async move {
                    let typed = typed.await?;
                    serde_json::to_value(typed)
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
                }
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.state.lock().entries.remove(key).is_some()
    }

    /// Drops every entry. In-flight generations finish for their waiters but are not stored.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.pending.clear();
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_live(now));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

/// Runs the computation and does the bookkeeping exactly once, whichever waiter drives it.
async fn settle<Fut>(
    state: Arc<Mutex<CacheState>>,
    key: String,
    id: u64,
    ttl: Duration,
    compute: Fut,
) -> Result<Value, ProviderError>
where
    Fut: Future<Output = Result<Value, ProviderError>>,
{
    let result = compute.await;

    let mut state = state.lock();
    let owns_key = state.pending.get(&key).is_some_and(|p| p.id == id);
    if owns_key {
        state.pending.remove(&key);
    }

    match &result {
        Ok(value) if owns_key => {
            let expires_at = Instant::now() + ttl;
            state.entries.insert(
                key.clone(),
                CacheEntry {
                    key,
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(_) => debug!(key = %key, "generation finished after cache was cleared"),
        Err(err) => {
            state.stats.failures += 1;
            warn!(key = %key, error = %err, "generation failed, not cached");
        }
    }

    result
}

struct WaiterGuard<'a> {
    state: &'a Mutex<CacheState>,
    key: &'a str,
    id: u64,
    settled: bool,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let Some(pending) = state.pending.get_mut(self.key) else {
            return;
        };
        if pending.id != self.id {
            return;
        }
        pending.waiters = pending.waiters.saturating_sub(1);
        if pending.waiters == 0 && !self.settled {
            state.pending.remove(self.key);
            debug!(key = self.key, "abandoned generation cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: Value,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Value, ProviderError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_is_cache_hit() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute("k", HOUR, counting(&calls, json!({"q": 1}), Duration::ZERO))
            .await
            .unwrap();
        let second = cache
            .get_or_compute("k", HOUR, counting(&calls, json!({"q": 2}), Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_calls_share_one_computation() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let delay = Duration::from_millis(50);

        let (a, b, c) = tokio::join!(
            cache.get_or_compute("k", HOUR, counting(&calls, json!(1), delay)),
            cache.get_or_compute("k", HOUR, counting(&calls, json!(2), delay)),
            cache.get_or_compute("k", HOUR, counting(&calls, json!(3), delay)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), json!(1));
        assert_eq!(b.unwrap(), json!(1));
        assert_eq!(c.unwrap(), json!(1));
        assert_eq!(cache.stats().dedup_joins, 2);
        assert_eq!(cache.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_recomputed() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        cache
            .get_or_compute("k", ttl, counting(&calls, json!(1), Duration::ZERO))
            .await
            .unwrap();
        tokio::time::advance(ttl + Duration::from_secs(1)).await;
        assert!(cache.get("k").is_none());

        let value = cache
            .get_or_compute("k", ttl, counting(&calls, json!(2), Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(value, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_not_cached() {
        let cache = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err::<Value, _>(ProviderError::Timeout)
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_compute("k", HOUR, failing(&calls)),
            cache.get_or_compute("k", HOUR, failing(&calls)),
        );

        assert_eq!(a.unwrap_err(), ProviderError::Timeout);
        assert_eq!(b.unwrap_err(), ProviderError::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.pending_len(), 0);
        assert!(cache.is_empty());

        let retry = cache
            .get_or_compute("k", HOUR, counting(&calls, json!("ok"), Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(retry, json!("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_generation_clears_pending_entry() {
        let cache = ResponseCache::new();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_compute("k", HOUR, || futures::future::pending()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cache.pending_len(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        let value = cache
            .get_or_compute("k", HOUR, counting(&calls, json!(7), Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(value, json!(7));
    }

    #[tokio::test]
    async fn test_typed_round_trip_and_purge() {
        let cache = ResponseCache::new();
        let words: Vec<String> = cache
            .get_or_compute_as("typed", Duration::ZERO, || async {
                Ok(vec!["a".to_string(), "b".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(words, vec!["a", "b"]);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }
}
