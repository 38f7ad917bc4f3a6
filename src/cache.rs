//! Shared query cache.
//!
//! [`QueryCache`] maps a [`RequestKey`] to a [`CacheEntry`] holding the
//! status, last good data, last error and write time for that key. It is an
//! ordinary value passed around as `Arc<QueryCache>`; nothing in the crate
//! keeps a global instance, so every test can start from an empty cache.
//!
//! # Guarantees
//!
//! - **Coalescing**: while a fetch for a key is in flight, further
//!   [`fetch`](QueryCache::fetch) calls for the same key join it instead of
//!   calling the network again. All joined callers observe the same value.
//! - **Freshness**: a successful entry younger than `stale_time` is served
//!   without any network activity.
//! - **Last fetch wins**: every fetch gets a sequence number. Only the
//!   result of the most recently started fetch for a key is written; a
//!   superseded fetch that finishes late is dropped.
//! - **Errors keep data**: a failed fetch records the error but leaves the
//!   previous successful data in place.
//! - **Bounded**: at most `capacity` keys are kept. The least recently used
//!   key is evicted first; a key with a fetch in flight is never evicted.
//!
//! The internal lock is never held across an `.await`.

use lru::LruCache;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::client::SearchError;
use crate::config::SearchConfig;
use crate::models::{RequestKey, SearchResponse};

pub type FetchResult = Result<Arc<SearchResponse>, SearchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No data yet; a request is in flight.
    Pending,
    Success,
    Error,
}

/// Snapshot of one key's state.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: QueryStatus,
    pub data: Option<Arc<SearchResponse>>,
    pub error: Option<SearchError>,
    /// Time of the last successful write; `None` once invalidated.
    pub updated_at: Option<Instant>,
    /// A fetch is running, possibly on top of existing data.
    pub fetching: bool,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            updated_at: None,
            fetching: false,
        }
    }
}

struct InFlight {
    seq: u64,
    cell: Arc<OnceCell<FetchResult>>,
}

#[derive(Default)]
struct Slot {
    entry: CacheEntry,
    in_flight: Option<InFlight>,
}

impl Slot {
    fn fresh(&self, now: Instant, stale_time: Duration) -> Option<Arc<SearchResponse>> {
        if self.entry.status != QueryStatus::Success {
            return None;
        }
        let updated_at = self.entry.updated_at?;
        if now.duration_since(updated_at) < stale_time {
            self.entry.data.clone()
        } else {
            None
        }
    }
}

pub const DEFAULT_CAPACITY: usize = 256;

pub struct QueryCache {
    // Unbounded on its own; `evict` enforces `capacity` so in-flight slots survive.
    slots: Mutex<LruCache<RequestKey, Slot>>,
    stale_time: Duration,
    capacity: usize,
    next_seq: AtomicU64,
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self::with_capacity(stale_time, DEFAULT_CAPACITY)
    }

    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(stale_time: Duration, capacity: usize) -> Self {
        Self {
            slots: Mutex::new(LruCache::unbounded()),
            stale_time,
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn shared(stale_time: Duration) -> Arc<Self> {
        Arc::new(Self::new(stale_time))
    }

    pub fn from_config(config: &SearchConfig) -> Arc<Self> {
        Arc::new(Self::with_capacity(
            config.stale_time(),
            config.cache_capacity,
        ))
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<RequestKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict(&self, slots: &mut LruCache<RequestKey, Slot>) {
        while slots.len() > self.capacity {
            let victim = slots
                .iter()
                .rev()
                .find(|(_, slot)| slot.in_flight.is_none())
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                break;
            };
            debug!(query = %victim.query, offset = victim.offset, "evicting cached search");
            slots.pop(&victim);
        }
    }

    /// Return fresh data for `key`, join the fetch already in flight for it,
    /// or start a new one with `fetcher`.
    pub async fn fetch<F, Fut>(&self, key: &RequestKey, fetcher: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SearchResponse, SearchError>>,
    {
        let (seq, cell) = {
            let mut slots = self.lock();
            let slot = slots.get_or_insert_mut(key.clone(), Slot::default);
            if let Some(data) = slot.fresh(Instant::now(), self.stale_time) {
                debug!(query = %key.query, offset = key.offset, "search served from cache");
                return Ok(data);
            }
            let joined = slot
                .in_flight
                .as_ref()
                .map(|flight| (flight.seq, flight.cell.clone()));
            let started = match joined {
                Some((seq, cell)) => {
                    debug!(query = %key.query, offset = key.offset, seq, "joining in-flight search");
                    (seq, cell)
                }
                None => self.start(slot, key),
            };
            self.evict(&mut slots);
            started
        };
        self.settle(key, seq, cell, fetcher).await
    }

    /// Start a new fetch for `key` regardless of freshness or of a fetch
    /// already in flight; the new fetch supersedes it.
    pub async fn refetch<F, Fut>(&self, key: &RequestKey, fetcher: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SearchResponse, SearchError>>,
    {
        let (seq, cell) = {
            let mut slots = self.lock();
            let slot = slots.get_or_insert_mut(key.clone(), Slot::default);
            let started = self.start(slot, key);
            self.evict(&mut slots);
            started
        };
        self.settle(key, seq, cell, fetcher).await
    }

    fn start(&self, slot: &mut Slot, key: &RequestKey) -> (u64, Arc<OnceCell<FetchResult>>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let cell = Arc::new(OnceCell::new());
        slot.in_flight = Some(InFlight {
            seq,
            cell: cell.clone(),
        });
        slot.entry.fetching = true;
        if slot.entry.data.is_none() {
            slot.entry.status = QueryStatus::Pending;
        }
        debug!(query = %key.query, offset = key.offset, seq, "starting search fetch");
        (seq, cell)
    }

    async fn settle<F, Fut>(
        &self,
        key: &RequestKey,
        seq: u64,
        cell: Arc<OnceCell<FetchResult>>,
        fetcher: F,
    ) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SearchResponse, SearchError>>,
    {
        let result = cell
            .get_or_init(|| async move { fetcher().await.map(Arc::new) })
            .await
            .clone();
        self.complete(key, seq, &result);
        result
    }

    fn complete(&self, key: &RequestKey, seq: u64, result: &FetchResult) {
        let mut slots = self.lock();
        let Some(slot) = slots.peek_mut(key) else {
            return;
        };
        let current = slot.in_flight.as_ref().is_some_and(|f| f.seq == seq);
        if !current {
            // already written by a joined caller, or superseded by a refetch
            return;
        }
        slot.in_flight = None;
        slot.entry.fetching = false;
        match result {
            Ok(data) => {
                slot.entry.status = QueryStatus::Success;
                slot.entry.data = Some(data.clone());
                slot.entry.error = None;
                slot.entry.updated_at = Some(Instant::now());
            }
            Err(err) => {
                slot.entry.status = QueryStatus::Error;
                slot.entry.error = Some(err.clone());
            }
        }
        // slots that were in flight may have held the map over capacity
        self.evict(&mut slots);
    }

    /// Snapshot of `key`'s entry. Does not count as a use for eviction.
    pub fn get(&self, key: &RequestKey) -> Option<CacheEntry> {
        self.lock().peek(key).map(|slot| slot.entry.clone())
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.lock().contains(key)
    }

    /// Mark `key` stale so the next [`fetch`](Self::fetch) goes to the network.
    pub fn invalidate(&self, key: &RequestKey) {
        if let Some(slot) = self.lock().peek_mut(key) {
            slot.entry.updated_at = None;
        }
    }

    /// Drop `key`. A fetch still in flight for it completes without writing.
    pub fn remove(&self, key: &RequestKey) -> Option<CacheEntry> {
        self.lock().pop(key).map(|slot| slot.entry)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::response;
    use std::sync::atomic::AtomicUsize;

    fn key(q: &str) -> RequestKey {
        RequestKey::new(q, 10, 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_keys_coalesce() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let k = key("cellline");

        let fetcher = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(response("cellline", 1))
        };

        let (a, b) = tokio::join!(cache.fetch(&k, fetcher), cache.fetch(&k, fetcher));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b), "both callers see the same value");
        assert_eq!(cache.get(&k).unwrap().status, QueryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_served_without_network() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let k = key("atac");
        let fetcher = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(response("atac", 2))
        };

        cache.fetch(&k, fetcher).await.unwrap();
        cache.fetch(&k, fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.fetch(&k, fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "stale entry refetched");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_ignores_freshness() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let k = key("atac");
        let fetcher = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(response("atac", 1))
        };

        cache.fetch(&k, fetcher).await.unwrap();
        cache.refetch(&k, fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_network() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let k = key("atac");
        let fetcher = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(response("atac", 1))
        };

        cache.fetch(&k, fetcher).await.unwrap();
        cache.invalidate(&k);
        cache.fetch(&k, fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_retains_previous_data() {
        let cache = QueryCache::new(Duration::ZERO);
        let k = key("atac");

        cache
            .fetch(&k, || async { Ok(response("atac", 3)) })
            .await
            .unwrap();
        let err = cache
            .fetch(&k, || async {
                Err(SearchError::Status {
                    status: 500,
                    body: "boom".into(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.data.unwrap().results.len(), 3);
        assert!(entry.error.is_some());
        assert!(!entry.fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_does_not_overwrite() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let k = key("cellline");

        let slow = cache.fetch(&k, || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(response("cellline", 1))
        });
        let fast = cache.refetch(&k, || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(response("cellline", 4))
        });
        let (old, new) = tokio::join!(slow, fast);

        assert_eq!(old.unwrap().results.len(), 1);
        assert_eq!(new.unwrap().results.len(), 4);
        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.data.unwrap().results.len(), 4, "newest fetch wins");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_status_while_in_flight() {
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        let k = key("slow");

        let task = {
            let cache = cache.clone();
            let k = k.clone();
            tokio::spawn(async move {
                cache
                    .fetch(&k, || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(response("slow", 1))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.status, QueryStatus::Pending);
        assert!(entry.fetching);
        assert!(entry.data.is_none());

        task.await.unwrap().unwrap();
        assert_eq!(cache.get(&k).unwrap().status, QueryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_clear() {
        let cache = QueryCache::new(Duration::from_secs(60));
        assert!(cache.is_empty());
        assert!(cache.remove(&key("x")).is_none());

        for q in ["a", "b"] {
            cache
                .fetch(&key(q), || async move { Ok(response(q, 1)) })
                .await
                .unwrap();
        }
        assert!(cache.contains(&key("a")));

        let removed = cache.remove(&key("a")).unwrap();
        assert_eq!(removed.data.unwrap().query, "a");
        assert!(!cache.contains(&key("a")));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_bounded_by_capacity() {
        let cache = QueryCache::with_capacity(Duration::from_millis(1), 8);

        for i in 0..500 {
            let q = format!("query-{}", i);
            let k = key(&q);
            cache
                .fetch(&k, || async move { Ok(response(&q, 1)) })
                .await
                .unwrap();
            tokio::time::advance(Duration::from_millis(5)).await;
        }

        assert_eq!(cache.len(), 8);
        assert!(cache.contains(&key("query-499")));
        assert!(!cache.contains(&key("query-0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_used_key_evicted_first() {
        let cache = QueryCache::with_capacity(Duration::from_secs(60), 2);
        let shared = &cache;
        let fetch = move |q: &'static str| async move {
            shared
                .fetch(&key(q), || async move { Ok(response(q, 1)) })
                .await
                .unwrap()
        };

        fetch("a").await;
        fetch("b").await;
        fetch("a").await;
        fetch("c").await;

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_key_survives_eviction() {
        let cache = Arc::new(QueryCache::with_capacity(Duration::from_secs(60), 1));
        let slow = key("slow");

        let task = {
            let cache = cache.clone();
            let slow = slow.clone();
            tokio::spawn(async move {
                cache
                    .fetch(&slow, || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(response("slow", 2))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        cache
            .fetch(&key("fast"), || async { Ok(response("fast", 1)) })
            .await
            .unwrap();
        assert!(cache.contains(&slow), "in-flight key kept over capacity");
        assert!(!cache.contains(&key("fast")));

        task.await.unwrap().unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&slow).unwrap().status, QueryStatus::Success);
    }
}
