// ── Query cache ──
//
// Keyed store of async query results with request coalescing and
// stale-while-revalidate reads. Values are type-erased so one cache can
// hold every resource; typed accessors downcast on the way out.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use super::key::CacheKey;
use super::stream::QueryStream;
use crate::error::CoreError;

type Erased = Arc<dyn Any + Send + Sync>;
type FetchFuture = BoxFuture<'static, Result<Option<Erased>, CoreError>>;
type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, ()>>;

/// Outcome of the most recent write to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueryStatus {
    Loading,
    Success,
    Error,
}

/// Typed view of one cache entry.
#[derive(Debug, PartialEq)]
pub struct CacheEntry<T> {
    pub key: CacheKey,
    /// Last successfully fetched or event-merged value.
    /// `None` while loading, after a failed first fetch, or when the
    /// resource is known to be absent.
    pub data: Option<Arc<T>>,
    pub status: QueryStatus,
    /// Message of the last failed fetch; cleared by the next success.
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Marked stale by [`QueryCache::invalidate`].
    pub invalidated: bool,
    /// A fetch for this key is in flight.
    pub fetching: bool,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            updated_at: self.updated_at,
            invalidated: self.invalidated,
            fetching: self.fetching,
        }
    }
}

#[derive(Clone)]
pub(crate) struct RawEntry {
    data: Option<Erased>,
    status: QueryStatus,
    error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    refreshed_at: Option<Instant>,
    invalidated: bool,
    /// Bumped by every invalidation; a fetch only clears `invalidated`
    /// when no invalidation landed after it started.
    epoch: u64,
    fetching: bool,
}

impl RawEntry {
    fn loading() -> Self {
        Self {
            data: None,
            status: QueryStatus::Loading,
            error: None,
            updated_at: None,
            refreshed_at: None,
            invalidated: false,
            epoch: 0,
            fetching: false,
        }
    }

    fn succeed(&mut self, data: Option<Erased>) {
        self.data = data;
        self.status = QueryStatus::Success;
        self.error = None;
        self.updated_at = Some(Utc::now());
        self.refreshed_at = Some(Instant::now());
        self.invalidated = false;
    }

    fn invalidate(&mut self) {
        self.invalidated = true;
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn is_stale(&self, fresh_for: Option<Duration>) -> bool {
        if self.invalidated {
            return true;
        }
        match (fresh_for, self.refreshed_at) {
            (Some(ttl), Some(at)) => at.elapsed() >= ttl,
            _ => false,
        }
    }

    pub(crate) fn typed<T: Send + Sync + 'static>(&self, key: &CacheKey) -> CacheEntry<T> {
        let data = self
            .data
            .clone()
            .and_then(|erased| match erased.downcast::<T>() {
                Ok(value) => Some(value),
                Err(_) => {
                    error!(
                        key = %key,
                        expected = std::any::type_name::<T>(),
                        "cache entry holds a value of a different type"
                    );
                    None
                }
            });
        CacheEntry {
            key: key.clone(),
            data,
            status: self.status,
            error: self.error.clone(),
            updated_at: self.updated_at,
            invalidated: self.invalidated,
            fetching: self.fetching,
        }
    }
}

struct Registration {
    fetcher: Fetcher,
    fresh_for: Option<Duration>,
    generation: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: DashMap<CacheKey, watch::Sender<Option<RawEntry>>>,
    registrations: DashMap<CacheKey, Registration>,
    in_flight: DashMap<CacheKey, InFlight>,
    next_generation: AtomicU64,
}

impl CacheInner {
    fn update(&self, key: &CacheKey, f: impl FnOnce(&mut RawEntry)) {
        let tx = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0);
        tx.send_modify(|slot| f(slot.get_or_insert_with(RawEntry::loading)));
    }

    fn complete(&self, key: &CacheKey, started: u64, result: Result<Option<Erased>, CoreError>) {
        match result {
            Ok(data) => {
                trace!(key = %key, present = data.is_some(), "query fetch succeeded");
                self.update(key, |entry| {
                    let invalidated_since = entry.invalidated && entry.epoch != started;
                    entry.succeed(data);
                    if invalidated_since {
                        debug!(key = %key, "invalidated during fetch, result stays stale");
                        entry.invalidated = true;
                    }
                    entry.fetching = false;
                });
            }
            Err(err) => {
                warn!(key = %key, error = %err, "query fetch failed, keeping last-known data");
                let message = err.to_string();
                self.update(key, |entry| {
                    entry.status = QueryStatus::Error;
                    entry.error = Some(message);
                    entry.fetching = false;
                });
            }
        }
        // Entry first: a reader arriving in between must not see an
        // empty entry with no fetch in flight.
        self.in_flight.remove(key);
    }
}

/// Shared, cloneable handle to the query cache.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Attach a fetch function to `key`.
    ///
    /// `fresh_for` bounds how long a successful result is served without
    /// revalidation; `None` keeps it fresh until invalidated. The fetch
    /// resolves to `Ok(None)` when the resource is known to be absent.
    /// Returns a generation for [`unregister`](Self::unregister).
    pub fn register<T, F, Fut>(&self, key: CacheKey, fresh_for: Option<Duration>, fetch: F) -> u64
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, CoreError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let pending = fetch();
            async move { Ok::<_, CoreError>(pending.await?.map(|value| Arc::new(value) as Erased)) }
                .boxed()
        });
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner.registrations.insert(
            key,
            Registration {
                fetcher,
                fresh_for,
                generation,
            },
        );
        generation
    }

    /// Detach the fetch function registered under `generation`.
    /// A newer registration for the same key is left in place.
    pub fn unregister(&self, key: &CacheKey, generation: u64) {
        self.inner
            .registrations
            .remove_if(key, |_, reg| reg.generation == generation);
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current entry without triggering any fetch.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let tx = self.inner.entries.get(key)?;
        tx.borrow().as_ref().map(|raw| raw.typed(key))
    }

    /// Read through the cache.
    ///
    /// With no successful result yet, waits for a fetch (joining one
    /// already in flight). A stale result is returned immediately while a
    /// background fetch revalidates it.
    pub async fn get<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let Some(fresh_for) = self.inner.registrations.get(key).map(|reg| reg.fresh_for) else {
            return self.peek(key);
        };

        match self.snapshot(key) {
            Some(raw) if raw.updated_at.is_some() => {
                if raw.is_stale(fresh_for) {
                    debug!(key = %key, "serving stale entry while revalidating");
                    self.revalidate(key);
                }
            }
            _ => {
                if let Some(fetch) = self.start_fetch(key) {
                    fetch.await;
                }
            }
        }
        self.peek(key)
    }

    /// Fetch regardless of freshness and wait for the result.
    /// Joins a fetch already in flight instead of starting a second one.
    pub async fn refresh<T: Send + Sync + 'static>(
        &self,
        key: &CacheKey,
    ) -> Option<CacheEntry<T>> {
        if let Some(fetch) = self.start_fetch(key) {
            fetch.await;
        }
        self.peek(key)
    }

    /// Subscribe to every write to `key`, including before it exists.
    pub fn subscribe<T: Send + Sync + 'static>(&self, key: &CacheKey) -> QueryStream<T> {
        let receiver = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();
        QueryStream::new(key.clone(), receiver)
    }

    /// Whether the next read of `key` would revalidate.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        let fresh_for = self
            .inner
            .registrations
            .get(key)
            .and_then(|reg| reg.fresh_for);
        self.snapshot(key)
            .is_some_and(|raw| raw.is_stale(fresh_for))
    }

    /// Keys currently holding an entry, in sorted order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .inner
            .entries
            .iter()
            .filter(|slot| slot.value().borrow().is_some())
            .map(|slot| slot.key().clone())
            .collect();
        keys.sort();
        keys
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Mark `key` stale so the next read revalidates it.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(tx) = self.inner.entries.get(key) {
            tx.send_if_modified(|slot| match slot {
                Some(entry) if !entry.invalidated || entry.fetching => {
                    entry.invalidate();
                    true
                }
                _ => false,
            });
        }
    }

    pub fn invalidate_all(&self) {
        let keys: Vec<CacheKey> = self.inner.entries.iter().map(|e| e.key().clone()).collect();
        for key in &keys {
            self.invalidate(key);
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace the value at `key` without fetching.
    pub(crate) fn set<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) {
        let data: Erased = Arc::new(value);
        self.inner.update(key, |entry| entry.succeed(Some(data)));
    }

    /// Record that the resource at `key` is known to be absent.
    pub(crate) fn set_empty(&self, key: &CacheKey) {
        self.inner.update(key, |entry| entry.succeed(None));
    }

    /// Drop the entry at `key`; subscribers observe `None` and the next
    /// read fetches from scratch.
    pub(crate) fn clear(&self, key: &CacheKey) {
        if let Some(tx) = self.inner.entries.get(key) {
            tx.send_replace(None);
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn snapshot(&self, key: &CacheKey) -> Option<RawEntry> {
        self.inner.entries.get(key).and_then(|tx| tx.borrow().clone())
    }

    fn revalidate(&self, key: &CacheKey) {
        if self.start_fetch(key).is_none() {
            trace!(key = %key, "no fetcher registered, skipping revalidation");
        }
    }

    /// Start a fetch for `key`, or return the one already in flight.
    fn start_fetch(&self, key: &CacheKey) -> Option<InFlight> {
        let fetcher = self
            .inner
            .registrations
            .get(key)
            .map(|reg| Arc::clone(&reg.fetcher))?;

        let fetch = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(slot) => return Some(slot.get().clone()),
            Entry::Vacant(slot) => {
                // Flag the entry while the in-flight slot is still locked,
                // so no joiner can complete the fetch before it is marked.
                let mut started = 0;
                self.inner.update(key, |entry| {
                    entry.fetching = true;
                    started = entry.epoch;
                });
                let inner = Arc::clone(&self.inner);
                let owned_key = key.clone();
                let fetch = async move {
                    let result = fetcher().await;
                    inner.complete(&owned_key, started, result);
                }
                .boxed()
                .shared();
                slot.insert(fetch.clone());
                fetch
            }
        };

        tokio::spawn(fetch.clone());
        Some(fetch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize};

    use futures_util::future::join_all;
    use tokio::sync::Notify;

    use super::*;
    use crate::cache_key;

    fn counting(cache: &QueryCache, key: &CacheKey, fresh_for: Option<Duration>) -> Arc<AtomicU32> {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        cache.register(key.clone(), fresh_for, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, CoreError>(Some(n)) }
        });
        calls
    }

    fn value(entry: Option<CacheEntry<u32>>) -> Option<u32> {
        entry.and_then(|e| e.data.map(|v| *v))
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let (counter, release) = (Arc::clone(&calls), Arc::clone(&gate));
        cache.register(key.clone(), None, move || {
            let (counter, release) = (Arc::clone(&counter), Arc::clone(&release));
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                release.notified().await;
                Ok::<_, CoreError>(Some(7_u32))
            }
        });

        let reads = join_all((0..10).map(|_| cache.get::<u32>(&key)));
        let open = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (entries, ()) = tokio::join!(reads, open);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(entries.len(), 10);
        for entry in entries {
            assert_eq!(value(entry), Some(7));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_served_while_revalidating() {
        let cache = QueryCache::new();
        let key = cache_key!["champion-mastery"];
        let calls = counting(&cache, &key, Some(Duration::from_secs(60)));

        assert_eq!(value(cache.get(&key).await), Some(1));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(value(cache.get(&key).await), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.is_stale(&key));
        // Stale value comes back at once; the refetch runs behind it.
        assert_eq!(value(cache.get(&key).await), Some(1));
        assert_eq!(value(cache.refresh(&key).await), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_freshness_window_means_fresh_until_invalidated() {
        let cache = QueryCache::new();
        let key = cache_key!["gameflow-phase"];
        let calls = counting(&cache, &key, None);

        assert_eq!(value(cache.get(&key).await), Some(1));
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(value(cache.get(&key).await), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key);
        assert!(cache.peek::<u32>(&key).unwrap().invalidated);
        assert_eq!(value(cache.get(&key).await), Some(1));
        assert_eq!(value(cache.refresh(&key).await), Some(2));
        assert!(!cache.is_stale(&key));
    }

    #[tokio::test]
    async fn invalidation_during_fetch_survives_its_result() {
        let cache = QueryCache::new();
        let key = cache_key!["gameflow-phase"];
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Notify::new());

        let (counter, release) = (Arc::clone(&calls), Arc::clone(&gate));
        cache.register(key.clone(), None, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let release = Arc::clone(&release);
            async move {
                if n == 2 {
                    release.notified().await;
                }
                Ok::<_, CoreError>(Some(n))
            }
        });
        assert_eq!(value(cache.get(&key).await), Some(1));

        let pending = tokio::spawn({
            let (cache, key) = (cache.clone(), key.clone());
            async move { cache.refresh::<u32>(&key).await }
        });
        while !cache.peek::<u32>(&key).unwrap().fetching {
            tokio::task::yield_now().await;
        }
        cache.invalidate(&key);
        gate.notify_one();

        // The older result is written but stays marked stale.
        let landed = pending.await.unwrap().unwrap();
        assert_eq!(landed.data.as_deref(), Some(&2));
        assert!(landed.invalidated);
        assert!(!landed.fetching);
        assert!(cache.is_stale(&key));

        assert_eq!(value(cache.get(&key).await), Some(2));
        assert_eq!(value(cache.refresh(&key).await), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!cache.is_stale(&key));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fetching_flag_settles_after_concurrent_refreshes() {
        let cache = QueryCache::new();
        let key = cache_key!["champion-mastery"];
        counting(&cache, &key, None);

        for _ in 0..50 {
            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let (cache, key) = (cache.clone(), key.clone());
                    tokio::spawn(async move { cache.refresh::<u32>(&key).await })
                })
                .collect();
            for task in join_all(tasks).await {
                task.unwrap();
            }
            assert!(!cache.peek::<u32>(&key).unwrap().fetching);
        }
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_data() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        cache.register(key.clone(), None, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(Some(1_u32))
                } else {
                    Err(CoreError::Fetch {
                        message: "host restarting".into(),
                        status: Some(503),
                    })
                }
            }
        });

        assert_eq!(value(cache.get(&key).await), Some(1));
        let entry = cache.refresh::<u32>(&key).await.unwrap();
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.data.as_deref(), Some(&1));
        assert!(entry.error.unwrap().contains("host restarting"));
        assert!(!entry.fetching);
    }

    #[tokio::test]
    async fn failed_first_fetch_is_retried_on_next_read() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        cache.register(key.clone(), None, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(CoreError::HostUnavailable {
                        reason: "connection refused".into(),
                    })
                } else {
                    Ok(Some(5_u32))
                }
            }
        });

        let first = cache.get::<u32>(&key).await.unwrap();
        assert_eq!(first.status, QueryStatus::Error);
        assert!(first.data.is_none());

        assert_eq!(value(cache.get(&key).await), Some(5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_resource_is_success_without_data() {
        let cache = QueryCache::new();
        let key = cache_key!["gameflow-phase"];
        cache.register(key.clone(), None, || async { Ok::<Option<u32>, CoreError>(None) });

        let entry = cache.get::<u32>(&key).await.unwrap();
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(entry.data.is_none());
        assert!(entry.updated_at.is_some());
    }

    #[tokio::test]
    async fn direct_writes_skip_the_fetcher() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        let calls = counting(&cache, &key, None);

        cache.set(&key, 42_u32);
        assert_eq!(value(cache.get(&key).await), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_key_is_peek_only() {
        let cache = QueryCache::new();
        let key = cache_key!["nothing"];
        assert!(cache.get::<u32>(&key).await.is_none());
        assert!(cache.refresh::<u32>(&key).await.is_none());
    }

    #[tokio::test]
    async fn unregister_respects_generation() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        let old = cache.register(key.clone(), None, || async { Ok::<_, CoreError>(Some(1_u32)) });
        cache.register(key.clone(), None, || async { Ok::<_, CoreError>(Some(2_u32)) });

        cache.unregister(&key, old);
        assert_eq!(value(cache.get(&key).await), Some(2));
    }

    #[tokio::test]
    async fn subscribers_see_writes_and_clear() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        let mut stream = cache.subscribe::<u32>(&key);
        assert!(stream.current().is_none());
        assert!(cache.keys().is_empty());

        cache.set(&key, 5_u32);
        let snap = stream.changed().await.unwrap();
        assert_eq!(value(snap), Some(5));
        assert_eq!(cache.keys(), vec![key.clone()]);

        cache.clear(&key);
        assert!(stream.changed().await.unwrap().is_none());
        assert!(cache.peek::<u32>(&key).is_none());
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn wrong_type_reads_as_no_data() {
        let cache = QueryCache::new();
        let key = cache_key!["currentSummoner"];
        cache.set(&key, String::from("not a number"));
        let entry = cache.peek::<u32>(&key).unwrap();
        assert!(entry.data.is_none());
        assert_eq!(entry.status, QueryStatus::Success);
    }
}
