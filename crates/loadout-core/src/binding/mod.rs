// ── Resource bindings ──
//
// A binding ties one host resource to one cache key: reads go through a
// registered fetch, and push events on the resource's topic are merged
// into the cached value. Only bindings write to their keys.

mod resources;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use loadout_api::{EventType, HostEvent};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace, warn};

use crate::cache_key;
use crate::config::FreshnessConfig;
use crate::error::CoreError;
use crate::events::{EventRegistry, Subscription};
use crate::query::{CacheEntry, CacheKey, QueryCache, QueryStream};

pub use resources::{ChampionMasteries, CurrentSummoner, Gameflow};

/// A host resource that can be bound into the cache.
pub trait Resource: Send + Sync + 'static {
    /// Value held in the cache.
    type Data: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    /// Shape of both the fetch response and event payloads.
    type Payload: DeserializeOwned + Send + 'static;

    /// Human-readable name for logs.
    const NAME: &'static str;
    const KEY: &'static str;
    /// Host event topic carrying changes to this resource.
    const TOPIC: &'static str;
    /// Host REST path serving the full resource.
    const PATH: &'static str;

    fn key() -> CacheKey {
        cache_key![Self::KEY]
    }

    fn fresh_for(config: &FreshnessConfig) -> Option<Duration>;

    /// Fold one payload into the previous value. Must be pure: the same
    /// payload sequence always yields the same value.
    fn merge(payload: Self::Payload, previous: Option<&Self::Data>) -> Self::Data;
}

/// What an event did to the bound entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// Delete event: the resource is now known to be absent.
    Cleared,
    /// The merged value equals the cached one; no write happened.
    Unchanged,
    /// Payload failed validation and was discarded.
    Dropped,
}

/// Merge one host event into the cache entry for `R`.
pub(crate) fn apply_event<R: Resource>(cache: &QueryCache, key: &CacheKey, event: &HostEvent) -> Applied {
    let previous = cache.peek::<R::Data>(key);

    if event.event_type == EventType::Delete {
        if previous
            .as_ref()
            .is_some_and(|e| e.data.is_none() && e.updated_at.is_some())
        {
            return Applied::Unchanged;
        }
        debug!(resource = R::NAME, "resource deleted on host");
        cache.set_empty(key);
        return Applied::Cleared;
    }

    let payload = match <R::Payload as Deserialize>::deserialize(&event.data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                resource = R::NAME,
                topic = %event.topic,
                error = %e,
                "dropping event with malformed payload"
            );
            return Applied::Dropped;
        }
    };

    let previous = previous.and_then(|e| e.data);
    let next = R::merge(payload, previous.as_deref());
    if previous.as_deref() == Some(&next) {
        trace!(resource = R::NAME, "event left value unchanged");
        return Applied::Unchanged;
    }
    cache.set(key, next);
    Applied::Updated
}

/// Attach `R` to the cache and the event registry.
///
/// `fetch` returns the full resource, or `Ok(None)` when the host reports
/// it absent. The binding lives as long as the returned handle.
pub fn bind<R, F, Fut>(
    cache: &QueryCache,
    registry: &EventRegistry,
    fresh_for: Option<Duration>,
    fetch: F,
) -> BindingHandle<R>
where
    R: Resource,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<R::Payload>, CoreError>> + Send + 'static,
{
    let key = R::key();
    let generation = cache.register(key.clone(), fresh_for, move || {
        let pending = fetch();
        async move { Ok::<_, CoreError>(pending.await?.map(|payload| R::merge(payload, None))) }
    });

    let (handler_cache, handler_key) = (cache.clone(), key.clone());
    let subscription = registry.subscribe(R::TOPIC, move |event| {
        apply_event::<R>(&handler_cache, &handler_key, event);
    });
    info!(resource = R::NAME, key = %key, topic = R::TOPIC, "binding attached");

    BindingHandle {
        cache: cache.clone(),
        key,
        generation,
        _subscription: subscription,
        _marker: PhantomData,
    }
}

/// Live binding of resource `R`. Dropping it detaches the event handler
/// and the fetcher; the last cached value stays readable.
pub struct BindingHandle<R: Resource> {
    cache: QueryCache,
    key: CacheKey,
    generation: u64,
    _subscription: Subscription,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> BindingHandle<R> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn peek(&self) -> Option<CacheEntry<R::Data>> {
        self.cache.peek(&self.key)
    }

    pub async fn get(&self) -> Option<CacheEntry<R::Data>> {
        self.cache.get(&self.key).await
    }

    pub async fn refresh(&self) -> Option<CacheEntry<R::Data>> {
        self.cache.refresh(&self.key).await
    }

    pub fn invalidate(&self) {
        self.cache.invalidate(&self.key);
    }

    /// Record the resource as absent (logout, lost host context).
    pub fn clear(&self) {
        self.cache.set_empty(&self.key);
    }

    /// Drop the cached entry; the next read fetches from scratch.
    pub fn reset(&self) {
        self.cache.clear(&self.key);
    }

    pub fn subscribe(&self) -> QueryStream<R::Data> {
        self.cache.subscribe(&self.key)
    }
}

impl<R: Resource> Drop for BindingHandle<R> {
    fn drop(&mut self) {
        self.cache.unregister(&self.key, self.generation);
        debug!(resource = R::NAME, "binding detached");
    }
}
