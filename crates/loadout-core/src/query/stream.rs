// ── Reactive query streams ──
//
// Subscription types for consuming changes to a single cache entry.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::cache::{CacheEntry, RawEntry};
use super::key::CacheKey;

/// Point-in-time view of an entry. `None` means the key holds no entry.
pub type Snapshot<T> = Option<CacheEntry<T>>;

/// A subscription to one cache key.
///
/// Provides the snapshot captured at creation, the latest snapshot, and
/// change notification via [`changed`](Self::changed) or a `Stream`.
pub struct QueryStream<T> {
    key: CacheKey,
    current: Snapshot<T>,
    receiver: watch::Receiver<Option<RawEntry>>,
}

impl<T: Send + Sync + 'static> QueryStream<T> {
    pub(crate) fn new(key: CacheKey, receiver: watch::Receiver<Option<RawEntry>>) -> Self {
        let current = receiver.borrow().as_ref().map(|raw| raw.typed(&key));
        Self {
            key,
            current,
            receiver,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Get the snapshot captured at creation time (or at the last `changed`).
    pub fn current(&self) -> &Snapshot<T> {
        &self.current
    }

    /// Get the latest snapshot.
    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().as_ref().map(|raw| raw.typed(&self.key))
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the cache has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        let snap = self
            .receiver
            .borrow_and_update()
            .as_ref()
            .map(|raw| raw.typed(&self.key));
        self.current.clone_from(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> QueryWatchStream<T> {
        QueryWatchStream {
            key: self.key,
            inner: WatchStream::new(self.receiver),
            _marker: PhantomData,
        }
    }
}

/// `Stream` adapter yielding a [`Snapshot`] on every write to the entry,
/// starting with the current one.
pub struct QueryWatchStream<T> {
    key: CacheKey,
    inner: WatchStream<Option<RawEntry>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Stream for QueryWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll_next(cx)
            .map(|item| item.map(|raw| raw.map(|raw| raw.typed(&this.key))))
    }
}
