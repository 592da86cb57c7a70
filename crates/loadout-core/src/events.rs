// ── Event registry ──
//
// Topic-keyed fan-out of host push events to in-process handlers.
// Handlers are plain synchronous callbacks; dispatch works on a snapshot
// of the handler list so a handler may subscribe or cancel (itself
// included) without deadlocking or skipping siblings.
//
// A panicking handler is logged and its siblings still run, but only when
// panics unwind. Under `panic = "abort"` (the release profile) a handler
// panic ends the process.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use loadout_api::HostEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

type Handler = Arc<dyn Fn(&HostEvent) + Send + Sync>;

struct HandlerSlot {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Handler,
}

#[derive(Default)]
struct RegistryInner {
    topics: DashMap<String, Vec<Arc<HandlerSlot>>>,
    next_id: AtomicU64,
}

/// Cloneable handle to the event registry.
#[derive(Clone, Default)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. The handler stays attached until
    /// the returned [`Subscription`] is cancelled or dropped.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(HandlerSlot {
            id,
            active: Arc::clone(&active),
            handler: Arc::new(handler),
        });
        self.inner
            .topics
            .entry(topic.clone())
            .or_default()
            .push(slot);
        debug!(topic = %topic, id, "event handler subscribed");

        Subscription {
            topic,
            id,
            active,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every active handler for the event's topic, in
    /// subscription order. Returns how many handlers ran.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        let handlers: Vec<Arc<HandlerSlot>> = match self.inner.topics.get(&event.topic) {
            Some(slots) => slots.clone(),
            None => {
                trace!(topic = %event.topic, "no handlers for topic");
                return 0;
            }
        };

        let mut invoked = 0;
        for slot in handlers {
            // Cancelled by an earlier handler in this same dispatch.
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;
            if catch_unwind(AssertUnwindSafe(|| (slot.handler)(event))).is_err() {
                error!(topic = %event.topic, id = slot.id, "event handler panicked");
            }
        }
        invoked
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.inner.topics.get(topic).map_or(0, |slots| slots.len())
    }

    /// Topics with at least one live handler, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.inner.topics.iter().map(|e| e.key().clone()).collect();
        topics.sort();
        topics
    }

    /// Spawn a task pumping events from `rx` into [`dispatch`](Self::dispatch)
    /// until `cancel` fires or the sender closes.
    pub fn attach(
        &self,
        mut rx: broadcast::Receiver<Arc<HostEvent>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            registry.dispatch(&event);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event pump lagged, host events were dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("event pump stopped");
        })
    }
}

/// Handle that keeps one handler attached.
///
/// Cancelling is idempotent and dropping the handle cancels it.
pub struct Subscription {
    topic: String,
    id: u64,
    active: Arc<AtomicBool>,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Detach the handler now.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        if let Entry::Occupied(mut slots) = inner.topics.entry(self.topic.clone()) {
            slots.get_mut().retain(|slot| slot.id != self.id);
            if slots.get().is_empty() {
                slots.remove();
            }
        }
        debug!(topic = %self.topic, id = self.id, "event handler unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
