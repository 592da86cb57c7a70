// ── Session facade ──
//
// Wires the query cache, event registry, durable stores and update
// tracker to the host and content clients. One `Session` per process;
// clones share the same state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use loadout_api::{ContentClient, HostClient, HostEventStream, Lockfile};
use secrecy::SecretString;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::binding::{self, BindingHandle, Resource};
use crate::config::{HostSource, SessionConfig};
use crate::error::CoreError;
use crate::events::{EventRegistry, Subscription};
use crate::model::{Catalog, SelectionRecord};
use crate::native::NativeHost;
use crate::query::QueryCache;
use crate::replay::{self, ReplayReport};
use crate::storage::{self, CatalogCache, CatalogLoad, CatalogSource, SelectionStore};
use crate::update::{UpdateStatus, UpdateTracker, VersionState};

/// Resolved host endpoint.
struct HostEndpoint {
    client: Arc<HostClient>,
    ws_url: Url,
    password: SecretString,
}

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Construction touches
/// neither the network nor the disk; call [`start`](Self::start) to
/// connect the host event stream.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    cache: QueryCache,
    registry: EventRegistry,
    catalog_cache: CatalogCache<Catalog>,
    selections: SelectionStore,
    updates: UpdateTracker,
    content: ContentClient,
    host: Mutex<Option<Arc<HostEndpoint>>>,
    catalog: watch::Sender<Option<Arc<Catalog>>>,
    replayed: AtomicBool,
    cancel: CancellationToken,
    event_stream: Mutex<Option<HostEventStream>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    _update_subscription: Subscription,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let transport = config.content_tls.transport(config.content_timeout);
        let content = ContentClient::new(
            config.content_url.clone(),
            config.content_api_key.as_ref(),
            &transport,
        )?;

        let registry = EventRegistry::new();
        let updates = UpdateTracker::new(config.app_version.clone());
        let update_subscription = updates.attach(&registry);
        let (catalog, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(SessionInner {
                cache: QueryCache::new(),
                catalog_cache: CatalogCache::in_dir(&config.data_dir),
                selections: SelectionStore::in_dir(&config.data_dir),
                registry,
                updates,
                content,
                host: Mutex::new(None),
                catalog,
                replayed: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                event_stream: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                _update_subscription: update_subscription,
                config,
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.registry
    }

    pub fn selections(&self) -> &SelectionStore {
        &self.inner.selections
    }

    pub fn catalog_cache(&self) -> &CatalogCache<Catalog> {
        &self.inner.catalog_cache
    }

    pub fn updates(&self) -> &UpdateTracker {
        &self.inner.updates
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect the host event stream and start pumping events into the
    /// registry. Calling it again while running is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if !self.inner.config.events_enabled {
            debug!("host events disabled, not connecting");
            return Ok(());
        }

        let mut stream_slot = self.inner.event_stream.lock().await;
        if stream_slot.is_some() {
            return Ok(());
        }

        let host = self.host().await?;
        let stream = HostEventStream::connect(
            host.ws_url.clone(),
            &host.password,
            self.inner.config.reconnect.clone(),
            self.inner.cancel.child_token(),
            self.inner.config.host_tls.accepts_invalid(),
        )?;
        let pump = self
            .inner
            .registry
            .attach(stream.subscribe(), self.inner.cancel.clone());
        self.inner.task_handles.lock().await.push(pump);
        *stream_slot = Some(stream);

        info!(url = %host.ws_url, "host event stream started");
        Ok(())
    }

    /// Cancel every background task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(stream) = self.inner.event_stream.lock().await.take() {
            stream.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("session shut down");
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Bind resource `R`: fetch it from the host on demand and keep it
    /// current from host events for as long as the handle lives.
    pub async fn bind<R: Resource>(&self) -> Result<BindingHandle<R>, CoreError> {
        let host = Arc::clone(&self.host().await?.client);
        let fresh_for = R::fresh_for(&self.inner.config.freshness);
        Ok(binding::bind::<R, _, _>(
            &self.inner.cache,
            &self.inner.registry,
            fresh_for,
            move || {
                let host = Arc::clone(&host);
                async move {
                    host.get_json::<R::Payload>(R::PATH)
                        .await
                        .map_err(CoreError::from)
                }
            },
        ))
    }

    // ── Catalog ──────────────────────────────────────────────────────

    /// Versioned read-through of the catalog. The loaded catalog is kept
    /// in memory and gates [`replay_selections`](Self::replay_selections).
    pub async fn load_catalog(&self) -> Result<CatalogLoad, CoreError> {
        let load = storage::load_catalog(&self.inner.catalog_cache, &self.inner.content).await?;
        self.inner
            .catalog
            .send_replace(Some(Arc::clone(&load.catalog)));
        info!(version = %load.catalog.version, origin = %load.origin, "catalog ready");
        Ok(load)
    }

    /// The catalog loaded by this session, if any.
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.inner.catalog.borrow().clone()
    }

    pub fn subscribe_catalog(&self) -> watch::Receiver<Option<Arc<Catalog>>> {
        self.inner.catalog.subscribe()
    }

    /// Catalog version currently advertised by the content API.
    pub async fn remote_catalog_version(&self) -> Result<String, CoreError> {
        CatalogSource::catalog_version(&self.inner.content).await
    }

    /// Drop the durable catalog; the next load fetches from the content API.
    pub async fn clear_catalog(&self) -> Result<(), CoreError> {
        self.inner.catalog_cache.clear().await?;
        Ok(())
    }

    // ── Selections ───────────────────────────────────────────────────

    /// Persist a selection and apply it on the host.
    pub async fn select(
        &self,
        entity_id: i64,
        choice_id: i64,
        sub_choice_id: Option<i64>,
    ) -> Result<SelectionRecord, CoreError> {
        let host = self.host().await?;
        let record = SelectionRecord::new(entity_id, choice_id, sub_choice_id);
        replay::apply_selection(&self.inner.selections, host.client.as_ref(), &record).await?;
        info!(entity_id, choice_id, ?sub_choice_id, "selection applied");
        Ok(record)
    }

    /// Re-apply stored selections. Runs at most once per session and only
    /// after [`load_catalog`](Self::load_catalog); later calls return
    /// `Ok(None)`.
    pub async fn replay_selections(&self) -> Result<Option<ReplayReport>, CoreError> {
        let catalog = self.catalog().ok_or(CoreError::CatalogNotLoaded)?;
        let host = self.host().await?;
        if self.inner.replayed.swap(true, Ordering::AcqRel) {
            debug!("selections already replayed this session");
            return Ok(None);
        }

        match replay::replay_selections(&self.inner.selections, &catalog, host.client.as_ref())
            .await
        {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                self.inner.replayed.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    // ── Updates ──────────────────────────────────────────────────────

    pub async fn check_for_update(&self) -> Result<UpdateStatus, CoreError> {
        self.inner.updates.check(&self.inner.content).await
    }

    pub async fn start_update(&self) -> Result<(), CoreError> {
        let host = self.host().await?;
        self.inner.updates.start_download(host.client.as_ref()).await
    }

    pub async fn restart_to_update(&self) -> Result<(), CoreError> {
        let host = self.host().await?;
        self.inner.updates.restart(host.client.as_ref()).await
    }

    pub fn update_state(&self) -> VersionState {
        self.inner.updates.state()
    }

    // ── Native ───────────────────────────────────────────────────────

    pub async fn machine_id(&self) -> Result<String, CoreError> {
        let host = self.host().await?;
        NativeHost::machine_id(host.client.as_ref()).await
    }

    /// Resolve the host endpoint, reading the lockfile on first use.
    async fn host(&self) -> Result<Arc<HostEndpoint>, CoreError> {
        let mut slot = self.inner.host.lock().await;
        if let Some(host) = slot.as_ref() {
            return Ok(Arc::clone(host));
        }

        let config = &self.inner.config;
        let (base_url, password) = match &config.host {
            HostSource::Disabled => {
                return Err(CoreError::HostUnavailable {
                    reason: "no host configured".into(),
                });
            }
            HostSource::Direct { url, password } => (url.clone(), password.clone()),
            HostSource::Lockfile(path) => {
                let lockfile = Lockfile::read(path)?;
                (lockfile.base_url()?, lockfile.password)
            }
        };

        let transport = config.host_tls.transport(config.host_timeout);
        let client = HostClient::new(base_url.clone(), &password, &transport)?;
        let host = Arc::new(HostEndpoint {
            client: Arc::new(client),
            ws_url: websocket_url(&base_url)?,
            password,
        });
        debug!(url = %base_url, "host endpoint resolved");
        *slot = Some(Arc::clone(&host));
        Ok(host)
    }
}

/// `https://` → `wss://`, `http://` → `ws://`.
fn websocket_url(base: &Url) -> Result<Url, CoreError> {
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(CoreError::Config {
                message: format!("unsupported host scheme `{other}`"),
            });
        }
    };
    let mut url = base.clone();
    url.set_scheme(scheme).map_err(|()| CoreError::Config {
        message: format!("cannot derive websocket URL from {base}"),
    })?;
    Ok(url)
}
