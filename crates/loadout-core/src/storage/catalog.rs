// ── Durable catalog cache ──
//
// Holds the last catalog snapshot with the content version it was
// fetched at. Reads fail open: any storage fault is logged and treated
// as an empty cache so the caller falls back to the network.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loadout_api::{CatalogSnapshot, ContentClient};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CATALOG_FILE, JsonFile};
use crate::error::{CoreError, StorageError};
use crate::model::Catalog;

/// Stored value with the version it was fetched at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord<T> {
    pub data: T,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct RecordRef<'a, T> {
    data: &'a T,
    version: &'a str,
    timestamp: DateTime<Utc>,
}

/// Single-slot versioned cache on disk.
#[derive(Debug, Clone)]
pub struct CatalogCache<T> {
    file: JsonFile,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> CatalogCache<T> {
    /// Cache stored in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            file: JsonFile::new(dir.join(CATALOG_FILE)),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Last stored record, or `None` when empty or unreadable.
    pub async fn get(&self) -> Option<CatalogRecord<T>> {
        match self.file.read().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "catalog cache unreadable, treating as empty");
                None
            }
        }
    }

    pub async fn put(&self, data: &T, version: &str) -> Result<(), StorageError> {
        let record = RecordRef {
            data,
            version,
            timestamp: Utc::now(),
        };
        self.file.write(&record).await?;
        debug!(version, path = %self.file.path().display(), "catalog cache written");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.file.remove().await
    }
}

// ── Read-through loading ─────────────────────────────────────────────

/// Where catalog data and its version come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn catalog_version(&self) -> Result<String, CoreError>;
    async fn catalog(&self) -> Result<CatalogSnapshot, CoreError>;
}

#[async_trait]
impl CatalogSource for ContentClient {
    async fn catalog_version(&self) -> Result<String, CoreError> {
        Ok(ContentClient::catalog_version(self).await?)
    }

    async fn catalog(&self) -> Result<CatalogSnapshot, CoreError> {
        Ok(ContentClient::catalog(self).await?)
    }
}

/// Which copy [`load_catalog`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CatalogOrigin {
    /// Durable copy matched the remote version.
    Durable,
    /// Fetched from the content API.
    Remote,
    /// Remote unreachable; an older durable copy was served.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CatalogLoad {
    pub catalog: Arc<Catalog>,
    pub origin: CatalogOrigin,
}

fn stale_or(stored: Option<CatalogRecord<Catalog>>, err: CoreError) -> Result<CatalogLoad, CoreError> {
    match stored {
        Some(record) => {
            warn!(
                version = %record.version,
                error = %err,
                "content API unavailable, serving stored catalog"
            );
            Ok(CatalogLoad {
                catalog: Arc::new(record.data),
                origin: CatalogOrigin::Stale,
            })
        }
        None => Err(err),
    }
}

/// Return the catalog, from disk when its version is current and from
/// the content API otherwise. A failed write-back is logged, not raised.
pub async fn load_catalog(
    cache: &CatalogCache<Catalog>,
    source: &dyn CatalogSource,
) -> Result<CatalogLoad, CoreError> {
    let stored = cache.get().await;

    let remote_version = match source.catalog_version().await {
        Ok(version) => version,
        Err(e) => return stale_or(stored, e),
    };

    if let Some(record) = stored.as_ref().filter(|r| r.version == remote_version) {
        debug!(version = %record.version, "stored catalog is current");
        return Ok(CatalogLoad {
            catalog: Arc::new(record.data.clone()),
            origin: CatalogOrigin::Durable,
        });
    }

    let snapshot = match source.catalog().await {
        Ok(snapshot) => snapshot,
        Err(e) => return stale_or(stored, e),
    };
    let catalog = Catalog::from(snapshot);
    info!(
        version = %catalog.version,
        previous = stored.as_ref().map_or("none", |r| r.version.as_str()),
        champions = catalog.len(),
        "catalog fetched"
    );

    if let Err(e) = cache.put(&catalog, &catalog.version).await {
        warn!(error = %e, "failed to persist catalog, continuing with in-memory copy");
    }

    Ok(CatalogLoad {
        catalog: Arc::new(catalog),
        origin: CatalogOrigin::Remote,
    })
}
