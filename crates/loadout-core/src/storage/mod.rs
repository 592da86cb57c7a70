// ── Durable stores ──
//
// JSON documents under the data directory. Writes go to a sibling temp
// file that is synced and then renamed over the target, so a crash never
// leaves a half-written store behind.

mod catalog;
mod selection;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;

pub use catalog::{CatalogCache, CatalogLoad, CatalogOrigin, CatalogRecord, CatalogSource, load_catalog};
pub use selection::SelectionStore;

pub const CATALOG_FILE: &str = "catalog.json";
pub const SELECTIONS_FILE: &str = "selections.json";

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub(crate) struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub(crate) async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io(source)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    pub(crate) async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(StorageError::Encode)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let tmp_err = |source: std::io::Error| StorageError::Io {
            path: tmp.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&tmp).await.map_err(tmp_err)?;
        file.write_all(&bytes).await.map_err(tmp_err)?;
        file.sync_all().await.map_err(tmp_err)?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io(source))
    }

    /// Delete the file; a missing file is not an error.
    pub(crate) async fn remove(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io(source)),
        }
    }

    fn io(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("absent.json"));
        assert!(file.read::<BTreeMap<String, i64>>().await.unwrap().is_none());
        file.remove().await.unwrap();
    }

    #[tokio::test]
    async fn write_creates_parents_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested/store.json"));
        let value = BTreeMap::from([("a".to_owned(), 1_i64)]);

        file.write(&value).await.unwrap();
        assert_eq!(file.read::<BTreeMap<String, i64>>().await.unwrap(), Some(value));
        assert!(!dir.path().join("nested/store.json.tmp").exists());
    }

    #[tokio::test]
    async fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = JsonFile::new(path).read::<BTreeMap<String, i64>>().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
