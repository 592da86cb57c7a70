// ── Durable selection store ──
//
// One record per champion, persisted write-through. Unlike the catalog
// cache, write failures here are returned to the caller: a selection the
// user made must not silently vanish.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{JsonFile, SELECTIONS_FILE};
use crate::error::StorageError;
use crate::model::SelectionRecord;

type Records = BTreeMap<i64, SelectionRecord>;

#[derive(Debug)]
pub struct SelectionStore {
    file: JsonFile,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl SelectionStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            file: JsonFile::new(dir.join(SELECTIONS_FILE)),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Insert or replace the record for `record.entity_id`.
    pub async fn upsert(&self, record: &SelectionRecord) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.entity_id, record.clone());
        self.file.write(&records).await?;
        debug!(
            entity_id = record.entity_id,
            choice_id = record.choice_id,
            "selection persisted"
        );
        Ok(())
    }

    pub async fn get(&self, entity_id: i64) -> Result<Option<SelectionRecord>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&entity_id))
    }

    /// Every record, ordered by entity id.
    pub async fn list(&self) -> Result<Vec<SelectionRecord>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }

    pub async fn remove(&self, entity_id: i64) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let removed = records.remove(&entity_id).is_some();
        if removed {
            self.file.write(&records).await?;
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        self.file.remove().await
    }

    /// Unparseable contents are logged and treated as empty; I/O faults
    /// propagate.
    async fn load(&self) -> Result<Records, StorageError> {
        match self.file.read::<Records>().await {
            Ok(records) => Ok(records.unwrap_or_default()),
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!(error = %e, "selection store unreadable, starting empty");
                Ok(Records::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn upsert_replaces_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::in_dir(dir.path());

        store.upsert(&SelectionRecord::new(1, 1001, None)).await.unwrap();
        store.upsert(&SelectionRecord::new(103, 103001, None)).await.unwrap();
        store.upsert(&SelectionRecord::new(1, 1002, Some(1201))).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entity_id, 1);
        assert_eq!(all[0].choice_id, 1002);
        assert_eq!(all[0].sub_choice_id, Some(1201));

        let reopened = SelectionStore::in_dir(dir.path());
        assert_eq!(reopened.get(103).await.unwrap().unwrap().choice_id, 103001);
    }

    #[tokio::test]
    async fn concurrent_upserts_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SelectionStore::in_dir(dir.path()));

        let writes = (1..=20).map(|id| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.upsert(&SelectionRecord::new(id, id * 10, None)).await })
        });
        for handle in futures_util::future::join_all(writes).await {
            handle.unwrap().unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::in_dir(dir.path());
        store.upsert(&SelectionRecord::new(1, 1001, None)).await.unwrap();

        assert!(store.remove(1).await.unwrap());
        assert!(!store.remove(1).await.unwrap());
        store.upsert(&SelectionRecord::new(2, 2001, None)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unwritable_location_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be.
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"").unwrap();
        let store = SelectionStore::in_dir(&blocker);

        let err = store
            .upsert(&SelectionRecord::new(1, 1001, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
