// ── Selection apply and replay ──
//
// A selection is persisted before it is applied, so the durable store is
// always at least as new as what the host was told. After the host
// restarts, every stored selection is re-applied once the catalog is
// available.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{Catalog, SelectionCheck, SelectionRecord};
use crate::native::NativeHost;
use crate::storage::SelectionStore;

/// Persist `record`, then apply it on the host.
///
/// A failed write returns before the host is touched. A failed native
/// call is returned too, but the record stays stored and will be
/// retried by the next replay.
pub async fn apply_selection(
    store: &SelectionStore,
    host: &dyn NativeHost,
    record: &SelectionRecord,
) -> Result<(), CoreError> {
    store.upsert(record).await?;
    host.apply_selection(record.entity_id, record.choice_id, record.sub_choice_id)
        .await
}

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Entity ids applied successfully.
    pub applied: Vec<i64>,
    /// Entity ids whose native call failed, with the error message.
    pub failed: Vec<(i64, String)>,
    /// Entity ids absent from the catalog (still attempted).
    pub unknown: Vec<i64>,
}

impl ReplayReport {
    pub fn total(&self) -> usize {
        self.applied.len() + self.failed.len()
    }
}

/// Re-apply every stored selection, best effort.
///
/// Records are applied one at a time in entity-id order. One failure
/// never stops the rest; records the catalog does not know are logged and
/// applied anyway.
pub async fn replay_selections(
    store: &SelectionStore,
    catalog: &Catalog,
    host: &dyn NativeHost,
) -> Result<ReplayReport, CoreError> {
    let records = store.list().await?;
    let mut report = ReplayReport::default();
    info!(count = records.len(), catalog = %catalog.version, "replaying stored selections");

    for record in records {
        match catalog.check(&record) {
            SelectionCheck::Valid => {}
            SelectionCheck::UnknownEntity => {
                warn!(entity_id = record.entity_id, "stored selection for champion missing from catalog");
                report.unknown.push(record.entity_id);
            }
            check => {
                warn!(
                    entity_id = record.entity_id,
                    choice_id = record.choice_id,
                    ?check,
                    "stored selection does not match catalog"
                );
            }
        }

        match host
            .apply_selection(record.entity_id, record.choice_id, record.sub_choice_id)
            .await
        {
            Ok(()) => {
                debug!(entity_id = record.entity_id, "selection replayed");
                report.applied.push(record.entity_id);
            }
            Err(e) => {
                warn!(entity_id = record.entity_id, error = %e, "selection replay failed");
                report.failed.push((record.entity_id, e.to_string()));
            }
        }
    }

    info!(
        applied = report.applied.len(),
        failed = report.failed.len(),
        "selection replay finished"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use loadout_api::ProcessAction;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::catalog::tests::sample;

    /// Records native calls; fails `apply_selection` for listed entities.
    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub(crate) applied: Mutex<Vec<(i64, i64, Option<i64>)>>,
        pub(crate) actions: Mutex<Vec<ProcessAction>>,
        pub(crate) failing: HashSet<i64>,
    }

    #[async_trait]
    impl NativeHost for RecordingHost {
        async fn apply_selection(
            &self,
            entity_id: i64,
            choice_id: i64,
            sub_choice_id: Option<i64>,
        ) -> Result<(), CoreError> {
            if self.failing.contains(&entity_id) {
                return Err(CoreError::NativeCall {
                    call: "apply_selection",
                    message: "host busy".into(),
                });
            }
            self.applied
                .lock()
                .unwrap()
                .push((entity_id, choice_id, sub_choice_id));
            Ok(())
        }

        async fn machine_id(&self) -> Result<String, CoreError> {
            Ok("machine-1".into())
        }

        async fn process_action(&self, action: ProcessAction) -> Result<(), CoreError> {
            self.actions.lock().unwrap().push(action);
            Ok(())
        }
    }

    #[tokio::test]
    async fn apply_persists_before_calling_host() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::in_dir(dir.path());
        let host = RecordingHost::default();

        apply_selection(&store, &host, &SelectionRecord::new(1, 1001, Some(1101)))
            .await
            .unwrap();
        assert_eq!(*host.applied.lock().unwrap(), vec![(1, 1001, Some(1101))]);
        assert_eq!(store.get(1).await.unwrap().unwrap().choice_id, 1001);
    }

    #[tokio::test]
    async fn failed_write_never_reaches_host() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"").unwrap();
        let store = SelectionStore::in_dir(&blocker);
        let host = RecordingHost::default();

        let result = apply_selection(&store, &host, &SelectionRecord::new(1, 1001, None)).await;
        assert!(matches!(result, Err(CoreError::Storage(_))));
        assert!(host.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_native_call_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::in_dir(dir.path());
        let host = RecordingHost {
            failing: HashSet::from([1]),
            ..RecordingHost::default()
        };

        let result = apply_selection(&store, &host, &SelectionRecord::new(1, 1001, None)).await;
        assert!(matches!(result, Err(CoreError::NativeCall { .. })));
        assert!(store.get(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replay_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::in_dir(dir.path());
        for record in [
            SelectionRecord::new(1, 1001, None),
            SelectionRecord::new(42, 42001, None),
            SelectionRecord::new(103, 103001, None),
        ] {
            store.upsert(&record).await.unwrap();
        }
        let host = RecordingHost {
            failing: HashSet::from([1]),
            ..RecordingHost::default()
        };

        let report = replay_selections(&store, &sample(), &host).await.unwrap();
        assert_eq!(report.applied, vec![42, 103]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 1);
        assert_eq!(report.unknown, vec![42]);
        assert_eq!(report.total(), 3);

        let applied: Vec<i64> = host.applied.lock().unwrap().iter().map(|a| a.0).collect();
        assert_eq!(applied, vec![42, 103]);
    }

    #[tokio::test]
    async fn replay_of_empty_store_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::in_dir(dir.path());
        let host = RecordingHost::default();
        let report = replay_selections(&store, &sample(), &host).await.unwrap();
        assert_eq!(report, ReplayReport::default());
    }
}
