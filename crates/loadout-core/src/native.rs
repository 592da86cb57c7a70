// ── Native host operations ──
//
// Imperative calls into the host that are not cache-backed. The trait is
// the seam replay and the update flow are written against; `HostClient`
// is the production implementation.

use async_trait::async_trait;
use loadout_api::{ApplySelectionRequest, HostClient, ProcessAction};

use crate::error::CoreError;

#[async_trait]
pub trait NativeHost: Send + Sync {
    /// Apply a skin (and optional chroma) choice for one champion.
    async fn apply_selection(
        &self,
        entity_id: i64,
        choice_id: i64,
        sub_choice_id: Option<i64>,
    ) -> Result<(), CoreError>;

    /// Stable identifier of the machine the host runs on.
    async fn machine_id(&self) -> Result<String, CoreError>;

    async fn process_action(&self, action: ProcessAction) -> Result<(), CoreError>;
}

#[async_trait]
impl NativeHost for HostClient {
    async fn apply_selection(
        &self,
        entity_id: i64,
        choice_id: i64,
        sub_choice_id: Option<i64>,
    ) -> Result<(), CoreError> {
        let request = ApplySelectionRequest {
            entity_id,
            choice_id,
            sub_choice_id,
        };
        HostClient::apply_selection(self, &request)
            .await
            .map_err(|e| CoreError::native("apply_selection", e))
    }

    async fn machine_id(&self) -> Result<String, CoreError> {
        HostClient::machine_id(self)
            .await
            .map_err(|e| CoreError::native("machine_id", e))
    }

    async fn process_action(&self, action: ProcessAction) -> Result<(), CoreError> {
        HostClient::process_action(self, action)
            .await
            .map_err(|e| CoreError::native("process_action", e))
    }
}
