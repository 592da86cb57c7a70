// ── Update reconciliation ──
//
// Small state machine comparing the running version with the latest
// published one and tracking the host-driven download:
//
//   idle → checking → {available | none} → downloading → ready
//
// Any state may fail into `error`; the only way out of `error` is a new
// check. Version comparison is exact string inequality, so a remote
// rollback to an older version still reads as "available".

use std::sync::Arc;

use async_trait::async_trait;
use loadout_api::{ContentClient, ProcessAction};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::events::{EventRegistry, Subscription};
use crate::native::NativeHost;

/// Host topic carrying download progress for an application update.
pub const UPDATE_TOPIC: &str = "loadout_v1_update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UpdateStatus {
    Idle,
    Checking,
    Available,
    /// Already on the latest version.
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    UpToDate,
    Downloading,
    Ready,
    Error,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Check,
    Checked { latest: String },
    StartDownload,
    Progress(u8),
    Downloaded,
    Fail(String),
}

impl UpdateEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Check => "check for updates",
            Self::Checked { .. } => "record check result",
            Self::StartDownload => "start download",
            Self::Progress(_) => "report progress",
            Self::Downloaded => "finish download",
            Self::Fail(_) => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionState {
    pub current_version: String,
    pub latest_version: Option<String>,
    pub status: UpdateStatus,
    /// Download progress, 0..=100.
    pub progress: u8,
    pub error: Option<String>,
}

impl VersionState {
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            latest_version: None,
            status: UpdateStatus::Idle,
            progress: 0,
            error: None,
        }
    }

    /// Next state after `event`, or `InvalidTransition`.
    pub fn apply(&self, event: UpdateEvent) -> Result<VersionState, CoreError> {
        use UpdateStatus as S;

        let mut next = self.clone();
        match (self.status, event) {
            (S::Idle | S::UpToDate | S::Available | S::Error, UpdateEvent::Check) => {
                next.status = S::Checking;
                next.error = None;
                next.progress = 0;
            }
            (S::Checking, UpdateEvent::Checked { latest }) => {
                next.status = if latest == self.current_version {
                    S::UpToDate
                } else {
                    S::Available
                };
                next.latest_version = Some(latest);
            }
            (S::Available, UpdateEvent::StartDownload) => {
                next.status = S::Downloading;
                next.progress = 0;
            }
            (S::Downloading, UpdateEvent::Progress(percent)) => {
                next.progress = percent.min(100);
            }
            (S::Downloading, UpdateEvent::Downloaded) => {
                next.status = S::Ready;
                next.progress = 100;
            }
            (_, UpdateEvent::Fail(message)) => {
                next.status = S::Error;
                next.error = Some(message);
            }
            (from, event) => {
                return Err(CoreError::InvalidTransition {
                    from,
                    event: event.name(),
                });
            }
        }
        Ok(next)
    }
}

// ── Version source ───────────────────────────────────────────────────

/// Where the latest published version comes from.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest_version(&self) -> Result<String, CoreError>;
}

#[async_trait]
impl VersionSource for ContentClient {
    async fn latest_version(&self) -> Result<String, CoreError> {
        Ok(self.latest_app_version().await?.version)
    }
}

// ── Tracker ──────────────────────────────────────────────────────────

/// Host notification on [`UPDATE_TOPIC`].
#[derive(Debug, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
enum UpdateNotice {
    Progress { percent: u32 },
    Ready,
    Error { message: String },
}

/// Observable owner of the [`VersionState`].
#[derive(Clone)]
pub struct UpdateTracker {
    state: Arc<watch::Sender<VersionState>>,
}

impl UpdateTracker {
    pub fn new(current_version: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(VersionState::new(current_version));
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn state(&self) -> VersionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VersionState> {
        self.state.subscribe()
    }

    /// Feed one event through the state machine.
    pub fn apply(&self, event: UpdateEvent) -> Result<VersionState, CoreError> {
        let mut outcome = Err(CoreError::Internal("update transition not evaluated".into()));
        self.state.send_if_modified(|state| match state.apply(event) {
            Ok(next) => {
                let changed = next != *state;
                *state = next.clone();
                outcome = Ok(next);
                changed
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        if let Ok(state) = &outcome {
            debug!(status = %state.status, progress = state.progress, "update state changed");
        }
        outcome
    }

    /// Run a version check. A failed lookup lands in `error` and is also
    /// returned.
    pub async fn check(&self, source: &dyn VersionSource) -> Result<UpdateStatus, CoreError> {
        self.apply(UpdateEvent::Check)?;
        match source.latest_version().await {
            Ok(latest) => {
                let state = self.apply(UpdateEvent::Checked { latest })?;
                info!(
                    current = %state.current_version,
                    latest = state.latest_version.as_deref().unwrap_or_default(),
                    status = %state.status,
                    "update check finished"
                );
                Ok(state.status)
            }
            Err(e) => {
                warn!(error = %e, "update check failed");
                self.apply(UpdateEvent::Fail(e.to_string()))?;
                Err(e)
            }
        }
    }

    /// Ask the host to start downloading the available update.
    pub async fn start_download(&self, host: &dyn NativeHost) -> Result<(), CoreError> {
        self.apply(UpdateEvent::StartDownload)?;
        if let Err(e) = host.process_action(ProcessAction::StartUpdate).await {
            warn!(error = %e, "host refused to start the update");
            self.apply(UpdateEvent::Fail(e.to_string()))?;
            return Err(e);
        }
        Ok(())
    }

    /// Restart into the downloaded update. Only valid once `ready`; a
    /// failed restart leaves the state untouched so it can be retried.
    pub async fn restart(&self, host: &dyn NativeHost) -> Result<(), CoreError> {
        let status = self.state.borrow().status;
        if status != UpdateStatus::Ready {
            return Err(CoreError::InvalidTransition {
                from: status,
                event: "restart to update",
            });
        }
        host.process_action(ProcessAction::Restart).await
    }

    /// Follow host download notifications until the subscription drops.
    pub fn attach(&self, registry: &EventRegistry) -> Subscription {
        let tracker = self.clone();
        registry.subscribe(UPDATE_TOPIC, move |event| {
            let notice = match UpdateNotice::deserialize(&event.data) {
                Ok(notice) => notice,
                Err(e) => {
                    warn!(error = %e, "dropping malformed update notification");
                    return;
                }
            };
            let update = match notice {
                UpdateNotice::Progress { percent } => {
                    UpdateEvent::Progress(u8::try_from(percent.min(100)).unwrap_or(100))
                }
                UpdateNotice::Ready => UpdateEvent::Downloaded,
                UpdateNotice::Error { message } => UpdateEvent::Fail(message),
            };
            if let Err(e) = tracker.apply(update) {
                debug!(error = %e, "ignoring update notification");
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loadout_api::{EventType, HostEvent};
    use serde_json::json;

    use super::*;
    use crate::replay::tests::RecordingHost;

    struct Latest(Result<&'static str, &'static str>);

    #[async_trait]
    impl VersionSource for Latest {
        async fn latest_version(&self) -> Result<String, CoreError> {
            self.0
                .map(str::to_owned)
                .map_err(|m| CoreError::Fetch {
                    message: m.into(),
                    status: None,
                })
        }
    }

    fn notice(data: serde_json::Value) -> HostEvent {
        HostEvent::new(UPDATE_TOPIC, EventType::Update, data)
    }

    #[tokio::test]
    async fn equal_versions_are_up_to_date() {
        let tracker = UpdateTracker::new("1.2.0");
        let status = tracker.check(&Latest(Ok("1.2.0"))).await.unwrap();
        assert_eq!(status, UpdateStatus::UpToDate);
        assert_eq!(serde_json::to_value(status).unwrap(), json!("none"));
    }

    #[tokio::test]
    async fn different_versions_are_available() {
        let tracker = UpdateTracker::new("1.2.0");
        let status = tracker.check(&Latest(Ok("1.3.0"))).await.unwrap();
        assert_eq!(status, UpdateStatus::Available);
        assert_eq!(tracker.state().latest_version.as_deref(), Some("1.3.0"));
    }

    #[tokio::test]
    async fn older_remote_still_counts_as_available() {
        let tracker = UpdateTracker::new("1.3.0");
        let status = tracker.check(&Latest(Ok("1.2.0"))).await.unwrap();
        assert_eq!(status, UpdateStatus::Available);
    }

    #[test]
    fn download_only_from_available() {
        let idle = VersionState::new("1.2.0");
        let err = idle.apply(UpdateEvent::StartDownload).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: UpdateStatus::Idle,
                ..
            }
        ));

        let up_to_date = idle
            .apply(UpdateEvent::Check)
            .unwrap()
            .apply(UpdateEvent::Checked {
                latest: "1.2.0".into(),
            })
            .unwrap();
        assert!(up_to_date.apply(UpdateEvent::StartDownload).is_err());
    }

    #[test]
    fn error_recovers_only_through_check() {
        let failed = VersionState::new("1.2.0")
            .apply(UpdateEvent::Fail("offline".into()))
            .unwrap();
        assert_eq!(failed.status, UpdateStatus::Error);
        assert!(failed.apply(UpdateEvent::StartDownload).is_err());
        assert!(failed.apply(UpdateEvent::Downloaded).is_err());

        let retry = failed.apply(UpdateEvent::Check).unwrap();
        assert_eq!(retry.status, UpdateStatus::Checking);
        assert!(retry.error.is_none());
    }

    #[test]
    fn progress_is_clamped() {
        let downloading = VersionState {
            status: UpdateStatus::Downloading,
            ..VersionState::new("1.2.0")
        };
        assert_eq!(downloading.apply(UpdateEvent::Progress(250)).unwrap().progress, 100);
        assert!(VersionState::new("1.2.0").apply(UpdateEvent::Progress(5)).is_err());
    }

    #[tokio::test]
    async fn failed_check_lands_in_error() {
        let tracker = UpdateTracker::new("1.2.0");
        let result = tracker.check(&Latest(Err("dns failure"))).await;
        assert!(result.is_err());
        let state = tracker.state();
        assert_eq!(state.status, UpdateStatus::Error);
        assert!(state.error.unwrap().contains("dns failure"));

        // Explicit retry recovers.
        let status = tracker.check(&Latest(Ok("1.3.0"))).await.unwrap();
        assert_eq!(status, UpdateStatus::Available);
    }

    #[tokio::test]
    async fn full_download_flow_via_host_notifications() {
        let tracker = UpdateTracker::new("1.2.0");
        let registry = EventRegistry::new();
        let _sub = tracker.attach(&registry);
        let host = RecordingHost::default();
        let mut watcher = tracker.subscribe();

        tracker.check(&Latest(Ok("1.3.0"))).await.unwrap();
        assert!(tracker.restart(&host).await.is_err());
        tracker.start_download(&host).await.unwrap();
        assert_eq!(*host.actions.lock().unwrap(), vec![ProcessAction::StartUpdate]);

        registry.dispatch(&notice(json!({ "state": "progress", "percent": 40 })));
        assert_eq!(tracker.state().progress, 40);
        registry.dispatch(&notice(json!({ "state": "progress", "percent": "lots" })));
        assert_eq!(tracker.state().progress, 40);

        registry.dispatch(&notice(json!({ "state": "ready" })));
        assert_eq!(tracker.state().status, UpdateStatus::Ready);
        assert!(watcher.has_changed().unwrap());
        watcher.borrow_and_update();

        tracker.restart(&host).await.unwrap();
        assert_eq!(
            *host.actions.lock().unwrap(),
            vec![ProcessAction::StartUpdate, ProcessAction::Restart]
        );
    }
}
