// loadout-core: Event-driven sync layer between loadout-api and consumers (CLI).

pub mod binding;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod native;
pub mod query;
pub mod replay;
pub mod session;
pub mod storage;
pub mod update;

// ── Primary re-exports ──────────────────────────────────────────────
pub use binding::{BindingHandle, ChampionMasteries, CurrentSummoner, Gameflow, Resource};
pub use config::{FreshnessConfig, HostSource, SessionConfig, TlsVerification};
pub use error::{CoreError, StorageError};
pub use events::{EventRegistry, Subscription};
pub use native::NativeHost;
pub use query::{CacheEntry, CacheKey, KeySegment, QueryCache, QueryStatus, QueryStream};
pub use replay::ReplayReport;
pub use session::Session;
pub use storage::{CatalogLoad, CatalogOrigin, SelectionStore};
pub use update::{UpdateStatus, UpdateTracker, VersionState};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Catalog, Champion, ChampionMastery, Chroma, GameflowPhase, SelectionRecord, Skin, Summoner,
};
pub use loadout_api::ReconnectConfig;
