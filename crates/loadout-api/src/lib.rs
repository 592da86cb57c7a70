//! Async clients for the external collaborators of the loadout sync layer.
//!
//! - **[`HostClient`]**: REST resources and native calls on the local host
//!   process, authenticated with credentials from its [`Lockfile`].
//! - **[`HostEventStream`]**: the host's multiplexed push-event feed over
//!   WebSocket, with reconnect and backoff.
//! - **[`ContentClient`]**: the remote content API serving the catalog
//!   snapshot and version metadata.

pub mod content;
pub mod error;
pub mod events;
pub mod host;
pub mod lockfile;
pub mod transport;

pub use content::{CatalogSnapshot, ChampionEntry, ChromaEntry, ContentClient, SkinEntry, VersionInfo};
pub use error::Error;
pub use events::{EventType, HostEvent, HostEventStream, ReconnectConfig};
pub use host::{ApplySelectionRequest, HostClient, ProcessAction};
pub use lockfile::Lockfile;
pub use transport::{TlsMode, TransportConfig};
