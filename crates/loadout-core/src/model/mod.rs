// ── Domain model ──
//
// Canonical shapes of the host resources and local records the sync
// layer keeps. Wire payloads are decoded into these by the bindings and
// by the catalog conversion; consumers never see raw JSON.

pub mod catalog;
pub mod gameflow;
pub mod mastery;
pub mod selection;
pub mod summoner;

// ── Re-exports ──────────────────────────────────────────────────────

pub use catalog::{Catalog, Champion, Chroma, SelectionCheck, Skin};
pub use gameflow::{GameflowPhase, GameflowSession};
pub use mastery::ChampionMastery;
pub use selection::SelectionRecord;
pub use summoner::{Summoner, SummonerPatch};
