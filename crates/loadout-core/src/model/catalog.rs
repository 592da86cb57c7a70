// ── Champion / skin catalog ──
//
// Read-only reference data keyed by champion id. Built from the content
// API snapshot and persisted whole by the catalog cache.

use std::collections::BTreeMap;

use loadout_api::{CatalogSnapshot, ChampionEntry, ChromaEntry, SkinEntry};
use serde::{Deserialize, Serialize};

use super::selection::SelectionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chroma {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skin {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub chromas: Vec<Chroma>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Champion {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub skins: Vec<Skin>,
}

impl Champion {
    pub fn skin(&self, skin_id: i64) -> Option<&Skin> {
        self.skins.iter().find(|s| s.id == skin_id)
    }
}

/// Full catalog at one content version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: String,
    pub champions: BTreeMap<i64, Champion>,
}

/// How a stored selection lines up with the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCheck {
    Valid,
    UnknownEntity,
    UnknownChoice,
    UnknownSubChoice,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.champions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.champions.is_empty()
    }

    pub fn champion(&self, id: i64) -> Option<&Champion> {
        self.champions.get(&id)
    }

    /// Case-insensitive lookup by display name.
    pub fn champion_by_name(&self, name: &str) -> Option<&Champion> {
        self.champions
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a champion by numeric id or by name.
    pub fn resolve_champion(&self, query: &str) -> Option<&Champion> {
        match query.parse::<i64>() {
            Ok(id) => self.champion(id),
            Err(_) => self.champion_by_name(query),
        }
    }

    pub fn check(&self, record: &SelectionRecord) -> SelectionCheck {
        let Some(champion) = self.champion(record.entity_id) else {
            return SelectionCheck::UnknownEntity;
        };
        let Some(skin) = champion.skin(record.choice_id) else {
            return SelectionCheck::UnknownChoice;
        };
        match record.sub_choice_id {
            Some(chroma) if !skin.chromas.iter().any(|c| c.id == chroma) => {
                SelectionCheck::UnknownSubChoice
            }
            _ => SelectionCheck::Valid,
        }
    }
}

// ── Wire conversion ──────────────────────────────────────────────────

impl From<ChromaEntry> for Chroma {
    fn from(c: ChromaEntry) -> Self {
        Self {
            id: c.id,
            name: c.name,
        }
    }
}

impl From<SkinEntry> for Skin {
    fn from(s: SkinEntry) -> Self {
        Self {
            id: s.id,
            name: s.name,
            chromas: s.chromas.into_iter().map(Chroma::from).collect(),
        }
    }
}

impl From<ChampionEntry> for Champion {
    fn from(c: ChampionEntry) -> Self {
        Self {
            id: c.id,
            name: c.name,
            skins: c.skins.into_iter().map(Skin::from).collect(),
        }
    }
}

impl From<CatalogSnapshot> for Catalog {
    fn from(snapshot: CatalogSnapshot) -> Self {
        let champions = snapshot
            .champions
            .into_iter()
            .map(|c| (c.id, Champion::from(c)))
            .collect();
        Self {
            version: snapshot.version,
            champions,
        }
    }
}
