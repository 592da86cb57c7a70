use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's chosen skin (and optional chroma) for one champion.
///
/// At most one record exists per `entity_id`; a new choice replaces the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    /// Champion id.
    pub entity_id: i64,
    /// Skin id.
    pub choice_id: i64,
    /// Chroma id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_choice_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl SelectionRecord {
    /// A record stamped with the current time.
    pub fn new(entity_id: i64, choice_id: i64, sub_choice_id: Option<i64>) -> Self {
        Self {
            entity_id,
            choice_id,
            sub_choice_id,
            timestamp: Utc::now(),
        }
    }
}
