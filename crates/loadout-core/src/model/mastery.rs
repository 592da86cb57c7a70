use serde::{Deserialize, Serialize};

/// Mastery progress on one champion for the local player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMastery {
    pub champion_id: i64,
    pub champion_level: u32,
    pub champion_points: u64,
    /// Epoch milliseconds of the last game on this champion.
    #[serde(default)]
    pub last_play_time: i64,
}
