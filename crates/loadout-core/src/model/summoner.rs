// ── Summoner ──

use serde::{Deserialize, Serialize};

/// The signed-in player's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub summoner_id: i64,
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub summoner_level: u32,
    pub profile_icon_id: i64,
    pub xp_since_last_level: u64,
    pub xp_until_next_level: u64,
}

impl Summoner {
    /// `GameName#TAG`, or just the name when the tag is unknown.
    pub fn riot_id(&self) -> String {
        if self.tag_line.is_empty() {
            self.game_name.clone()
        } else {
            format!("{}#{}", self.game_name, self.tag_line)
        }
    }
}

/// Partial summoner update as pushed by the host.
///
/// Every field is optional: the host sends only what changed, alongside
/// fields this model ignores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerPatch {
    pub summoner_id: Option<i64>,
    pub puuid: Option<String>,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
    pub summoner_level: Option<u32>,
    pub profile_icon_id: Option<i64>,
    pub xp_since_last_level: Option<u64>,
    pub xp_until_next_level: Option<u64>,
}

impl SummonerPatch {
    /// Overlay the present fields onto `base`.
    pub fn apply_to(self, base: Summoner) -> Summoner {
        Summoner {
            summoner_id: self.summoner_id.unwrap_or(base.summoner_id),
            puuid: self.puuid.unwrap_or(base.puuid),
            game_name: self.game_name.unwrap_or(base.game_name),
            tag_line: self.tag_line.unwrap_or(base.tag_line),
            summoner_level: self.summoner_level.unwrap_or(base.summoner_level),
            profile_icon_id: self.profile_icon_id.unwrap_or(base.profile_icon_id),
            xp_since_last_level: self.xp_since_last_level.unwrap_or(base.xp_since_last_level),
            xp_until_next_level: self.xp_until_next_level.unwrap_or(base.xp_until_next_level),
        }
    }
}
