// ── Bound host resources ──

use std::time::Duration;

use super::Resource;
use crate::config::FreshnessConfig;
use crate::model::{ChampionMastery, GameflowPhase, GameflowSession, Summoner, SummonerPatch};

/// The signed-in player's profile. Events carry partial updates that are
/// overlaid field by field.
pub struct CurrentSummoner;

impl Resource for CurrentSummoner {
    type Data = Summoner;
    type Payload = SummonerPatch;

    const NAME: &'static str = "current summoner";
    const KEY: &'static str = "currentSummoner";
    const TOPIC: &'static str = "lol-summoner_v1_current-summoner";
    const PATH: &'static str = "lol-summoner/v1/current-summoner";

    fn fresh_for(config: &FreshnessConfig) -> Option<Duration> {
        config.summoner
    }

    fn merge(payload: SummonerPatch, previous: Option<&Summoner>) -> Summoner {
        payload.apply_to(previous.cloned().unwrap_or_default())
    }
}

/// Local player's mastery list. Each event carries the full list.
pub struct ChampionMasteries;

impl Resource for ChampionMasteries {
    type Data = Vec<ChampionMastery>;
    type Payload = Vec<ChampionMastery>;

    const NAME: &'static str = "champion mastery";
    const KEY: &'static str = "champion-mastery";
    const TOPIC: &'static str = "lol-champion-mastery_v1_local-player_champion-mastery";
    const PATH: &'static str = "lol-champion-mastery/v1/local-player/champion-mastery";

    fn fresh_for(config: &FreshnessConfig) -> Option<Duration> {
        config.mastery
    }

    fn merge(payload: Vec<ChampionMastery>, _previous: Option<&Vec<ChampionMastery>>) -> Self::Data {
        payload
    }
}

/// Current gameflow phase, projected out of the session resource.
pub struct Gameflow;

impl Resource for Gameflow {
    type Data = GameflowPhase;
    type Payload = GameflowSession;

    const NAME: &'static str = "gameflow phase";
    const KEY: &'static str = "gameflow-phase";
    const TOPIC: &'static str = "lol-gameflow_v1_session";
    const PATH: &'static str = "lol-gameflow/v1/session";

    fn fresh_for(config: &FreshnessConfig) -> Option<Duration> {
        config.gameflow
    }

    fn merge(payload: GameflowSession, _previous: Option<&GameflowPhase>) -> GameflowPhase {
        payload.phase
    }
}
