// ── Gameflow ──

use serde::{Deserialize, Serialize};

/// Where the client is in the queue/lobby/game lifecycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum GameflowPhase {
    #[default]
    None,
    Lobby,
    Matchmaking,
    CheckedIntoTournament,
    ReadyCheck,
    ChampSelect,
    GameStart,
    FailedToLaunch,
    InProgress,
    Reconnect,
    WaitingForStats,
    PreEndOfGame,
    EndOfGame,
    TerminatedInError,
    /// A phase this build does not know about.
    #[serde(other)]
    Unknown,
}

impl GameflowPhase {
    /// Whether a game process is running or about to run.
    pub fn in_game(self) -> bool {
        matches!(
            self,
            Self::GameStart | Self::InProgress | Self::Reconnect | Self::WaitingForStats
        )
    }
}

/// The slice of the gameflow session resource the sync layer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GameflowSession {
    #[serde(default)]
    pub phase: GameflowPhase,
}
