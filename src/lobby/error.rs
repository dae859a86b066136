use thiserror::Error;

/// Why a registry operation on a lobby did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("lobby {0} not found")]
    NotFound(String),
    #[error("lobby is full ({max_players} players)")]
    Full { max_players: usize },
    #[error("player {0} is already in the lobby")]
    DuplicatePlayer(String),
    #[error("game already started")]
    AlreadyStarted,
    #[error("need at least 2 players, lobby has {count}")]
    NotEnoughPlayers { count: usize },
}
