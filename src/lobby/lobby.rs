use super::{error::LobbyError, game_state::GameState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS_TO_START: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub connected: bool,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connected: true,
            joined_at: Utc::now(),
        }
    }
}

/// A room of up to [`MAX_PLAYERS`] players. Player order is join order.
///
/// Only the registry holds a mutable `Lobby`; everything handed out is a
/// cloned snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub id: String,
    pub players: Vec<Player>,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub game_state: Option<GameState>,
}

impl Lobby {
    pub fn new(host: Player) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            players: vec![host],
            max_players: MAX_PLAYERS,
            created_at: now,
            last_activity: now,
            started: false,
            game_state: None,
        }
    }

    pub fn get_player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn add_player(&mut self, player: Player) -> Result<(), LobbyError> {
        if self.is_full() {
            return Err(LobbyError::Full {
                max_players: self.max_players,
            });
        }
        if self.get_player(&player.id).is_some() {
            return Err(LobbyError::DuplicatePlayer(player.id));
        }
        self.players.push(player);
        self.touch();
        Ok(())
    }

    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        let player = self.players.remove(index);
        self.touch();
        Some(player)
    }

    /// Flips `started` and seeds an empty hand for every current member.
    pub fn start_game(&mut self) -> Result<(), LobbyError> {
        if self.started {
            return Err(LobbyError::AlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(LobbyError::NotEnoughPlayers {
                count: self.players.len(),
            });
        }

        let mut game_state = GameState::new();
        game_state.started = true;
        for player in &self.players {
            game_state.player_hands.insert(player.id.clone(), Vec::new());
        }

        self.started = true;
        self.game_state = Some(game_state);
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
