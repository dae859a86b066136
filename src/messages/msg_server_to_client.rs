use serde::Serialize;

use crate::lobby::{Lobby, Player};

// Server to Client Actions
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum ServerToClient {
    #[serde(rename = "connected")]
    Connected { status: String },

    #[serde(rename = "lobby_created", rename_all = "camelCase")]
    LobbyCreated { lobby_id: String, lobby: Lobby },

    #[serde(rename = "player_joined", rename_all = "camelCase")]
    PlayerJoined {
        lobby_id: String,
        lobby: Lobby,
        player: Player,
    },

    #[serde(rename = "player_left", rename_all = "camelCase")]
    PlayerLeft { player_id: String },

    #[serde(rename = "game_started")]
    GameStarted { lobby: Lobby },

    #[serde(rename = "card_played")]
    CardPlayed { status: String },

    #[serde(rename = "error")]
    Error { error: String },
}

impl ServerToClient {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize message: {}", e);
            r#"{"type":"error","data":{"error":"Internal error"}}"#.to_string()
        })
    }

    pub fn connected() -> Self {
        Self::Connected {
            status: "ok".to_string(),
        }
    }

    pub fn lobby_created(lobby: Lobby) -> Self {
        Self::LobbyCreated {
            lobby_id: lobby.id.clone(),
            lobby,
        }
    }

    pub fn player_joined(lobby: Lobby, player: Player) -> Self {
        Self::PlayerJoined {
            lobby_id: lobby.id.clone(),
            lobby,
            player,
        }
    }

    pub fn player_left(player_id: &str) -> Self {
        Self::PlayerLeft {
            player_id: player_id.to_string(),
        }
    }

    pub fn card_played() -> Self {
        Self::CardPlayed {
            status: "card_played".to_string(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            error: message.to_string(),
        }
    }
}
