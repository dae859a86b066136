use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire wrapper shared by both directions: `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectData {
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyData {
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyData {
    pub lobby_id: String,
    pub player_name: String,
}

// Client to Server Actions
#[derive(Debug, Clone, PartialEq)]
pub enum ClientToServer {
    Connect(ConnectData),
    CreateLobby(CreateLobbyData),
    JoinLobby(JoinLobbyData),
    LeaveLobby,
    StartGame,
    // Acknowledged only, no rule engine behind it
    PlayCard { data: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Invalid message format")]
    MalformedEnvelope,
    #[error("Unknown message type")]
    UnknownType(String),
    #[error("Invalid {0} data")]
    InvalidData(&'static str),
}

impl ClientToServer {
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope =
            serde_json::from_str(frame).map_err(|_| DecodeError::MalformedEnvelope)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, DecodeError> {
        let Envelope { kind, data } = envelope;
        match kind.as_str() {
            "connect" => {
                let data: ConnectData =
                    serde_json::from_value(data).map_err(|_| DecodeError::InvalidData("connect"))?;
                if data.player_id.trim().is_empty() {
                    return Err(DecodeError::InvalidData("connect"));
                }
                Ok(Self::Connect(data))
            }
            "create_lobby" => serde_json::from_value(data)
                .map(Self::CreateLobby)
                .map_err(|_| DecodeError::InvalidData("lobby creation")),
            "join_lobby" => serde_json::from_value(data)
                .map(Self::JoinLobby)
                .map_err(|_| DecodeError::InvalidData("join")),
            "leave_lobby" => Ok(Self::LeaveLobby),
            "start_game" => Ok(Self::StartGame),
            "play_card" => Ok(Self::PlayCard { data }),
            _ => Err(DecodeError::UnknownType(kind)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::CreateLobby(_) => "create_lobby",
            Self::JoinLobby(_) => "join_lobby",
            Self::LeaveLobby => "leave_lobby",
            Self::StartGame => "start_game",
            Self::PlayCard { .. } => "play_card",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_connect() {
        let frame = r#"{"type":"connect","data":{"playerId":"p1","playerName":"Alice"}}"#;
        let decoded = ClientToServer::decode(frame).unwrap();
        assert_eq!(
            decoded,
            ClientToServer::Connect(ConnectData {
                player_id: "p1".to_string(),
                player_name: "Alice".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_join_lobby() {
        let frame = r#"{"type":"join_lobby","data":{"lobbyId":"abc","playerName":"Bob"}}"#;
        match ClientToServer::decode(frame).unwrap() {
            ClientToServer::JoinLobby(data) => {
                assert_eq!(data.lobby_id, "abc");
                assert_eq!(data.player_name, "Bob");
            }
            other => panic!("Expected JoinLobby, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_commands_without_data() {
        assert_eq!(
            ClientToServer::decode(r#"{"type":"leave_lobby"}"#).unwrap(),
            ClientToServer::LeaveLobby
        );
        assert_eq!(
            ClientToServer::decode(r#"{"type":"start_game","data":{}}"#).unwrap(),
            ClientToServer::StartGame
        );
        assert_eq!(
            ClientToServer::decode(r#"{"type":"play_card","data":{"card":"AS"}}"#)
                .unwrap()
                .kind(),
            "play_card"
        );
    }

    #[test]
    fn test_malformed_envelope() {
        assert_eq!(
            ClientToServer::decode("not json"),
            Err(DecodeError::MalformedEnvelope)
        );
        assert_eq!(
            ClientToServer::decode(r#"{"data":{}}"#),
            Err(DecodeError::MalformedEnvelope)
        );
    }

    #[test]
    fn test_malformed_sub_document() {
        let err = ClientToServer::decode(r#"{"type":"connect","data":{"playerName":"x"}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid connect data");

        let err = ClientToServer::decode(r#"{"type":"connect","data":{"playerId":"  "}}"#)
            .unwrap_err();
        assert_eq!(err, DecodeError::InvalidData("connect"));

        let err = ClientToServer::decode(r#"{"type":"join_lobby","data":{"lobbyId":7}}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid join data");
    }

    #[test]
    fn test_unknown_type() {
        let err = ClientToServer::decode(r#"{"type":"shuffle","data":{}}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownType("shuffle".to_string()));
        assert_eq!(err.to_string(), "Unknown message type");
    }
}
