pub mod error;
pub mod game_state;
pub mod lobby;

pub use error::LobbyError;
pub use lobby::{Lobby, Player, MAX_PLAYERS};
