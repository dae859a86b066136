use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub suit: String,
    pub rank: String,
    pub value: u32,
}

// Only created when a lobby starts; card play does not touch it yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub current_round: u32,
    pub current_turn: usize,
    pub deck: Vec<Card>,
    pub discard_pile: Vec<Card>,
    pub player_hands: HashMap<String, Vec<Card>>,
    pub started: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            current_round: 1,
            current_turn: 0,
            deck: Vec::new(),
            discard_pile: Vec::new(),
            player_hands: HashMap::new(),
            started: false,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
