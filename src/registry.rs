use crate::config::ReaperSettings;
use crate::lobby::{Lobby, LobbyError, Player};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Authoritative store of lobby state.
///
/// Every lobby field is read and written under `lobbies`; there is no
/// per-lobby lock, so nothing outside this type ever holds a `&mut Lobby`.
/// Operations report failure through their return value and never panic.
pub struct SessionRegistry {
    lobbies: RwLock<HashMap<String, Lobby>>,
    reaper: ReaperSettings,
}

impl SessionRegistry {
    pub fn new(reaper: ReaperSettings) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            reaper,
        }
    }

    /// Builds the registry and spawns its inactivity reaper.
    /// The reaper stops once the last strong handle is dropped.
    pub fn start(reaper: ReaperSettings) -> Arc<Self> {
        let registry = Arc::new(Self::new(reaper));
        tokio::spawn(reap_inactive_lobbies(Arc::downgrade(&registry), reaper));
        info!(
            "Lobby reaper started (every {:?}, max idle {:?})",
            reaper.interval, reaper.max_idle
        );
        registry
    }

    pub async fn create_lobby(&self, host: Player) -> Lobby {
        let lobby = Lobby::new(host);
        let snapshot = lobby.clone();
        self.lobbies.write().await.insert(lobby.id.clone(), lobby);

        info!("Created lobby {} with host {}", snapshot.id, snapshot.players[0].id);
        snapshot
    }

    pub async fn get_lobby(&self, lobby_id: &str) -> Option<Lobby> {
        self.lobbies.read().await.get(lobby_id).cloned()
    }

    pub async fn lobbies(&self) -> Vec<Lobby> {
        self.lobbies.read().await.values().cloned().collect()
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }

    pub async fn join_lobby(&self, lobby_id: &str, player: Player) -> Result<Lobby, LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| LobbyError::NotFound(lobby_id.to_string()))?;

        let player_id = player.id.clone();
        lobby.add_player(player)?;

        info!("Player {} joined lobby {}", player_id, lobby_id);
        Ok(lobby.clone())
    }

    /// Removes the player and drops the lobby once it is empty.
    /// Returns whether a player was actually removed.
    pub async fn leave_lobby(&self, lobby_id: &str, player_id: &str) -> bool {
        let mut lobbies = self.lobbies.write().await;
        let Some(lobby) = lobbies.get_mut(lobby_id) else {
            return false;
        };

        let removed = lobby.remove_player(player_id).is_some();

        if lobby.is_empty() {
            lobbies.remove(lobby_id);
            info!("Removed empty lobby {}", lobby_id);
        } else if removed {
            info!("Player {} left lobby {}", player_id, lobby_id);
        }

        removed
    }

    pub async fn start_game(&self, lobby_id: &str) -> Result<Lobby, LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| LobbyError::NotFound(lobby_id.to_string()))?;

        lobby.start_game()?;

        info!(
            "Started game in lobby {} with {} players",
            lobby_id,
            lobby.players.len()
        );
        Ok(lobby.clone())
    }

    /// Deletes every lobby whose last activity is older than the configured
    /// idle limit relative to `now`, whatever its player count.
    pub async fn sweep_inactive(&self, now: DateTime<Utc>) -> usize {
        let max_idle = TimeDelta::from_std(self.reaper.max_idle).unwrap_or(TimeDelta::MAX);
        let cutoff = now
            .checked_sub_signed(max_idle)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut lobbies = self.lobbies.write().await;
        let before = lobbies.len();
        lobbies.retain(|id, lobby| {
            let keep = lobby.last_activity >= cutoff;
            if !keep {
                info!("Cleaned up inactive lobby {}", id);
            }
            keep
        });
        before - lobbies.len()
    }
}

async fn reap_inactive_lobbies(registry: Weak<SessionRegistry>, settings: ReaperSettings) {
    let mut ticker = tokio::time::interval(settings.interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(registry) = registry.upgrade() else {
            break;
        };
        let reaped = registry.sweep_inactive(Utc::now()).await;
        debug!("Reaper sweep removed {} lobbies", reaped);
    }
    debug!("Lobby reaper stopped");
}
