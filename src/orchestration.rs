//! Integration points for the external game-session orchestration service.
//!
//! The vendor SDK itself is a binding over a native library and lives outside
//! this crate. It is reached through [`SessionOrchestrator`]; it calls back
//! into [`OrchestrationCallbacks`], which only needs the registry.
use crate::lobby::{Lobby, MAX_PLAYERS, Player};
use crate::registry::SessionRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("orchestration SDK not initialized")]
    NotInitialized,
    #[error("process already reported ready")]
    AlreadyReady,
}

/// A game session handed to this process by the orchestration service.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub game_session_id: String,
    pub name: String,
    pub maximum_player_session_count: usize,
    pub creator_id: Option<String>,
}

impl GameSession {
    pub fn new(game_session_id: impl Into<String>) -> Self {
        let game_session_id = game_session_id.into();
        Self {
            name: game_session_id.clone(),
            game_session_id,
            maximum_player_session_count: MAX_PLAYERS,
            creator_id: None,
        }
    }
}

/// Calls this process makes into the orchestration service.
pub trait SessionOrchestrator: Send + Sync {
    /// Announces the process as able to host sessions; the service answers
    /// through `callbacks` from then on.
    fn process_ready(
        &self,
        port: u16,
        log_paths: &[String],
        callbacks: Arc<OrchestrationCallbacks>,
    ) -> Result<(), OrchestrationError>;

    fn activate_game_session(&self, game_session_id: &str) -> Result<(), OrchestrationError>;

    fn process_ending(&self) -> Result<(), OrchestrationError>;
}

/// Used when no vendor binding is linked in. Plays the service's part
/// locally: once ready it hands over the configured session, if any, and
/// polls the health callback on a fixed period.
pub struct StandaloneOrchestrator {
    fleet_id: String,
    initial_session: Option<GameSession>,
    health_interval: Duration,
    ready: AtomicBool,
}

impl StandaloneOrchestrator {
    pub fn new(fleet_id: impl Into<String>) -> Self {
        Self {
            fleet_id: fleet_id.into(),
            initial_session: None,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            ready: AtomicBool::new(false),
        }
    }

    pub fn with_session(mut self, session: GameSession) -> Self {
        self.initial_session = Some(session);
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    fn ensure_ready(&self) -> Result<(), OrchestrationError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OrchestrationError::NotInitialized)
        }
    }
}

impl SessionOrchestrator for StandaloneOrchestrator {
    fn process_ready(
        &self,
        port: u16,
        log_paths: &[String],
        callbacks: Arc<OrchestrationCallbacks>,
    ) -> Result<(), OrchestrationError> {
        if self.ready.swap(true, Ordering::SeqCst) {
            return Err(OrchestrationError::AlreadyReady);
        }
        info!(
            "Process ready on port {} for fleet {} (log paths: {:?})",
            port, self.fleet_id, log_paths
        );
        tokio::spawn(drive_callbacks(
            Arc::downgrade(&callbacks),
            self.initial_session.clone(),
            self.health_interval,
        ));
        Ok(())
    }

    fn activate_game_session(&self, game_session_id: &str) -> Result<(), OrchestrationError> {
        self.ensure_ready()?;
        info!("Game session {} active", game_session_id);
        Ok(())
    }

    fn process_ending(&self) -> Result<(), OrchestrationError> {
        if !self.ready.swap(false, Ordering::SeqCst) {
            return Err(OrchestrationError::NotInitialized);
        }
        info!("Process ending for fleet {}", self.fleet_id);
        Ok(())
    }
}

/// Runs until the callbacks are dropped.
async fn drive_callbacks(
    callbacks: Weak<OrchestrationCallbacks>,
    session: Option<GameSession>,
    health_interval: Duration,
) {
    if let Some(session) = session {
        let Some(callbacks) = callbacks.upgrade() else {
            return;
        };
        callbacks.on_start_game_session(session).await;
    }

    let mut ticker = tokio::time::interval(health_interval);
    loop {
        ticker.tick().await;
        let Some(callbacks) = callbacks.upgrade() else {
            break;
        };
        if !callbacks.on_health_check() {
            warn!("Health check reported unhealthy");
        }
    }
    debug!("Orchestration callbacks dropped, health polling stopped");
}

/// What the orchestration service may call on this process.
pub struct OrchestrationCallbacks {
    registry: Arc<SessionRegistry>,
    orchestrator: Arc<dyn SessionOrchestrator>,
}

impl OrchestrationCallbacks {
    pub fn new(registry: Arc<SessionRegistry>, orchestrator: Arc<dyn SessionOrchestrator>) -> Self {
        Self {
            registry,
            orchestrator,
        }
    }

    /// Opens a lobby for the new session, then tells the service it can
    /// start sending players.
    pub async fn on_start_game_session(&self, session: GameSession) -> Lobby {
        info!(
            "OnStartGameSession: {} (max players {})",
            session.game_session_id, session.maximum_player_session_count
        );

        let host_id = session
            .creator_id
            .clone()
            .unwrap_or_else(|| session.game_session_id.clone());
        let lobby = self
            .registry
            .create_lobby(Player::new(host_id, session.name.clone()))
            .await;

        if let Err(e) = self.orchestrator.activate_game_session(&session.game_session_id) {
            warn!("Failed to activate game session {}: {}", session.game_session_id, e);
        }
        lobby
    }

    pub fn on_health_check(&self) -> bool {
        let healthy = true;
        info!("OnHealthCheck: reporting healthy={}", healthy);
        healthy
    }

    pub async fn on_process_terminate(&self) {
        info!(
            "OnProcessTerminate: {} lobbies still open",
            self.registry.lobby_count().await
        );
        if let Err(e) = self.orchestrator.process_ending() {
            warn!("Error notifying process ending: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaperSettings;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOrchestrator {
        calls: Mutex<Vec<String>>,
    }

    impl SessionOrchestrator for RecordingOrchestrator {
        fn process_ready(
            &self,
            port: u16,
            _log_paths: &[String],
            _callbacks: Arc<OrchestrationCallbacks>,
        ) -> Result<(), OrchestrationError> {
            self.calls.lock().unwrap().push(format!("ready:{port}"));
            Ok(())
        }

        fn activate_game_session(&self, game_session_id: &str) -> Result<(), OrchestrationError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("activate:{game_session_id}"));
            Ok(())
        }

        fn process_ending(&self) -> Result<(), OrchestrationError> {
            self.calls.lock().unwrap().push("ending".to_string());
            Err(OrchestrationError::NotInitialized)
        }
    }

    fn setup() -> (Arc<SessionRegistry>, Arc<RecordingOrchestrator>, OrchestrationCallbacks) {
        let registry = Arc::new(SessionRegistry::new(ReaperSettings::default()));
        let orchestrator = Arc::new(RecordingOrchestrator::default());
        let callbacks = OrchestrationCallbacks::new(registry.clone(), orchestrator.clone());
        (registry, orchestrator, callbacks)
    }

    fn session(creator_id: Option<&str>) -> GameSession {
        GameSession {
            name: "Friday table".to_string(),
            creator_id: creator_id.map(str::to_string),
            ..GameSession::new("gsess-1")
        }
    }

    #[tokio::test]
    async fn test_start_game_session_creates_lobby_and_activates() {
        let (registry, orchestrator, callbacks) = setup();

        let lobby = callbacks.on_start_game_session(session(Some("creator"))).await;

        let stored = registry.get_lobby(&lobby.id).await.unwrap();
        assert_eq!(stored.players[0].id, "creator");
        assert_eq!(stored.players[0].name, "Friday table");
        assert_eq!(
            *orchestrator.calls.lock().unwrap(),
            vec!["activate:gsess-1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_start_game_session_without_creator_uses_session_id() {
        let (_registry, _orchestrator, callbacks) = setup();
        let lobby = callbacks.on_start_game_session(session(None)).await;
        assert_eq!(lobby.players[0].id, "gsess-1");
    }

    #[tokio::test]
    async fn test_health_and_termination() {
        let (_registry, orchestrator, callbacks) = setup();

        assert!(callbacks.on_health_check());
        // A failing process_ending is logged, not propagated.
        callbacks.on_process_terminate().await;
        assert_eq!(*orchestrator.calls.lock().unwrap(), vec!["ending".to_string()]);
    }

    fn standalone(
        orchestrator: StandaloneOrchestrator,
    ) -> (Arc<SessionRegistry>, Arc<StandaloneOrchestrator>, Arc<OrchestrationCallbacks>) {
        let registry = Arc::new(SessionRegistry::new(ReaperSettings::default()));
        let orchestrator = Arc::new(orchestrator);
        let callbacks = Arc::new(OrchestrationCallbacks::new(
            registry.clone(),
            orchestrator.clone(),
        ));
        (registry, orchestrator, callbacks)
    }

    #[tokio::test]
    async fn test_standalone_rejects_calls_before_ready() {
        let (_registry, orchestrator, callbacks) = standalone(StandaloneOrchestrator::new("fleet"));

        assert!(matches!(
            orchestrator.activate_game_session("gsess-1"),
            Err(OrchestrationError::NotInitialized)
        ));
        assert!(matches!(
            orchestrator.process_ending(),
            Err(OrchestrationError::NotInitialized)
        ));

        orchestrator.process_ready(8080, &[], callbacks.clone()).unwrap();
        assert!(matches!(
            orchestrator.process_ready(8080, &[], callbacks),
            Err(OrchestrationError::AlreadyReady)
        ));
        assert!(orchestrator.activate_game_session("gsess-1").is_ok());
    }

    #[tokio::test]
    async fn test_standalone_hands_over_configured_session() {
        let (registry, orchestrator, callbacks) = standalone(
            StandaloneOrchestrator::new("fleet")
                .with_session(GameSession::new("gsess-9"))
                .with_health_interval(Duration::from_millis(10)),
        );

        orchestrator.process_ready(8080, &[], callbacks.clone()).unwrap();

        let lobby = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(lobby) = registry.lobbies().await.pop() {
                    return lobby;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session was never delivered");
        assert_eq!(lobby.players[0].id, "gsess-9");
        assert_eq!(lobby.max_players, MAX_PLAYERS);
    }

    #[tokio::test]
    async fn test_terminate_ends_standalone_process() {
        let (_registry, orchestrator, callbacks) = standalone(StandaloneOrchestrator::new("fleet"));
        orchestrator.process_ready(8080, &[], callbacks.clone()).unwrap();

        callbacks.on_process_terminate().await;

        // Ending has been reported, so a second report is refused.
        assert!(matches!(
            orchestrator.process_ending(),
            Err(OrchestrationError::NotInitialized)
        ));
    }
}
