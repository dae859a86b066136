use crate::config::ConnectionLimits;
use crate::hub::HubHandle;
use crate::lobby::Player;
use crate::messages::{
    ClientHandle, ClientId, ClientToServer, ConnectData, CreateLobbyData, DecodeError,
    JoinLobbyData, Membership, ServerToClient,
};
use crate::registry::SessionRegistry;
use actix_ws::{AggregatedMessage, ProtocolError};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where a connection stands. Only dispatch moves it between variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unidentified,
    Identified { player_id: String },
    InLobby { player_id: String, lobby_id: String },
}

impl SessionState {
    pub fn player_id(&self) -> Option<&str> {
        match self {
            Self::Unidentified => None,
            Self::Identified { player_id } | Self::InLobby { player_id, .. } => {
                Some(player_id.as_str())
            }
        }
    }

    pub fn membership(&self) -> Option<Membership> {
        match self {
            Self::InLobby {
                player_id,
                lobby_id,
            } => Some(Membership {
                player_id: player_id.clone(),
                lobby_id: lobby_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Per-connection state and dispatch, independent of the transport.
pub struct ClientSession {
    id: ClientId,
    state: SessionState,
    registry: Arc<SessionRegistry>,
    hub: HubHandle,
    // The hub owns the strong sender; replies stop once it lets go.
    outbound: mpsc::WeakSender<String>,
}

impl ClientSession {
    /// Registers a fresh connection with the hub and hands back the
    /// receiving end of its outbound queue.
    pub async fn open(
        registry: Arc<SessionRegistry>,
        hub: HubHandle,
        queue_size: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel::<String>(queue_size);
        let id = Uuid::new_v4();
        let session = Self {
            id,
            state: SessionState::Unidentified,
            registry,
            hub: hub.clone(),
            outbound: tx.downgrade(),
        };
        hub.register(ClientHandle {
            id,
            player_id: None,
            lobby_id: None,
            outbound: tx,
        })
        .await;
        (session, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Direct reply to this connection only. Never waits on the queue.
    pub fn reply(&self, message: ServerToClient) {
        let Some(tx) = self.outbound.upgrade() else {
            debug!("Client {} outbound queue closed, dropping reply", self.id);
            return;
        };
        match tx.try_send(message.to_json()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Client {} send buffer full", self.id),
            Err(TrySendError::Closed(_)) => {
                debug!("Client {} outbound queue closed, dropping reply", self.id)
            }
        }
    }

    fn reply_error(&self, message: &str) {
        self.reply(ServerToClient::error(message));
    }

    /// Decodes one text frame and acts on it. Bad input only ever earns the
    /// sender an error reply.
    pub async fn dispatch(&mut self, frame: &str) {
        let action = match ClientToServer::decode(frame) {
            Ok(action) => action,
            Err(e) => {
                match &e {
                    DecodeError::UnknownType(kind) => {
                        debug!("Unknown message type {:?} from client {}", kind, self.id)
                    }
                    _ => debug!("Rejected frame from client {}: {}", self.id, e),
                }
                self.reply_error(&e.to_string());
                return;
            }
        };

        debug!(
            "Received message: type={} from player={:?}",
            action.kind(),
            self.state.player_id()
        );

        match action {
            ClientToServer::Connect(data) => self.handle_connect(data),
            ClientToServer::CreateLobby(data) => self.handle_create_lobby(data).await,
            ClientToServer::JoinLobby(data) => self.handle_join_lobby(data).await,
            ClientToServer::LeaveLobby => self.handle_leave_lobby().await,
            ClientToServer::StartGame => self.handle_start_game().await,
            ClientToServer::PlayCard { data } => self.handle_play_card(data).await,
        }
    }

    fn handle_connect(&mut self, data: ConnectData) {
        if let SessionState::InLobby { .. } = self.state {
            self.reply_error("Already in a lobby");
            return;
        }
        debug!(
            "Client {} identified as {} ({})",
            self.id, data.player_id, data.player_name
        );
        self.state = SessionState::Identified {
            player_id: data.player_id,
        };
        self.reply(ServerToClient::connected());
    }

    async fn handle_create_lobby(&mut self, data: CreateLobbyData) {
        let player_id = match &self.state {
            SessionState::Identified { player_id } => player_id.clone(),
            SessionState::Unidentified => return self.reply_error("Not connected"),
            SessionState::InLobby { .. } => return self.reply_error("Already in a lobby"),
        };

        let lobby = self
            .registry
            .create_lobby(Player::new(player_id.clone(), data.player_name))
            .await;

        self.hub.subscribe(self.id, &player_id, &lobby.id).await;
        self.state = SessionState::InLobby {
            player_id,
            lobby_id: lobby.id.clone(),
        };
        self.reply(ServerToClient::lobby_created(lobby));
    }

    async fn handle_join_lobby(&mut self, data: JoinLobbyData) {
        let player_id = match &self.state {
            SessionState::Identified { player_id } => player_id.clone(),
            SessionState::Unidentified => return self.reply_error("Not connected"),
            SessionState::InLobby { .. } => return self.reply_error("Already in a lobby"),
        };

        let player = Player::new(player_id.clone(), data.player_name);
        let lobby = match self.registry.join_lobby(&data.lobby_id, player.clone()).await {
            Ok(lobby) => lobby,
            Err(e) => {
                debug!("Player {} failed to join {}: {}", player_id, data.lobby_id, e);
                return self.reply_error(&format!("Failed to join lobby: {}", e));
            }
        };

        // Subscribe first so the joiner also sees its own player_joined.
        self.hub.subscribe(self.id, &player_id, &lobby.id).await;
        self.state = SessionState::InLobby {
            player_id,
            lobby_id: lobby.id.clone(),
        };
        let lobby_id = lobby.id.clone();
        self.hub
            .broadcast_to_lobby(&lobby_id, &ServerToClient::player_joined(lobby, player))
            .await;
    }

    async fn handle_leave_lobby(&mut self) {
        let SessionState::InLobby {
            player_id,
            lobby_id,
        } = &self.state
        else {
            return self.reply_error("Not in a lobby");
        };
        let (player_id, lobby_id) = (player_id.clone(), lobby_id.clone());

        if self.registry.leave_lobby(&lobby_id, &player_id).await {
            // The leaver is still subscribed for this one notice.
            self.hub
                .broadcast_to_lobby(&lobby_id, &ServerToClient::player_left(&player_id))
                .await;
        } else {
            debug!("Player {} was no longer in lobby {}", player_id, lobby_id);
        }
        self.hub.unsubscribe(self.id).await;
        self.state = SessionState::Identified { player_id };
    }

    async fn handle_start_game(&mut self) {
        let Some(lobby_id) = self.current_lobby() else {
            return self.reply_error("Not in a lobby");
        };

        match self.registry.start_game(&lobby_id).await {
            Ok(lobby) => {
                self.hub
                    .broadcast_to_lobby(&lobby_id, &ServerToClient::GameStarted { lobby })
                    .await
            }
            Err(e) => self.reply_error(&format!("Failed to start game: {}", e)),
        }
    }

    async fn handle_play_card(&mut self, data: Value) {
        let Some(lobby_id) = self.current_lobby() else {
            return self.reply_error("Not in a lobby");
        };

        // TODO: validate against the hand once the card rules engine exists.
        info!(
            "Play card action from player {:?} in lobby {}: {}",
            self.state.player_id(),
            lobby_id,
            data
        );
        self.hub
            .broadcast_to_lobby(&lobby_id, &ServerToClient::card_played())
            .await;
    }

    fn current_lobby(&self) -> Option<String> {
        match &self.state {
            SessionState::InLobby { lobby_id, .. } => Some(lobby_id.clone()),
            _ => None,
        }
    }

    /// Hands the connection back to the hub exactly once. Consumes the
    /// session so it cannot run twice.
    pub async fn teardown(self) {
        self.hub.unregister(self.id, self.state.membership()).await;
    }
}

#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Sending half of a WebSocket, as the connection loops use it.
trait FrameSink {
    async fn text(&mut self, frame: String) -> Result<(), ConnectionClosed>;
    async fn ping(&mut self) -> Result<(), ConnectionClosed>;
    async fn pong(&mut self, payload: &[u8]) -> Result<(), ConnectionClosed>;
    async fn close(self);
}

impl FrameSink for actix_ws::Session {
    async fn text(&mut self, frame: String) -> Result<(), ConnectionClosed> {
        actix_ws::Session::text(self, frame)
            .await
            .map_err(|_| ConnectionClosed)
    }

    async fn ping(&mut self) -> Result<(), ConnectionClosed> {
        actix_ws::Session::ping(self, b"")
            .await
            .map_err(|_| ConnectionClosed)
    }

    async fn pong(&mut self, payload: &[u8]) -> Result<(), ConnectionClosed> {
        actix_ws::Session::pong(self, payload)
            .await
            .map_err(|_| ConnectionClosed)
    }

    async fn close(self) {
        let _ = actix_ws::Session::close(self, None).await;
    }
}

/// Bridges one upgraded WebSocket to the hub and registry. Returns once the
/// connection is gone and has been unregistered.
pub async fn handle_client(
    session: actix_ws::Session,
    stream: actix_ws::MessageStream,
    registry: Arc<SessionRegistry>,
    hub: HubHandle,
    limits: ConnectionLimits,
) {
    let (mut client, outbound_rx) = ClientSession::open(registry, hub, limits.send_queue).await;
    let client_id = client.id();
    info!("Client {} connected", client_id);

    // Dropped by the writer when it exits, which stops the reader too.
    let (writer_done_tx, writer_done_rx) = oneshot::channel::<()>();
    actix_web::rt::spawn(handle_client_writer(
        session.clone(),
        outbound_rx,
        limits,
        writer_done_tx,
    ));

    let frames = stream
        .max_frame_size(limits.max_message_size)
        .aggregate_continuations()
        .max_continuation_size(limits.max_message_size);
    read_frames(&mut client, session.clone(), frames, limits, writer_done_rx).await;

    debug!("Client {} closing in state {:?}", client_id, client.state());
    client.teardown().await;
    FrameSink::close(session).await;
    debug!("Client {} cleanup complete", client_id);
}

async fn read_frames<S, K>(
    client: &mut ClientSession,
    mut sink: K,
    frames: S,
    limits: ConnectionLimits,
    mut writer_done: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<AggregatedMessage, ProtocolError>>,
    K: FrameSink,
{
    let mut frames = std::pin::pin!(frames);

    loop {
        let next = tokio::select! {
            _ = &mut writer_done => {
                debug!("Client {} writer stopped", client.id());
                break;
            }
            next = timeout(limits.pong_wait, frames.next()) => next,
        };

        let message = match next {
            Err(_) => {
                info!("Client {} idle for {:?}, disconnecting", client.id(), limits.pong_wait);
                break;
            }
            Ok(None) => {
                info!("Client {} disconnected", client.id());
                break;
            }
            Ok(Some(Err(e))) => {
                warn!("WebSocket error from client {}: {}", client.id(), e);
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            AggregatedMessage::Text(text) => client.dispatch(&text).await,
            AggregatedMessage::Binary(_) => {
                client.reply(ServerToClient::error("Invalid message format"));
            }
            AggregatedMessage::Ping(bytes) => {
                if sink.pong(&bytes).await.is_err() {
                    break;
                }
            }
            AggregatedMessage::Pong(_) => {}
            AggregatedMessage::Close(reason) => {
                debug!("Client {} closed: {:?}", client.id(), reason);
                break;
            }
        }
    }
}

/// Drains the outbound queue to the socket and pings on every idle period.
/// Sends a close frame on the way out, whatever the reason.
async fn handle_client_writer<K: FrameSink>(
    mut sink: K,
    mut rx: mpsc::Receiver<String>,
    limits: ConnectionLimits,
    _done: oneshot::Sender<()>,
) {
    let mut ticker = tokio::time::interval(limits.ping_period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(first) = message else {
                    debug!("Outbound queue closed");
                    break;
                };
                let frame = coalesce(first, &mut rx, limits.send_queue);
                match timeout(limits.write_wait, sink.text(frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("Writer stopping: {}", e);
                        break;
                    }
                    Err(_) => {
                        error!("Write to client timed out after {:?}", limits.write_wait);
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if !matches!(timeout(limits.write_wait, sink.ping()).await, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }

    sink.close().await;
}

/// Folds messages that are already queued behind `first` into one
/// newline-separated frame of at most `limit` messages.
fn coalesce(mut frame: String, rx: &mut mpsc::Receiver<String>, limit: usize) -> String {
    for _ in 1..limit {
        match rx.try_recv() {
            Ok(next) => {
                frame.push('\n');
                frame.push_str(&next);
            }
            Err(_) => break,
        }
    }
    frame
}
