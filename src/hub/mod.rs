//! Real-time fan-out of server messages to the connections of a lobby.
//!
//! The hub runs as one task ([`task::hub_task`]) and is only reachable
//! through a [`HubHandle`]. Delivery never waits on a client: a subscriber
//! whose outbound queue is full is dropped instead.
//!
//! The event queue into the hub is bounded. A session that outpaces the hub
//! waits in its own read loop, which stops it reading from its socket.
pub mod broadcaster;
pub mod task;

use crate::messages::{ClientHandle, ClientId, HubEvent, HubStats, Membership, ServerToClient};
use crate::registry::SessionRegistry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Hub events that may be queued before senders have to wait.
pub const EVENT_QUEUE: usize = 1024;

/// Starts the hub task and returns the handle used to talk to it.
pub fn spawn(registry: Arc<SessionRegistry>) -> HubHandle {
    let (tx, rx) = mpsc::channel::<HubEvent>(EVENT_QUEUE);
    tokio::spawn(task::hub_task(rx, registry));
    HubHandle { tx }
}

#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    async fn send(&self, event: HubEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("Connection hub is gone, dropping event");
        }
    }

    pub async fn register(&self, client: ClientHandle) {
        self.send(HubEvent::Register(client)).await;
    }

    pub async fn subscribe(&self, client_id: ClientId, player_id: &str, lobby_id: &str) {
        self.send(HubEvent::Subscribe {
            client_id,
            player_id: player_id.to_string(),
            lobby_id: lobby_id.to_string(),
        })
        .await;
    }

    pub async fn unsubscribe(&self, client_id: ClientId) {
        self.send(HubEvent::Unsubscribe { client_id }).await;
    }

    pub async fn unregister(&self, client_id: ClientId, membership: Option<Membership>) {
        self.send(HubEvent::Unregister {
            client_id,
            membership,
        })
        .await;
    }

    pub async fn broadcast_to_lobby(&self, lobby_id: &str, message: &ServerToClient) {
        self.send(HubEvent::Broadcast {
            lobby_id: lobby_id.to_string(),
            payload: message.to_json(),
        })
        .await;
    }

    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Stats { reply }).await;
        rx.await.ok()
    }
}
