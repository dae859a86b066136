use super::broadcaster::LobbyBroadcaster;
use crate::{
    messages::{HubEvent, Membership, ServerToClient},
    registry::SessionRegistry,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The hub loop. Sole owner of the connection set and subscriber index;
/// events are applied one at a time in arrival order.
pub async fn hub_task(mut rx: mpsc::Receiver<HubEvent>, registry: Arc<SessionRegistry>) {
    let mut broadcaster = LobbyBroadcaster::new();

    info!("Connection hub started");

    while let Some(event) = rx.recv().await {
        match event {
            HubEvent::Register(client) => {
                debug!(
                    "Client registered: id={} player={:?} lobby={:?}",
                    client.id, client.player_id, client.lobby_id
                );
                broadcaster.register(client);
            }
            HubEvent::Subscribe {
                client_id,
                player_id,
                lobby_id,
            } => {
                if broadcaster.subscribe(client_id, player_id, lobby_id.clone()) {
                    debug!("Client {} subscribed to lobby {}", client_id, lobby_id);
                } else {
                    debug!("Ignoring subscribe for unknown client {}", client_id);
                }
            }
            HubEvent::Unsubscribe { client_id } => {
                broadcaster.unsubscribe(client_id);
            }
            HubEvent::Unregister {
                client_id,
                membership,
            } => {
                // Dropping the handle closes the client's outbound queue.
                let was_live = broadcaster.remove(client_id).is_some();
                if let Some(membership) = membership {
                    depart_lobby(&registry, &mut broadcaster, membership).await;
                }
                info!("Client unregistered: id={} live={}", client_id, was_live);
            }
            HubEvent::Broadcast { lobby_id, payload } => {
                let evicted = broadcaster.broadcast_to_lobby(&lobby_id, &payload);
                if !evicted.is_empty() {
                    info!(
                        "Evicted {} stalled clients from lobby {}",
                        evicted.len(),
                        lobby_id
                    );
                }
            }
            HubEvent::Stats { reply } => {
                let _ = reply.send(broadcaster.stats());
            }
        }
    }

    debug!("Connection hub stopped");
}

async fn depart_lobby(
    registry: &SessionRegistry,
    broadcaster: &mut LobbyBroadcaster,
    membership: Membership,
) {
    let Membership {
        player_id,
        lobby_id,
    } = membership;

    if registry.leave_lobby(&lobby_id, &player_id).await {
        let notice = ServerToClient::player_left(&player_id).to_json();
        broadcaster.broadcast_to_lobby(&lobby_id, &notice);
    }
}
