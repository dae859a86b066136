use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub type ClientId = Uuid;

/// What the hub needs to know about one live connection.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub player_id: Option<String>,
    pub lobby_id: Option<String>,
    /// The only strong sender of the client's outbound queue.
    /// Dropping it closes the queue and ends the client's writer.
    pub outbound: mpsc::Sender<String>,
}

/// Lobby binding of a session at the time it goes away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub player_id: String,
    pub lobby_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub clients: usize,
    pub subscribers: HashMap<String, usize>,
}

#[derive(Debug)]
pub enum HubEvent {
    /// A new connection; subscribed right away if it already carries a lobby id
    Register(ClientHandle),
    Subscribe {
        client_id: ClientId,
        player_id: String,
        lobby_id: String,
    },
    Unsubscribe {
        client_id: ClientId,
    },
    /// Connection is gone; leaves `membership` in the registry if set
    Unregister {
        client_id: ClientId,
        membership: Option<Membership>,
    },
    Broadcast {
        lobby_id: String,
        payload: String,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}
