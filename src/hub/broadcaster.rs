use crate::messages::{ClientHandle, ClientId, HubStats};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Live connections plus the lobby → subscriber index.
///
/// Owned by the hub task alone, so none of this needs locking.
pub struct LobbyBroadcaster {
    clients: HashMap<ClientId, ClientHandle>,
    lobby_clients: HashMap<String, HashSet<ClientId>>,
}

impl LobbyBroadcaster {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            lobby_clients: HashMap::new(),
        }
    }

    pub fn register(&mut self, client: ClientHandle) {
        let client_id = client.id;
        if let Some(lobby_id) = client.lobby_id.clone() {
            self.lobby_clients
                .entry(lobby_id)
                .or_default()
                .insert(client_id);
        }
        self.clients.insert(client_id, client);
    }

    /// Moves a registered client into `lobby_id`'s subscriber set,
    /// leaving whatever lobby it was subscribed to before.
    pub fn subscribe(&mut self, client_id: ClientId, player_id: String, lobby_id: String) -> bool {
        let previous = match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.player_id = Some(player_id);
                client.lobby_id.replace(lobby_id.clone())
            }
            None => return false,
        };
        if let Some(previous) = previous {
            self.detach(client_id, &previous);
        }
        self.lobby_clients
            .entry(lobby_id)
            .or_default()
            .insert(client_id);
        true
    }

    pub fn unsubscribe(&mut self, client_id: ClientId) {
        let previous = self
            .clients
            .get_mut(&client_id)
            .and_then(|client| client.lobby_id.take());
        if let Some(previous) = previous {
            self.detach(client_id, &previous);
        }
    }

    /// Forgets the client entirely. The returned handle owns the outbound
    /// sender; dropping it closes the client's queue.
    pub fn remove(&mut self, client_id: ClientId) -> Option<ClientHandle> {
        let client = self.clients.remove(&client_id)?;
        if let Some(lobby_id) = &client.lobby_id {
            self.detach(client_id, lobby_id);
        }
        Some(client)
    }

    /// Queues `payload` for every subscriber of `lobby_id` without waiting.
    /// Subscribers whose queue is full or closed are evicted; their ids are
    /// returned.
    pub fn broadcast_to_lobby(&mut self, lobby_id: &str, payload: &str) -> Vec<ClientId> {
        let Some(subscribers) = self.lobby_clients.get(lobby_id) else {
            debug!("Broadcast to lobby {} without subscribers", lobby_id);
            return Vec::new();
        };

        let mut dead = Vec::new();
        for client_id in subscribers {
            let Some(client) = self.clients.get(client_id) else {
                dead.push(*client_id);
                continue;
            };
            match client.outbound.try_send(payload.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Client {} send buffer full, dropping connection", client_id);
                    dead.push(*client_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Client {} outbound queue already closed", client_id);
                    dead.push(*client_id);
                }
            }
        }

        for client_id in &dead {
            self.remove(*client_id);
            // Stale index entries have no client record to clear them.
            self.detach(*client_id, lobby_id);
        }
        dead
    }

    #[cfg(test)]
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            clients: self.clients.len(),
            subscribers: self
                .lobby_clients
                .iter()
                .map(|(lobby_id, ids)| (lobby_id.clone(), ids.len()))
                .collect(),
        }
    }

    fn detach(&mut self, client_id: ClientId, lobby_id: &str) {
        if let Some(ids) = self.lobby_clients.get_mut(lobby_id) {
            ids.remove(&client_id);
            if ids.is_empty() {
                self.lobby_clients.remove(lobby_id);
            }
        }
    }
}

impl Default for LobbyBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn client(lobby_id: Option<&str>, capacity: usize) -> (ClientHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = ClientHandle {
            id: Uuid::new_v4(),
            player_id: None,
            lobby_id: lobby_id.map(str::to_string),
            outbound: tx,
        };
        (handle, rx)
    }

    #[test]
    fn test_register_with_lobby_subscribes() {
        let mut broadcaster = LobbyBroadcaster::new();
        let (a, _rx_a) = client(Some("lobby"), 4);
        let (b, _rx_b) = client(None, 4);
        broadcaster.register(a);
        broadcaster.register(b);

        let stats = broadcaster.stats();
        assert_eq!(stats.clients, 2);
        assert_eq!(stats.subscribers.get("lobby"), Some(&1));
    }

    #[test]
    fn test_broadcast_reaches_only_lobby_subscribers() {
        let mut broadcaster = LobbyBroadcaster::new();
        let (a, mut rx_a) = client(Some("one"), 4);
        let (b, mut rx_b) = client(Some("two"), 4);
        broadcaster.register(a);
        broadcaster.register(b);

        let evicted = broadcaster.broadcast_to_lobby("one", "hello");
        assert!(evicted.is_empty());
        assert_eq!(rx_a.try_recv().unwrap(), "hello");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_evicts_only_the_stalled_client() {
        let mut broadcaster = LobbyBroadcaster::new();
        let (fast_a, mut rx_a) = client(Some("lobby"), 4);
        let (fast_b, mut rx_b) = client(Some("lobby"), 4);
        let (slow, mut rx_slow) = client(Some("lobby"), 1);
        let slow_id = slow.id;
        slow.outbound.try_send("backlog".to_string()).unwrap();
        broadcaster.register(fast_a);
        broadcaster.register(fast_b);
        broadcaster.register(slow);

        let evicted = broadcaster.broadcast_to_lobby("lobby", "update");
        assert_eq!(evicted, vec![slow_id]);
        assert_eq!(rx_a.try_recv().unwrap(), "update");
        assert_eq!(rx_b.try_recv().unwrap(), "update");

        // The stalled queue keeps its backlog, then reports closed.
        assert_eq!(rx_slow.try_recv().unwrap(), "backlog");
        assert_eq!(
            rx_slow.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );

        assert!(!broadcaster.contains(slow_id));
        assert_eq!(broadcaster.stats().subscribers.get("lobby"), Some(&2));
        assert_eq!(broadcaster.stats().clients, 2);
    }

    #[test]
    fn test_subscribe_moves_between_lobbies() {
        let mut broadcaster = LobbyBroadcaster::new();
        let (a, mut rx_a) = client(None, 4);
        let id = a.id;
        broadcaster.register(a);

        assert!(broadcaster.subscribe(id, "p1".to_string(), "one".to_string()));
        assert!(broadcaster.subscribe(id, "p1".to_string(), "two".to_string()));
        broadcaster.broadcast_to_lobby("one", "stale");
        broadcaster.broadcast_to_lobby("two", "fresh");

        assert_eq!(rx_a.try_recv().unwrap(), "fresh");
        assert!(rx_a.try_recv().is_err());
        assert!(!broadcaster.stats().subscribers.contains_key("one"));
    }

    #[test]
    fn test_subscribe_unknown_client_is_ignored() {
        let mut broadcaster = LobbyBroadcaster::new();
        assert!(!broadcaster.subscribe(Uuid::new_v4(), "p1".to_string(), "one".to_string()));
        assert!(broadcaster.stats().subscribers.is_empty());
    }

    #[test]
    fn test_remove_deletes_empty_subscriber_set_and_closes_queue() {
        let mut broadcaster = LobbyBroadcaster::new();
        let (a, mut rx_a) = client(Some("lobby"), 4);
        let id = a.id;
        broadcaster.register(a);

        let removed = broadcaster.remove(id);
        assert!(removed.is_some());
        drop(removed);

        assert!(broadcaster.stats().subscribers.is_empty());
        assert_eq!(rx_a.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
        assert!(broadcaster.remove(id).is_none());
    }

    #[test]
    fn test_unsubscribe_keeps_connection() {
        let mut broadcaster = LobbyBroadcaster::new();
        let (a, mut rx_a) = client(Some("lobby"), 4);
        let id = a.id;
        broadcaster.register(a);

        broadcaster.unsubscribe(id);
        broadcaster.broadcast_to_lobby("lobby", "missed");

        assert!(broadcaster.contains(id));
        assert!(rx_a.try_recv().is_err());
        assert!(broadcaster.stats().subscribers.is_empty());
    }
}
