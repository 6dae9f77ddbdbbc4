//! Room Registry (§4.4): gameId → Session, and connection → (playerId, gameId).
//!
//! Grounded on the teacher's `api::AppState { lobbies: Arc<Mutex<HashMap<...>>> }`,
//! generalized to one `tokio::sync::Mutex` per room (§5) instead of a single mutex
//! guarding the whole map, so unrelated rooms never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::info;

use crate::protocol::ServerMessage;
use crate::session::{generate_game_id, Session};

pub type RoomHandle = Arc<Mutex<Session>>;

/// One outbound channel per live connection, fed by the Broadcast Hub.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ConnId(pub uuid::Uuid);

#[derive(Clone, Debug)]
pub struct Binding {
    pub player_id: String,
    pub game_id: String,
}

#[derive(Default)]
pub struct Registry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    /// Connections currently bound to each room, for the Broadcast Hub.
    connections: RwLock<HashMap<String, HashMap<ConnId, Outbox>>>,
    bindings: RwLock<HashMap<ConnId, Binding>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, host_id: String, host_name: String) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        let game_id = generate_game_id(|id| rooms.contains_key(id));
        info!(%game_id, host_id = %host_id, "room created");
        let session = Session::new(game_id.clone(), host_id, host_name);
        let handle = Arc::new(Mutex::new(session));
        rooms.insert(game_id, handle.clone());
        handle
    }

    pub async fn get(&self, game_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(game_id).cloned()
    }

    /// Registers `conn`'s outbox under `game_id` and records the (player, room) binding,
    /// replacing any prior binding for this connection (a reconnect).
    pub async fn bind(&self, conn: ConnId, player_id: String, game_id: String, outbox: Outbox) {
        self.connections
            .write()
            .await
            .entry(game_id.clone())
            .or_default()
            .insert(conn, outbox);
        self.bindings.write().await.insert(conn, Binding { player_id, game_id });
    }

    pub async fn lookup(&self, conn: ConnId) -> Option<Binding> {
        self.bindings.read().await.get(&conn).cloned()
    }

    pub async fn unbind(&self, conn: ConnId) -> Option<Binding> {
        let binding = self.bindings.write().await.remove(&conn)?;
        if let Some(conns) = self.connections.write().await.get_mut(&binding.game_id) {
            conns.remove(&conn);
        }
        Some(binding)
    }

    /// All live outboxes for a room, for the Broadcast Hub to fan out to.
    pub async fn outboxes(&self, game_id: &str) -> Vec<Outbox> {
        self.connections
            .read()
            .await
            .get(game_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }
}
