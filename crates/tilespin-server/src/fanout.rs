use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use tilespin_core::net::protocol::encode_server_message;
use tilespin_core::{Delivery, Outbound, PlayerId};

/// Unique identifier for one WebSocket connection.
pub type ConnectionId = u64;

/// Per-connection sender for outbound WebSocket binary messages.
/// Bounded so a slow client cannot exhaust memory; uses `Bytes` for
/// zero-copy cloning when broadcasting.
pub type ConnectionSender = mpsc::Sender<Bytes>;

/// What a connection is for, decided once at upgrade time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    /// Watches the session (admin screen, projector) without playing.
    Observer,
}

impl Role {
    /// Parse the `role` query parameter. Anything unrecognized is a player.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("observer" | "admin" | "viewer") => Self::Observer,
            _ => Self::Player,
        }
    }
}

struct Connection {
    sender: ConnectionSender,
    /// Fixed at `add`; never reassigned.
    player: Option<PlayerId>,
}

/// Delivers encoded server messages to open connections.
///
/// Delivery is best-effort: a full or closed channel is skipped and logged,
/// never awaited, so one stalled peer cannot hold up anyone else.
#[derive(Default)]
pub struct Fanout {
    connections: HashMap<ConnectionId, Connection>,
    /// player id → connection, so targeted sends skip the full scan.
    by_player: HashMap<PlayerId, ConnectionId>,
    next_connection_id: ConnectionId,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, optionally bound to a player.
    pub fn add(&mut self, sender: ConnectionSender, player: Option<PlayerId>) -> ConnectionId {
        self.next_connection_id += 1;
        let conn_id = self.next_connection_id;
        self.connections
            .insert(conn_id, Connection { sender, player });
        if let Some(player_id) = player {
            self.by_player.insert(player_id, conn_id);
        }
        conn_id
    }

    /// Forget a connection. Returns the player it was bound to, if any.
    pub fn remove(&mut self, conn_id: ConnectionId) -> Option<PlayerId> {
        let conn = self.connections.remove(&conn_id)?;
        if let Some(player_id) = conn.player {
            self.by_player.remove(&player_id);
        }
        conn.player
    }

    pub fn player_for(&self, conn_id: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&conn_id).and_then(|c| c.player)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Deliver to every open connection, including observers.
    pub fn broadcast(&self, data: &Bytes) {
        for (&conn_id, conn) in &self.connections {
            if let Err(e) = conn.sender.try_send(data.clone()) {
                tracing::debug!(conn_id, error = %e, "Skipping broadcast to slow client");
            }
        }
    }

    /// Deliver only to the connection bound to `player_id`.
    pub fn send_to_player(&self, player_id: PlayerId, data: Bytes) {
        let Some(conn) = self
            .by_player
            .get(&player_id)
            .and_then(|id| self.connections.get(id))
        else {
            tracing::debug!(player_id, "No connection for targeted send");
            return;
        };
        if let Err(e) = conn.sender.try_send(data) {
            tracing::debug!(
                player_id, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    /// Deliver directly to one connection regardless of role.
    pub fn send_to_connection(&self, conn_id: ConnectionId, data: Bytes) {
        if let Some(conn) = self.connections.get(&conn_id)
            && let Err(e) = conn.sender.try_send(data)
        {
            tracing::debug!(conn_id, error = %e, "Failed to send to connection");
        }
    }

    /// Encode and route session output, preserving order.
    pub fn dispatch(&self, outbounds: Vec<Outbound>) {
        for outbound in outbounds {
            let data = match encode_server_message(&outbound.message) {
                Ok(data) => Bytes::from(data),
                Err(e) => {
                    tracing::error!(
                        msg_type = ?outbound.message.message_type(),
                        error = %e,
                        "Failed to encode server message"
                    );
                    continue;
                },
            };
            match outbound.delivery {
                Delivery::Broadcast => self.broadcast(&data),
                Delivery::Player(player_id) => self.send_to_player(player_id, data),
            }
        }
    }
}
