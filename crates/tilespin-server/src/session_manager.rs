use bytes::Bytes;

use tilespin_core::net::messages::ClientMessage;
use tilespin_core::net::protocol::encode_server_message;
use tilespin_core::{GameSession, PlayerId, SessionSnapshot};

use crate::fanout::{ConnectionId, ConnectionSender, Fanout, Role};

/// What the caller must do after a message has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    None,
    /// The session was reset; delete the assets published before it.
    DeleteAssets(Vec<String>),
}

/// The single writer for all shared state: the game session plus the
/// connections it talks to. Lives behind one lock so every inbound message
/// runs to completion before the next one touches the session.
pub struct SessionManager {
    session: GameSession,
    fanout: Fanout,
    /// Asset URLs published since the last reset.
    published_assets: Vec<String>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_session(GameSession::new())
    }

    pub fn with_session(session: GameSession) -> Self {
        Self {
            session,
            fanout: Fanout::new(),
            published_assets: Vec::new(),
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Open a connection. Player connections are registered in the session.
    /// The new connection receives its init-ack before anything else, then
    /// everyone gets the updated leaderboard.
    pub fn connect(
        &mut self,
        role: Role,
        sender: ConnectionSender,
    ) -> (ConnectionId, Option<PlayerId>) {
        let (player_id, ack) = match role {
            Role::Player => {
                let (id, ack) = self.session.join();
                (Some(id), ack)
            },
            Role::Observer => (None, self.session.observer_ack()),
        };
        let conn_id = self.fanout.add(sender, player_id);

        match encode_server_message(&ack) {
            Ok(data) => self.fanout.send_to_connection(conn_id, Bytes::from(data)),
            Err(e) => tracing::error!(conn_id, error = %e, "Failed to encode InitAck"),
        }
        if player_id.is_some() {
            self.fanout.dispatch(self.session.leaderboard_update());
        } else {
            self.send_leaderboard_to(conn_id);
        }

        tracing::info!(conn_id, ?role, player_id, "Connection opened");
        (conn_id, player_id)
    }

    fn send_leaderboard_to(&self, conn_id: ConnectionId) {
        for outbound in self.session.leaderboard_update() {
            if let Ok(data) = encode_server_message(&outbound.message) {
                self.fanout.send_to_connection(conn_id, Bytes::from(data));
            }
        }
    }

    /// Close a connection and drop its player, if any. Idempotent.
    pub fn disconnect(&mut self, conn_id: ConnectionId) {
        let Some(player_id) = self.fanout.remove(conn_id) else {
            return;
        };
        let out = self.session.leave(player_id);
        self.fanout.dispatch(out);
    }

    /// Apply one inbound message from `conn_id` and deliver the results.
    pub fn handle_message(
        &mut self,
        conn_id: ConnectionId,
        msg: ClientMessage,
        now_ms: u64,
    ) -> FollowUp {
        let (out, follow_up) = match msg {
            ClientMessage::AssetPublished(m) => {
                if m.asset_url.is_empty() {
                    tracing::debug!(conn_id, "Ignoring empty asset url");
                    return FollowUp::None;
                }
                self.published_assets.push(m.asset_url.clone());
                (self.session.publish_asset(m.asset_url), FollowUp::None)
            },
            ClientMessage::StartRound(_) => (self.session.start_round(now_ms), FollowUp::None),
            ClientMessage::Rotate(m) => {
                // Rejected rotates never reach the session, so nobody is told.
                let Some(bound) = self.fanout.player_for(conn_id) else {
                    tracing::debug!(conn_id, "Rotate from a non-player connection, ignoring");
                    return FollowUp::None;
                };
                if m.player_id != bound {
                    tracing::warn!(
                        conn_id,
                        bound_player = bound,
                        claimed_player = m.player_id,
                        "Rejected rotate for another player"
                    );
                    return FollowUp::None;
                }
                (
                    self.session.rotate(bound, m.tile_index, now_ms),
                    FollowUp::None,
                )
            },
            ClientMessage::Reset(_) => {
                let stale = std::mem::take(&mut self.published_assets);
                (self.session.reset(), FollowUp::DeleteAssets(stale))
            },
        };
        self.fanout.dispatch(out);
        follow_up
    }

    /// Record an asset published through the upload pipeline.
    pub fn publish_asset(&mut self, asset_url: String) {
        self.published_assets.push(asset_url.clone());
        let out = self.session.publish_asset(asset_url);
        self.fanout.dispatch(out);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// (open connections, registered players)
    pub fn stats(&self) -> (usize, usize) {
        (self.fanout.len(), self.session.players().len())
    }
}
