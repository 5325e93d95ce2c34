use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::leaderboard::{self, LeaderboardEntry};
use crate::net::messages::{
    AssetUpdateMsg, InitAckMsg, LeaderboardMsg, PlayerFinishedMsg, PuzzleUpdateMsg, RoundStartMsg,
    ServerMessage, SessionFinishedMsg, SessionResetMsg,
};
use crate::net::protocol::PROTOCOL_VERSION;
use crate::player::{PlayerId, PlayerStatus, generate_display_name};
use crate::puzzle::{TILE_COUNT, generate_puzzle};
use crate::registry::PlayerRegistry;

/// Session-wide lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No round running; waiting for an image and a start request.
    Waiting,
    Playing,
    /// Every registered player solved their puzzle.
    Finished,
}

/// Who should receive an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every open connection, players and observers alike.
    Broadcast,
    /// Only the connection bound to this player.
    Player(PlayerId),
}

/// A message the session wants delivered. The session never touches a
/// transport; the host routes these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub delivery: Delivery,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn broadcast(message: ServerMessage) -> Self {
        Self {
            delivery: Delivery::Broadcast,
            message,
        }
    }

    pub fn to_player(player_id: PlayerId, message: ServerMessage) -> Self {
        Self {
            delivery: Delivery::Player(player_id),
            message,
        }
    }
}

/// Point-in-time status for the HTTP status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub asset_url: Option<String>,
    pub player_count: usize,
}

/// The authoritative shared game: session status, the current image, and
/// every player's puzzle.
///
/// All operations are total: protocol misuse (rotating while not playing,
/// starting without an image, unknown ids) is a silent no-op. Each call
/// returns the messages to deliver, in delivery order.
pub struct GameSession {
    status: SessionStatus,
    asset_url: Option<String>,
    round_started_at: Option<u64>,
    players: PlayerRegistry,
    rng: StdRng,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic session for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            status: SessionStatus::Waiting,
            asset_url: None,
            round_started_at: None,
            players: PlayerRegistry::new(),
            rng,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn asset_url(&self) -> Option<&str> {
        self.asset_url.as_deref()
    }

    pub fn round_started_at(&self) -> Option<u64> {
        self.round_started_at
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            asset_url: self.asset_url.clone(),
            player_count: self.players.len(),
        }
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard::rank(self.players.iter())
    }

    fn leaderboard_broadcast(&self) -> Outbound {
        Outbound::broadcast(ServerMessage::Leaderboard(LeaderboardMsg {
            entries: self.leaderboard(),
        }))
    }

    /// Register a new player. Returns the id and the init-ack for the joining
    /// connection; the caller follows up with [`Self::leaderboard_update`].
    pub fn join(&mut self) -> (PlayerId, ServerMessage) {
        let name = generate_display_name(&mut self.rng);
        let puzzle = generate_puzzle(&mut self.rng);
        let player = self.players.register(name, puzzle);
        let ack = ServerMessage::InitAck(InitAckMsg {
            protocol_version: PROTOCOL_VERSION,
            player_id: Some(player.id()),
            name: Some(player.display_name().to_string()),
            asset_url: self.asset_url.clone(),
            puzzle: Some(*player.puzzle()),
            status: self.status,
        });
        tracing::info!(
            player_id = player.id(),
            name = player.display_name(),
            "Player joined"
        );
        (player.id(), ack)
    }

    /// Init-ack for a connection that watches without playing.
    pub fn observer_ack(&self) -> ServerMessage {
        ServerMessage::InitAck(InitAckMsg {
            protocol_version: PROTOCOL_VERSION,
            player_id: None,
            name: None,
            asset_url: self.asset_url.clone(),
            puzzle: None,
            status: self.status,
        })
    }

    /// Current leaderboard as a broadcast.
    pub fn leaderboard_update(&self) -> Vec<Outbound> {
        vec![self.leaderboard_broadcast()]
    }

    /// Remove a disconnected player. Unknown ids are ignored.
    pub fn leave(&mut self, player_id: PlayerId) -> Vec<Outbound> {
        if self.players.unregister(player_id).is_none() {
            return Vec::new();
        }
        tracing::info!(player_id, "Player left");

        let mut out = Vec::new();
        // The leaver may have been the last one still solving.
        self.check_session_finished(&mut out);
        out.push(self.leaderboard_broadcast());
        out
    }

    /// Record the freshly uploaded puzzle image. Does not change status.
    pub fn publish_asset(&mut self, asset_url: String) -> Vec<Outbound> {
        tracing::info!(asset_url = %asset_url, "Asset published");
        self.asset_url = Some(asset_url.clone());
        vec![Outbound::broadcast(ServerMessage::AssetUpdate(
            AssetUpdateMsg { asset_url },
        ))]
    }

    /// Start a new round for every registered player. Ignored until an image
    /// has been published.
    pub fn start_round(&mut self, now_ms: u64) -> Vec<Outbound> {
        if self.asset_url.is_none() {
            tracing::debug!("Start requested before an asset was published, ignoring");
            return Vec::new();
        }

        self.status = SessionStatus::Playing;
        self.round_started_at = Some(now_ms);

        let mut puzzles = Vec::with_capacity(self.players.len());
        for player in self.players.iter_mut() {
            let puzzle = generate_puzzle(&mut self.rng);
            player.begin_round(puzzle, now_ms);
            puzzles.push((player.id(), puzzle));
        }
        tracing::info!(players = puzzles.len(), "Round started");

        let mut out = Vec::with_capacity(puzzles.len() + 2);
        out.push(Outbound::broadcast(ServerMessage::RoundStart(
            RoundStartMsg { started_at: now_ms },
        )));
        for (player_id, puzzle) in puzzles {
            out.push(Outbound::to_player(
                player_id,
                ServerMessage::PuzzleUpdate(PuzzleUpdateMsg { puzzle }),
            ));
        }
        out.push(self.leaderboard_broadcast());
        out
    }

    /// Rotate one of a player's tiles a quarter turn clockwise.
    ///
    /// Ignored (no state change) if the player is unknown, not playing, or the
    /// index is out of range. A leaderboard broadcast is always the last
    /// message, whether or not the move was accepted.
    pub fn rotate(&mut self, player_id: PlayerId, tile_index: u32, now_ms: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        self.apply_rotation(player_id, tile_index, now_ms, &mut out);
        out.push(self.leaderboard_broadcast());
        out
    }

    fn apply_rotation(
        &mut self,
        player_id: PlayerId,
        tile_index: u32,
        now_ms: u64,
        out: &mut Vec<Outbound>,
    ) {
        let Ok(index) = usize::try_from(tile_index) else {
            return;
        };
        if index >= TILE_COUNT {
            tracing::debug!(player_id, tile_index, "Rotation index out of range");
            return;
        }
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        if player.status != PlayerStatus::Playing {
            return;
        }

        player.puzzle.rotate(index);
        player.step_count += 1;

        if !player.puzzle.is_solved() {
            return;
        }

        player.finish(now_ms);
        let elapsed_ms = player.elapsed_ms.unwrap_or_default();
        tracing::info!(
            player_id,
            elapsed_ms,
            steps = player.step_count,
            "Player finished"
        );
        out.push(Outbound::broadcast(ServerMessage::PlayerFinished(
            PlayerFinishedMsg {
                player_id,
                name: player.display_name.clone(),
                elapsed_ms,
                step_count: player.step_count,
            },
        )));
        self.check_session_finished(out);
    }

    /// Move a running round to `Finished` once every player is done.
    fn check_session_finished(&mut self, out: &mut Vec<Outbound>) {
        if self.status == SessionStatus::Playing && self.players.all_finished() {
            self.status = SessionStatus::Finished;
            tracing::info!(players = self.players.len(), "All players finished");
            out.push(Outbound::broadcast(ServerMessage::SessionFinished(
                SessionFinishedMsg {},
            )));
        }
    }

    /// Wipe the session back to `Waiting`: no image, no round, no players.
    /// Deleting stored images is the host's job and must not hold this up.
    pub fn reset(&mut self) -> Vec<Outbound> {
        let dropped = self.players.len();
        self.status = SessionStatus::Waiting;
        self.asset_url = None;
        self.round_started_at = None;
        self.players.clear();
        tracing::info!(dropped_players = dropped, "Session reset");

        vec![
            Outbound::broadcast(ServerMessage::SessionReset(SessionResetMsg {})),
            self.leaderboard_broadcast(),
        ]
    }
}
