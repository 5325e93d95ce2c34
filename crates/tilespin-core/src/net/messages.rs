use serde::{Deserialize, Serialize};

use crate::leaderboard::LeaderboardEntry;
use crate::player::PlayerId;
use crate::puzzle::Puzzle;
use crate::session::SessionStatus;

/// Network message type discriminator (first byte of every frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    AssetPublished = 0x01,
    StartRound = 0x02,
    Rotate = 0x03,
    Reset = 0x04,

    // Server -> Client (broadcast unless noted)
    InitAck = 0x10,
    AssetUpdate = 0x11,
    RoundStart = 0x12,
    PlayerFinished = 0x13,
    SessionFinished = 0x14,
    SessionReset = 0x15,
    Leaderboard = 0x16,
    /// Targeted: only ever sent to the owning player's connection.
    PuzzleUpdate = 0x17,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::AssetPublished),
            0x02 => Some(Self::StartRound),
            0x03 => Some(Self::Rotate),
            0x04 => Some(Self::Reset),
            0x10 => Some(Self::InitAck),
            0x11 => Some(Self::AssetUpdate),
            0x12 => Some(Self::RoundStart),
            0x13 => Some(Self::PlayerFinished),
            0x14 => Some(Self::SessionFinished),
            0x15 => Some(Self::SessionReset),
            0x16 => Some(Self::Leaderboard),
            0x17 => Some(Self::PuzzleUpdate),
            _ => None,
        }
    }

    /// Types only the server may send. Clients sending these are rejected.
    pub fn is_server_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPublishedMsg {
    pub asset_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRoundMsg {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateMsg {
    pub player_id: PlayerId,
    pub tile_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetMsg {}

/// Every message a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    AssetPublished(AssetPublishedMsg),
    StartRound(StartRoundMsg),
    Rotate(RotateMsg),
    Reset(ResetMsg),
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Sent once to a connection right after it is established. Observer
/// connections get `player_id`, `name` and `puzzle` as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitAckMsg {
    pub protocol_version: u8,
    pub player_id: Option<PlayerId>,
    pub name: Option<String>,
    pub asset_url: Option<String>,
    pub puzzle: Option<Puzzle>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpdateMsg {
    pub asset_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStartMsg {
    /// Unix epoch milliseconds.
    pub started_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFinishedMsg {
    pub player_id: PlayerId,
    pub name: String,
    pub elapsed_ms: u64,
    pub step_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFinishedMsg {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResetMsg {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardMsg {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleUpdateMsg {
    pub puzzle: Puzzle,
}

/// Every message the server may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    InitAck(InitAckMsg),
    AssetUpdate(AssetUpdateMsg),
    RoundStart(RoundStartMsg),
    PlayerFinished(PlayerFinishedMsg),
    SessionFinished(SessionFinishedMsg),
    SessionReset(SessionResetMsg),
    Leaderboard(LeaderboardMsg),
    PuzzleUpdate(PuzzleUpdateMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::InitAck(_) => MessageType::InitAck,
            Self::AssetUpdate(_) => MessageType::AssetUpdate,
            Self::RoundStart(_) => MessageType::RoundStart,
            Self::PlayerFinished(_) => MessageType::PlayerFinished,
            Self::SessionFinished(_) => MessageType::SessionFinished,
            Self::SessionReset(_) => MessageType::SessionReset,
            Self::Leaderboard(_) => MessageType::Leaderboard,
            Self::PuzzleUpdate(_) => MessageType::PuzzleUpdate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_byte_matches_discriminants() {
        let all = [
            MessageType::AssetPublished,
            MessageType::StartRound,
            MessageType::Rotate,
            MessageType::Reset,
            MessageType::InitAck,
            MessageType::AssetUpdate,
            MessageType::RoundStart,
            MessageType::PlayerFinished,
            MessageType::SessionFinished,
            MessageType::SessionReset,
            MessageType::Leaderboard,
            MessageType::PuzzleUpdate,
        ];
        for t in all {
            assert_eq!(MessageType::from_byte(t as u8), Some(t));
        }
        assert_eq!(MessageType::from_byte(0x00), None);
        assert_eq!(MessageType::from_byte(0xFF), None);
    }

    #[test]
    fn server_only_split() {
        assert!(!MessageType::Rotate.is_server_only());
        assert!(!MessageType::Reset.is_server_only());
        assert!(MessageType::InitAck.is_server_only());
        assert!(MessageType::PuzzleUpdate.is_server_only());
    }
}
