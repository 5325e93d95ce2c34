use serde::{Deserialize, Serialize};

use crate::leaderboard::LeaderboardEntry;
use crate::player::{PlayerId, PlayerStatus, max_display_name_len};

use super::messages::{
    AssetPublishedMsg, AssetUpdateMsg, ClientMessage, InitAckMsg, LeaderboardMsg, MessageType,
    PlayerFinishedMsg, PuzzleUpdateMsg, ResetMsg, RotateMsg, RoundStartMsg, ServerMessage,
    SessionFinishedMsg, SessionResetMsg, StartRoundMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum size of a client frame in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

/// Maximum size of a server frame in bytes. Leaderboards grow with the
/// player count, so server frames get far more room than client ones.
pub const MAX_SERVER_MESSAGE_SIZE: usize = 1024 * 1024; // 1 MiB

/// Type byte plus the struct and array headers around leaderboard entries.
const LEADERBOARD_FRAME_OVERHEAD: usize = 16;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    /// A known type arrived in the wrong direction (e.g. a client sent `InitAck`).
    UnexpectedMessageType(MessageType),
    PayloadTooLarge { size: usize, max: usize },
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::UnexpectedMessageType(t) => write!(f, "unexpected message type: {t:?}"),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload too large: {size} bytes (max {max})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Size limit for frames of the given type.
pub fn max_frame_size(msg_type: MessageType) -> usize {
    if msg_type.is_server_only() {
        MAX_SERVER_MESSAGE_SIZE
    } else {
        MAX_MESSAGE_SIZE
    }
}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    let max = max_frame_size(msg_type);
    if total > max {
        return Err(ProtocolError::PayloadTooLarge { size: total, max });
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::AssetPublished(m) => encode_message(MessageType::AssetPublished, m),
        ClientMessage::StartRound(m) => encode_message(MessageType::StartRound, m),
        ClientMessage::Rotate(m) => encode_message(MessageType::Rotate, m),
        ClientMessage::Reset(m) => encode_message(MessageType::Reset, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ServerMessage::InitAck(m) => encode_message(msg_type, m),
        ServerMessage::AssetUpdate(m) => encode_message(msg_type, m),
        ServerMessage::RoundStart(m) => encode_message(msg_type, m),
        ServerMessage::PlayerFinished(m) => encode_message(msg_type, m),
        ServerMessage::SessionFinished(m) => encode_message(msg_type, m),
        ServerMessage::SessionReset(m) => encode_message(msg_type, m),
        ServerMessage::Leaderboard(m) => encode_message(msg_type, m),
        ServerMessage::PuzzleUpdate(m) => encode_message(msg_type, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::AssetPublished => Ok(ClientMessage::AssetPublished(decode_payload::<
            AssetPublishedMsg,
        >(data)?)),
        MessageType::StartRound => Ok(ClientMessage::StartRound(decode_payload::<StartRoundMsg>(
            data,
        )?)),
        MessageType::Rotate => Ok(ClientMessage::Rotate(decode_payload::<RotateMsg>(data)?)),
        MessageType::Reset => Ok(ClientMessage::Reset(decode_payload::<ResetMsg>(data)?)),
        other => Err(ProtocolError::UnexpectedMessageType(other)),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::InitAck => Ok(ServerMessage::InitAck(decode_payload::<InitAckMsg>(data)?)),
        MessageType::AssetUpdate => Ok(ServerMessage::AssetUpdate(
            decode_payload::<AssetUpdateMsg>(data)?,
        )),
        MessageType::RoundStart => Ok(ServerMessage::RoundStart(
            decode_payload::<RoundStartMsg>(data)?,
        )),
        MessageType::PlayerFinished => Ok(ServerMessage::PlayerFinished(decode_payload::<
            PlayerFinishedMsg,
        >(data)?)),
        MessageType::SessionFinished => Ok(ServerMessage::SessionFinished(decode_payload::<
            SessionFinishedMsg,
        >(data)?)),
        MessageType::SessionReset => Ok(ServerMessage::SessionReset(decode_payload::<
            SessionResetMsg,
        >(data)?)),
        MessageType::Leaderboard => Ok(ServerMessage::Leaderboard(
            decode_payload::<LeaderboardMsg>(data)?,
        )),
        MessageType::PuzzleUpdate => Ok(ServerMessage::PuzzleUpdate(decode_payload::<
            PuzzleUpdateMsg,
        >(data)?)),
        other => Err(ProtocolError::UnexpectedMessageType(other)),
    }
}

/// Upper bound on the encoded size of a leaderboard frame with `players`
/// entries, costing every entry as the largest one the ranker can emit.
pub fn max_leaderboard_frame_len(players: usize) -> Result<usize, ProtocolError> {
    let largest = LeaderboardEntry {
        player_id: PlayerId::MAX,
        name: "W".repeat(max_display_name_len()),
        status: PlayerStatus::Finished,
        elapsed_ms: Some(u64::MAX),
        step_count: u32::MAX,
    };
    let entry_len = rmp_serde::to_vec(&largest)
        .map_err(|e| ProtocolError::SerializeError(e.to_string()))?
        .len();
    Ok(LEADERBOARD_FRAME_OVERHEAD.saturating_add(players.saturating_mul(entry_len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::Puzzle;
    use crate::session::SessionStatus;

    #[test]
    fn rotate_roundtrip() {
        let msg = ClientMessage::Rotate(RotateMsg {
            player_id: 7,
            tile_index: 4,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::Rotate as u8);
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn empty_payload_messages_roundtrip() {
        for msg in [
            ClientMessage::StartRound(StartRoundMsg {}),
            ClientMessage::Reset(ResetMsg {}),
        ] {
            let encoded = encode_client_message(&msg).unwrap();
            assert_eq!(decode_client_message(&encoded).unwrap(), msg);
        }
    }

    #[test]
    fn init_ack_roundtrip_for_observer() {
        let msg = ServerMessage::InitAck(InitAckMsg {
            protocol_version: PROTOCOL_VERSION,
            player_id: None,
            name: None,
            asset_url: Some("/assets/a.png".into()),
            puzzle: None,
            status: SessionStatus::Waiting,
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn leaderboard_roundtrip() {
        let msg = ServerMessage::Leaderboard(LeaderboardMsg {
            entries: vec![LeaderboardEntry {
                player_id: 1,
                name: "Swift Otter".into(),
                status: PlayerStatus::Finished,
                elapsed_ms: Some(4_200),
                step_count: 11,
            }],
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn puzzle_update_roundtrip() {
        let msg = ServerMessage::PuzzleUpdate(PuzzleUpdateMsg {
            puzzle: Puzzle::from_rotations([0, 1, 2, 3, 0, 1, 2, 3, 0]),
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn decode_empty_fails() {
        assert!(matches!(
            decode_message_type(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn decode_unknown_type_fails() {
        assert!(matches!(
            decode_client_message(&[0xEE, 0x90]),
            Err(ProtocolError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn decode_garbage_payload_fails() {
        let data = [MessageType::Rotate as u8, 0xC1, 0xC1, 0xC1];
        assert!(matches!(
            decode_client_message(&data),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn client_decoder_rejects_server_types() {
        let msg = ServerMessage::SessionReset(SessionResetMsg {});
        let encoded = encode_server_message(&msg).unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::UnexpectedMessageType(MessageType::SessionReset))
        ));
    }

    #[test]
    fn oversized_client_frame_rejected() {
        let mut data = vec![MessageType::AssetPublished as u8];
        data.resize(MAX_MESSAGE_SIZE + 1, 0);
        assert!(matches!(
            decode_client_message(&data),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_payload_not_encoded() {
        let msg = ClientMessage::AssetPublished(AssetPublishedMsg {
            asset_url: "x".repeat(MAX_MESSAGE_SIZE),
        });
        assert!(matches!(
            encode_client_message(&msg),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    fn finished_entries(count: usize) -> Vec<LeaderboardEntry> {
        (0..count)
            .map(|i| LeaderboardEntry {
                player_id: i as PlayerId + 1,
                name: "Gentle Dolphin".into(),
                status: PlayerStatus::Finished,
                elapsed_ms: Some(3_600_000 + i as u64),
                step_count: 27,
            })
            .collect()
    }

    #[test]
    fn large_leaderboard_exceeds_client_cap_but_encodes() {
        let msg = ServerMessage::Leaderboard(LeaderboardMsg {
            entries: finished_entries(2_000),
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert!(encoded.len() > MAX_MESSAGE_SIZE);
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn leaderboard_bound_covers_real_frames() {
        for count in [0, 1, 500, 2_000] {
            let msg = ServerMessage::Leaderboard(LeaderboardMsg {
                entries: finished_entries(count),
            });
            let encoded = encode_server_message(&msg).unwrap();
            assert!(encoded.len() <= max_leaderboard_frame_len(count).unwrap());
        }
    }

    #[test]
    fn leaderboard_bound_grows_past_server_cap() {
        assert!(max_leaderboard_frame_len(500).unwrap() < MAX_SERVER_MESSAGE_SIZE);
        assert!(max_leaderboard_frame_len(1_000_000).unwrap() > MAX_SERVER_MESSAGE_SIZE);
    }

    #[test]
    fn frame_caps_follow_direction() {
        assert_eq!(max_frame_size(MessageType::Rotate), MAX_MESSAGE_SIZE);
        assert_eq!(max_frame_size(MessageType::Leaderboard), MAX_SERVER_MESSAGE_SIZE);
    }
}
