//! Core protocol types: identities, addressing, and the envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identity of one connected client for the lifetime of its
/// connection. Virtual players get ids from a reserved high range so the
/// two never collide.
///
/// Serialized as a plain number (`#[serde(transparent)]`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// First id handed out to virtual players.
    pub const VIRTUAL_BASE: u64 = 1 << 48;

    /// Returns `true` if this id belongs to the virtual-player range.
    pub fn is_virtual(self) -> bool {
        self.0 >= Self::VIRTUAL_BASE
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_virtual() {
            write!(f, "V-{}", self.0 - Self::VIRTUAL_BASE)
        } else {
            write!(f, "P-{}", self.0)
        }
    }
}

/// Identifier of a room. Rooms are addressed by short codes that players
/// read to each other ("G1", "4821"), so this wraps a string rather than
/// a number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rejects codes no player could type: empty, padded, or longer
    /// than [`RoomId::MAX_LEN`].
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let code = self.0.as_str();
        if code.is_empty() || code.trim() != code || code.len() > Self::MAX_LEN {
            return Err(ProtocolError::InvalidMessage(format!("bad room id {code:?}")));
        }
        Ok(())
    }

    pub const MAX_LEN: usize = 16;
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive an outbound event.
///
/// The room actor addresses every outbound event with one and fans it
/// out to the member connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every member of the room.
    All,
    /// One specific member.
    Player(PlayerId),
}

impl Recipient {
    /// Returns `true` if `player` is addressed by this recipient.
    pub fn includes(&self, player: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Player(p) => *p == player,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Top-level frame of every message on the wire.
///
/// ```text
/// { "seq": 42, "timestamp": 15000, "payload": { "type": "EndTurn" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Per-direction, per-connection sequence number.
    pub seq: u64,

    /// Milliseconds since the sender started. Informational only.
    #[serde(default)]
    pub timestamp: u64,

    /// The event being carried.
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, payload: T) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display_distinguishes_virtual() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(PlayerId(PlayerId::VIRTUAL_BASE + 2).to_string(), "V-2");
        assert!(!PlayerId(7).is_virtual());
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomId::new("G1")).unwrap();
        assert_eq!(json, "\"G1\"");
        assert_eq!(RoomId::from("G1").to_string(), "G1");
    }

    #[test]
    fn test_room_id_validate_rejects_blank_and_padded_codes() {
        assert!(RoomId::from("4821").validate().is_ok());
        assert!(RoomId::from("").validate().is_err());
        assert!(RoomId::from(" G1").validate().is_err());
        assert!(RoomId::new("x".repeat(RoomId::MAX_LEN + 1)).validate().is_err());
    }

    #[test]
    fn test_recipient_includes() {
        let p1 = PlayerId(1);
        let p2 = PlayerId(2);
        assert!(Recipient::All.includes(p1));
        assert!(Recipient::Player(p1).includes(p1));
        assert!(!Recipient::Player(p1).includes(p2));
    }

    #[test]
    fn test_envelope_timestamp_defaults_when_missing() {
        let json = r#"{ "seq": 1, "payload": 9 }"#;
        let envelope: Envelope<PlayerId> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.timestamp, 0);
        assert_eq!(envelope.payload, PlayerId(9));
    }

    #[test]
    fn test_envelope_missing_payload_is_rejected() {
        let json = r#"{ "seq": 1, "timestamp": 5 }"#;
        let result: Result<Envelope<PlayerId>, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
