//! Error types for the room layer.
//!
//! Errors fall into a few classes that decide how the room reacts:
//! lookups that miss are reported to the requester, out-of-turn or
//! exhausted requests are dropped silently, and duplicates are no-ops.
//! None of them stops a room.

use skirmish_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The player is not part of the session.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// A room with this id already exists.
    #[error("room {0} already exists")]
    Duplicate(RoomId),

    /// No more player slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room has been locked by its host.
    #[error("room {0} is locked")]
    Locked(RoomId),

    /// The game has already started.
    #[error("room {0} has already started")]
    AlreadyStarted(RoomId),

    /// The player is already in a room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not in any room.
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// Only the host may do this.
    #[error("player {0} is not the host")]
    NotHost(PlayerId),

    /// Too few active players to start.
    #[error("need {required} active players to start, have {active}")]
    NotStartable { active: usize, required: usize },

    /// The request came from someone who does not hold the turn (or
    /// combat turn), or at a moment the request makes no sense.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// No actions, evasions, or move points left for the request.
    #[error("exhausted: {0}")]
    Exhausted(String),

    /// The catalog has no layout with this id.
    #[error("map {0} not found")]
    MapNotFound(String),

    /// The layout cannot host a game.
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// Returns `true` for errors the room drops without telling anyone.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_) | Self::Exhausted(_) | Self::Duplicate(_)
        )
    }

    /// Status code used when the error is reported to a client.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_)
            | Self::PlayerNotFound(_)
            | Self::NotInRoom(_)
            | Self::MapNotFound(_) => 404,
            Self::NotHost(_) => 403,
            Self::InvalidMap(_) => 400,
            Self::Unavailable(_) => 503,
            _ => 409,
        }
    }
}
