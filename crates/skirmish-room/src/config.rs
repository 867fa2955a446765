//! Room configuration and state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::GameRules;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a [`RoomManager`](crate::RoomManager)
/// spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Rule set of the game.
    pub rules: GameRules,

    /// Seed for the room's random source. `None` seeds from the OS.
    /// With a seed, dice, turn order, falls, and bot choices replay
    /// identically for the same inputs.
    pub seed: Option<u64>,

    /// Real length of one countdown second.
    pub tick: Duration,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            seed: None,
            tick: Duration::from_secs(1),
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered:
///
/// ```text
/// Lobby → InProgress → Finished → Closed
/// ```
///
/// A lobby may also be closed directly when its host leaves, and a game
/// in progress is closed when no human player remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Lobby,
    InProgress,
    Finished,
    Closed,
}

impl RoomState {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` while a game is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` once the actor should stop.
    pub fn is_over(&self) -> bool {
        matches!(self, Self::Finished | Self::Closed)
    }

    /// The next state in the normal progression.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Lobby => Some(Self::InProgress),
            Self::InProgress => Some(Self::Finished),
            Self::Finished => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Closed && self != Self::Closed)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
