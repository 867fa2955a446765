//! Game events exchanged with clients.
//!
//! Both enums are internally tagged, so every frame reads
//! `{"type": "MoveTo", "destination": {"x": 3, "y": 1}}`.

use serde::{Deserialize, Serialize};
use skirmish_grid::Position;
use skirmish_protocol::{PlayerId, RoomId};

use crate::{CharacterSheet, ItemKind, Player, Profile, SessionView};

/// What a client asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Create a room on `map_id` and join it as host. Without a
    /// `room_id` the server picks a 4-digit code.
    CreateRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        map_id: String,
        sheet: CharacterSheet,
    },
    JoinRoom {
        room_id: RoomId,
        sheet: CharacterSheet,
    },
    /// Host only, before the game starts.
    AddVirtualPlayer { profile: Profile },
    /// Host only, before the game starts.
    SetLocked { locked: bool },
    LeaveRoom,
    StartGame,
    EndTurn,
    /// Ask for the current reachable set.
    RequestMoves,
    MoveTo { destination: Position },
    StartCombat { opponent: PlayerId },
    Attack,
    StartEvasion,
    ToggleDoor { position: Position },
    BreakWall { position: Position },
}

/// One entry of a reachable set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleMove {
    pub destination: Position,
    pub cost: u32,
    pub path: Vec<Position>,
}

/// What the server tells clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // -- lobby ------------------------------------------------------------
    RoomCreated {
        room_id: RoomId,
    },
    /// Sent to the joining player. `name` is the name actually used,
    /// which differs from the sheet on a collision.
    RoomJoined {
        room_id: RoomId,
        you: PlayerId,
        name: String,
    },
    RoomUpdated {
        room: SessionView,
    },
    GameStarted {
        room: SessionView,
    },
    PlayerLeft {
        player: PlayerId,
        name: String,
    },
    RoomClosed {
        room_id: RoomId,
    },

    // -- turns ------------------------------------------------------------
    /// Broadcast when a turn is handed over, before the pre-turn delay.
    PlayerTurn {
        player: PlayerId,
        name: String,
    },
    PreTurnDelay {
        remaining: u32,
    },
    /// Sent to the turn holder when the delay is over.
    YourTurn {
        move_points: u32,
        actions: u32,
    },
    TurnTick {
        remaining: u32,
    },
    CountdownPaused {
        remaining: u32,
    },

    // -- movement ---------------------------------------------------------
    PossibleMoves {
        moves: Vec<PossibleMove>,
    },
    PositionUpdate {
        session: RoomId,
        player: Player,
    },
    YouFell,
    YouFinishedMoving,
    DoorToggled {
        position: Position,
        open: bool,
    },
    WallBroken {
        position: Position,
    },
    ItemPickedUp {
        player: PlayerId,
        item: ItemKind,
        /// Item put down in exchange when the inventory was full.
        dropped: Option<ItemKind>,
    },
    ItemDropped {
        position: Position,
        item: ItemKind,
    },

    // -- combat -----------------------------------------------------------
    CombatStarted {
        challenger: PlayerId,
        opponent: PlayerId,
    },
    /// Whose combat turn it is, and how many evasions they have left.
    CombatTurn {
        player: PlayerId,
        evasions: u32,
    },
    CombatTick {
        remaining: u32,
    },
    DiceRolled {
        attack_draw: u32,
        defense_draw: u32,
    },
    AttackSuccess {
        attacker: PlayerId,
        defender: PlayerId,
        defender_life: u32,
    },
    AttackFailure {
        attacker: PlayerId,
        defender: PlayerId,
    },
    EvasionSuccess {
        player: PlayerId,
    },
    EvasionFailed {
        player: PlayerId,
        evasions_left: u32,
    },
    CombatFinished {
        session: RoomId,
        winner: PlayerId,
    },
    CombatFinishedByEvasion {
        session: RoomId,
        evading_player: PlayerId,
    },

    // -- end --------------------------------------------------------------
    GameFinished {
        winner: PlayerId,
        name: String,
        duration_secs: u64,
        turns: u32,
    },

    /// A request failed in a way the requester should hear about.
    Error {
        code: u16,
        message: String,
    },
}

impl ServerEvent {
    pub fn error(err: &crate::RoomError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
