//! Game rule constants, gathered into [`GameRules`].
//!
//! Every tunable number of the game lives here once. Rooms read them
//! through a `GameRules` value so tests (and odd game variants) can
//! override a single field without touching the rest.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Length of the main turn clock, after the pre-turn delay.
pub const TURN_DURATION_SECS: u32 = 30;
/// Countdown shown before a turn becomes actionable.
pub const PRE_TURN_DELAY_SECS: u32 = 3;
/// Combat turn clock while the acting combatant can still evade.
pub const COMBAT_SECS_WITH_EVASION: u32 = 5;
/// Combat turn clock once the acting combatant has no evasions left.
pub const COMBAT_SECS_WITHOUT_EVASION: u32 = 3;
/// Chance that an evasion attempt ends the combat. An older code path
/// used 0.3; 0.4 is the documented value.
pub const EVASION_PROBABILITY: f64 = 0.4;
/// Chance of slipping when entering an ice tile.
pub const FALL_PROBABILITY: f64 = 0.1;
/// Attack and defense lost while standing on ice.
pub const ICE_PENALTY: i32 = 2;
pub const MAX_EVASIONS: u32 = 2;
pub const ACTIONS_PER_TURN: u32 = 1;
/// Combat victories that win a classic game.
pub const VICTORIES_TO_WIN: u32 = 3;
/// Pause between two tiles of an animated move.
pub const MOVE_STEP_DELAY_MS: u64 = 150;
/// Pause before a virtual player acts.
pub const BOT_THINK_DELAY_MS: u64 = 500;
/// Chance that a virtual player keeps going after a random move.
pub const BOT_CONTINUE_PROBABILITY: f64 = 0.5;
/// Hard cap on virtual-player decisions within one turn.
pub const BOT_MAX_INVOCATIONS: u32 = 32;
pub const INVENTORY_CAPACITY: usize = 2;

pub const BASE_LIFE: u32 = 4;
pub const BASE_SPEED: u32 = 4;
pub const BASE_ATTACK: i32 = 4;
pub const BASE_DEFENSE: i32 = 4;
/// Added to life or speed, per the character sheet.
pub const SHEET_BONUS: u32 = 2;
/// Stat bonus granted by an item.
pub const ITEM_BONUS: i32 = 2;

// ---------------------------------------------------------------------------
// GameRules
// ---------------------------------------------------------------------------

/// Rule set of one room. `Default` uses the constants above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub turn_duration_secs: u32,
    pub pre_turn_delay_secs: u32,
    pub combat_secs_with_evasion: u32,
    pub combat_secs_without_evasion: u32,
    pub evasion_probability: f64,
    pub fall_probability: f64,
    pub ice_penalty: i32,
    pub max_evasions: u32,
    pub actions_per_turn: u32,
    pub victories_to_win: u32,
    pub move_step_delay: Duration,
    pub bot_think_delay: Duration,
    pub bot_continue_probability: f64,
    pub bot_max_invocations: u32,
    pub inventory_capacity: usize,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            turn_duration_secs: TURN_DURATION_SECS,
            pre_turn_delay_secs: PRE_TURN_DELAY_SECS,
            combat_secs_with_evasion: COMBAT_SECS_WITH_EVASION,
            combat_secs_without_evasion: COMBAT_SECS_WITHOUT_EVASION,
            evasion_probability: EVASION_PROBABILITY,
            fall_probability: FALL_PROBABILITY,
            ice_penalty: ICE_PENALTY,
            max_evasions: MAX_EVASIONS,
            actions_per_turn: ACTIONS_PER_TURN,
            victories_to_win: VICTORIES_TO_WIN,
            move_step_delay: Duration::from_millis(MOVE_STEP_DELAY_MS),
            bot_think_delay: Duration::from_millis(BOT_THINK_DELAY_MS),
            bot_continue_probability: BOT_CONTINUE_PROBABILITY,
            bot_max_invocations: BOT_MAX_INVOCATIONS,
            inventory_capacity: INVENTORY_CAPACITY,
        }
    }
}

impl GameRules {
    /// Combat clock for a combatant with `evasions_left` attempts.
    pub fn combat_secs(&self, evasions_left: u32) -> u32 {
        if evasions_left > 0 {
            self.combat_secs_with_evasion
        } else {
            self.combat_secs_without_evasion
        }
    }
}

// ---------------------------------------------------------------------------
// Map tiers and modes
// ---------------------------------------------------------------------------

/// Size tier of a map. The tier fixes room capacity and how many start
/// tiles a session keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapSize {
    Small,
    Medium,
    Large,
}

impl MapSize {
    /// Tier of a grid with the given side length.
    pub fn from_side(side: usize) -> Option<Self> {
        match side {
            10 => Some(Self::Small),
            15 => Some(Self::Medium),
            20 => Some(Self::Large),
            _ => None,
        }
    }

    pub fn side(self) -> usize {
        match self {
            Self::Small => 10,
            Self::Medium => 15,
            Self::Large => 20,
        }
    }

    /// Maximum players, which is also the number of retained start tiles.
    pub fn capacity(self) -> usize {
        match self {
            Self::Small => 2,
            Self::Medium => 4,
            Self::Large => 6,
        }
    }

    /// Active players needed to start a game.
    pub fn min_players(self) -> usize {
        2
    }
}

/// Victory condition of a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// First to [`VICTORIES_TO_WIN`] combat wins.
    #[default]
    Classic,
    /// Bring the flag back to your own spawn.
    CaptureTheFlag,
}
