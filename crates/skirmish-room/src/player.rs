//! Players, character sheets, and stat blocks.

use rand::Rng;
use serde::{Deserialize, Serialize};
use skirmish_grid::Position;
use skirmish_protocol::PlayerId;

use crate::ItemKind;
use crate::rules::{BASE_ATTACK, BASE_DEFENSE, BASE_LIFE, BASE_SPEED, SHEET_BONUS};

// ---------------------------------------------------------------------------
// Character sheet
// ---------------------------------------------------------------------------

/// A bonus die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Die {
    D4,
    D6,
}

impl Die {
    pub fn sides(self) -> u32 {
        match self {
            Self::D4 => 4,
            Self::D6 => 6,
        }
    }

    /// A uniform draw in `1..=sides`.
    pub fn roll<R: Rng>(self, rng: &mut R) -> u32 {
        rng.random_range(1..=self.sides())
    }
}

/// Which base stat gets the sheet bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatBonus {
    Life,
    Speed,
}

/// Which combat stat rolls the D6 (the other rolls a D4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceBonus {
    Attack,
    Defense,
}

/// What a player chooses before joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub bonus: StatBonus,
    pub dice: DiceBonus,
}

impl CharacterSheet {
    pub fn new(name: impl Into<String>, bonus: StatBonus, dice: DiceBonus) -> Self {
        Self {
            name: name.into(),
            bonus,
            dice,
        }
    }

    /// A sheet with random bonus choices, used for virtual players.
    pub fn random<R: Rng>(name: impl Into<String>, rng: &mut R) -> Self {
        let bonus = if rng.random_bool(0.5) {
            StatBonus::Life
        } else {
            StatBonus::Speed
        };
        let dice = if rng.random_bool(0.5) {
            DiceBonus::Attack
        } else {
            DiceBonus::Defense
        };
        Self::new(name, bonus, dice)
    }
}

/// Behaviour of a virtual player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    /// Hunts swords and always attacks.
    Aggressive,
    /// Hunts armor and evades fights it is likely to lose.
    Defensive,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub life: u32,
    pub max_life: u32,
    pub speed: u32,
    pub attack: i32,
    pub defense: i32,
    pub move_points: u32,
    pub actions: u32,
    /// Evasion attempts left in the current combat.
    pub evasions: u32,
    pub attack_die: Die,
    pub defense_die: Die,
}

impl Stats {
    pub fn from_sheet(sheet: &CharacterSheet) -> Self {
        let (life, speed) = match sheet.bonus {
            StatBonus::Life => (BASE_LIFE + SHEET_BONUS, BASE_SPEED),
            StatBonus::Speed => (BASE_LIFE, BASE_SPEED + SHEET_BONUS),
        };
        let (attack_die, defense_die) = match sheet.dice {
            DiceBonus::Attack => (Die::D6, Die::D4),
            DiceBonus::Defense => (Die::D4, Die::D6),
        };
        Self {
            life,
            max_life: life,
            speed,
            attack: BASE_ATTACK,
            defense: BASE_DEFENSE,
            move_points: 0,
            actions: 0,
            evasions: 0,
            attack_die,
            defense_die,
        }
    }
}

/// Cumulative per-game counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub victories: u32,
    pub defeats: u32,
    pub combats: u32,
    pub evasions: u32,
    pub life_taken: u32,
    pub life_lost: u32,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    pub spawn: Position,
    pub stats: Stats,
    pub record: Record,
    /// Oldest item first.
    pub inventory: Vec<ItemKind>,
    /// Cleared when the player disconnects after the game started.
    pub active: bool,
    /// Set for virtual players.
    pub profile: Option<Profile>,
    /// Whether the ice penalty is currently applied.
    pub on_ice: bool,
}

impl Player {
    pub fn new(id: PlayerId, sheet: &CharacterSheet) -> Self {
        Self {
            id,
            name: sheet.name.clone(),
            position: Position::default(),
            spawn: Position::default(),
            stats: Stats::from_sheet(sheet),
            record: Record::default(),
            inventory: Vec::new(),
            active: true,
            profile: None,
            on_ice: false,
        }
    }

    pub fn virtual_player(id: PlayerId, sheet: &CharacterSheet, profile: Profile) -> Self {
        Self {
            profile: Some(profile),
            ..Self::new(id, sheet)
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.profile.is_some()
    }

    /// Refills move points and actions at the start of the player's turn.
    pub fn begin_turn(&mut self, actions: u32) {
        self.stats.move_points = self.stats.speed;
        self.stats.actions = actions;
    }

    /// Applies or reverts the ice penalty when the terrain under the
    /// player changes. Standing still on the same terrain is a no-op.
    pub fn set_terrain(&mut self, on_ice: bool, penalty: i32) {
        if on_ice == self.on_ice {
            return;
        }
        if on_ice {
            self.stats.attack -= penalty;
            self.stats.defense -= penalty;
        } else {
            self.stats.attack += penalty;
            self.stats.defense += penalty;
        }
        self.on_ice = on_ice;
    }

    pub fn has_item(&self, item: ItemKind) -> bool {
        self.inventory.contains(&item)
    }
}
