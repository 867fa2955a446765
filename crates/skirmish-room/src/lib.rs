//! Rooms of Skirmish: lobbies, turn-based games, combat, and virtual
//! players.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`GameSession`], its turn and combat clocks, and the running combat.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms, routes players, prunes closed ones
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`GameSession`]: roster, grid, items, and turn order of one room
//! - [`Combat`]: a two-player engagement
//! - [`MapCatalog`]: read-only source of map layouts
//! - [`ClientEvent`] / [`ServerEvent`]: the game events on the wire

pub mod bot;
mod catalog;
mod combat;
mod config;
mod error;
mod events;
mod items;
mod journal;
mod manager;
mod player;
mod room;
pub mod rules;
mod session;

pub use catalog::{InMemoryCatalog, MapCatalog, MapLayout};
pub use combat::{
    AttackReport, Combat, Conclusion, EvasionReport, attack_succeeds, conclude, conclude_by_evasion,
};
pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use events::{ClientEvent, PossibleMove, ServerEvent};
pub use items::{ItemEffects, ItemKind, ItemPlacement, StandardItemEffects};
pub use journal::{Journal, JournalEntry, MemoryJournal, TracingJournal};
pub use manager::RoomManager;
pub use player::{CharacterSheet, DiceBonus, Die, Player, Profile, Record, StatBonus, Stats};
pub use room::{JoinAck, PlayerSender, RoomHandle, RoomInfo};
pub use rules::{GameMode, GameRules, MapSize};
pub use session::{Departure, GameSession, Pickup, SessionView};
