//! Tile grid model and movement search for Skirmish.
//!
//! The grid is a square of [`Tile`]s addressed by [`Position`]. Entering a
//! tile costs its weight (floor 1, water 2, ice 0); walls and closed doors
//! cannot be entered. On top of that model this crate provides:
//!
//! - [`reachable`]: every destination within a move-point budget, each
//!   with its cheapest path (Dijkstra, 4-connected).
//! - [`plan_move`]: the cheapest path to one destination, then walked
//!   cell by cell with the ice stumble rule ([`apply_stumble`]).
//! - [`visibility_halo`], [`shortest_path`], [`truncate_to_budget`],
//!   [`nearest_cell`]: helpers for virtual players and respawning.
//!
//! Nothing here knows about players: cells occupied by other pawns are
//! passed in as a `blocked` set.

mod error;
mod path;
mod tile;

pub use error::GridError;
pub use path::{
    Movement, Route, apply_stumble, nearest_cell, plan_move, reachable, shortest_path,
    truncate_to_budget, visibility_halo,
};
pub use tile::{Grid, Position, Tile};
