//! Decision procedure of virtual players.
//!
//! The planner is pure: given the session it returns the next thing a
//! bot wants to do, and the room actor carries it out exactly as it
//! would for a human client. One invocation looks at, in order:
//!
//! 1. an adjacent door to toggle ([`pick_door`]),
//! 2. a profile-relevant item in the visibility halo,
//! 3. an opponent in the halo (engage or approach),
//! 4. a random reachable cell.
//!
//! The actor re-invokes the planner after each move while
//! [`keeps_going`] says so, up to a fixed number of invocations per turn.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use skirmish_grid::{
    Grid, Position, Tile, reachable, shortest_path, truncate_to_budget, visibility_halo,
};
use skirmish_protocol::PlayerId;

use crate::{GameMode, GameRules, GameSession, ItemKind, Player, Profile};

const NAMES: [&str; 8] = [
    "Ash", "Birch", "Cedar", "Elm", "Hazel", "Maple", "Rowan", "Willow",
];

/// A name for a new virtual player. Collisions are resolved by the
/// session like any other.
pub fn bot_name<R: Rng>(rng: &mut R) -> String {
    NAMES.choose(rng).copied().unwrap_or("Bot").to_string()
}

/// Why a bot is moving; decides what happens once it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveIntent {
    /// Heading for an item.
    Collect,
    /// Closing in on an opponent.
    Approach(PlayerId),
    /// Carrying the flag back to spawn.
    ReturnFlag,
    /// A random reachable cell.
    Wander,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Move {
        destination: Position,
        intent: MoveIntent,
    },
    /// Start a combat against an adjacent opponent.
    Engage(PlayerId),
    EndTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatChoice {
    Attack,
    Evade,
}

/// An adjacent door the bot could toggle right now, picked at random.
pub fn pick_door<R: Rng>(session: &GameSession, bot: PlayerId, rng: &mut R) -> Option<Position> {
    let me = session.player(bot)?;
    if me.stats.actions == 0 {
        return None;
    }
    let grid = session.grid();
    let doors: Vec<Position> = grid
        .neighbors(me.position)
        .filter(|&cell| match grid.tile(cell) {
            Some(Tile::Door { open: false }) => true,
            Some(Tile::Door { open: true }) => session.occupant(cell).is_none(),
            _ => false,
        })
        .collect();
    doors.choose(rng).copied()
}

fn is_relevant(profile: Profile, mode: GameMode, item: ItemKind) -> bool {
    match item {
        ItemKind::Sword => profile == Profile::Aggressive,
        ItemKind::Armor => profile == Profile::Defensive,
        ItemKind::Flag => mode == GameMode::CaptureTheFlag,
        ItemKind::Boots | ItemKind::Amulet => false,
    }
}

/// Furthest cell along the cheapest path to `goal` the bot can pay for.
fn step_towards(
    grid: &Grid,
    blocked: &HashSet<Position>,
    me: &Player,
    goal: Position,
) -> Option<Position> {
    let route = shortest_path(grid, blocked, me.position, goal)?;
    truncate_to_budget(grid, &route, me.stats.move_points).destination()
}

/// Steps 2 to 4 of a bot invocation.
pub fn decide<R: Rng>(session: &GameSession, bot: PlayerId, rng: &mut R) -> BotAction {
    let Some(me) = session.player(bot) else {
        return BotAction::EndTurn;
    };
    let profile = me.profile.unwrap_or(Profile::Aggressive);
    let grid = session.grid();
    let blocked = session.occupied_except(bot);
    let moves = reachable(grid, &blocked, me.position, me.stats.move_points);
    let halo = visibility_halo(grid, me.position, &moves);

    if session.mode() == GameMode::CaptureTheFlag
        && me.has_item(ItemKind::Flag)
        && me.position != me.spawn
    {
        if let Some(destination) = step_towards(grid, &blocked, me, me.spawn) {
            return BotAction::Move {
                destination,
                intent: MoveIntent::ReturnFlag,
            };
        }
    }

    let wanted = session
        .items()
        .iter()
        .filter(|&(pos, &kind)| {
            halo.contains(pos) && is_relevant(profile, session.mode(), kind) && !me.has_item(kind)
        })
        .map(|(&pos, _)| pos)
        .min_by_key(|pos| pos.manhattan(me.position));
    if let Some(item) = wanted {
        if let Some(destination) = step_towards(grid, &blocked, me, item) {
            return BotAction::Move {
                destination,
                intent: MoveIntent::Collect,
            };
        }
    }

    if me.stats.actions > 0 {
        let targets: Vec<&Player> = session
            .players()
            .iter()
            .filter(|p| p.active && p.id != bot && halo.contains(&p.position))
            .collect();
        if let Some(target) = targets.choose(rng) {
            if me.position.is_adjacent(target.position) {
                return BotAction::Engage(target.id);
            }
            let beside = moves
                .iter()
                .filter(|(cell, _)| cell.is_adjacent(target.position))
                .min_by_key(|(_, route)| route.cost)
                .map(|(&cell, _)| cell);
            if let Some(destination) = beside {
                return BotAction::Move {
                    destination,
                    intent: MoveIntent::Approach(target.id),
                };
            }
        }
    }

    let options: Vec<Position> = moves.keys().copied().collect();
    match options.choose(rng) {
        Some(&destination) => BotAction::Move {
            destination,
            intent: MoveIntent::Wander,
        },
        None => BotAction::EndTurn,
    }
}

/// Whether the bot takes another invocation after finishing a move.
pub fn keeps_going<R: Rng>(intent: MoveIntent, me: &Player, rules: &GameRules, rng: &mut R) -> bool {
    match intent {
        MoveIntent::Wander => {
            me.stats.actions > 0
                && me.stats.move_points > 0
                && rng.random_bool(rules.bot_continue_probability.clamp(0.0, 1.0))
        }
        MoveIntent::Approach(_) => me.stats.actions > 0,
        MoveIntent::Collect | MoveIntent::ReturnFlag => me.stats.move_points > 0,
    }
}

/// Attack or evade on the bot's combat turn. Aggressive bots always
/// attack; defensive bots evade while they have attempts left and the
/// opponent's life plus speed beats their own.
pub fn combat_choice(session: &GameSession, bot: PlayerId, opponent: PlayerId) -> CombatChoice {
    let (Some(me), Some(them)) = (session.player(bot), session.player(opponent)) else {
        return CombatChoice::Attack;
    };
    match me.profile {
        Some(Profile::Defensive)
            if me.stats.evasions > 0
                && them.stats.life + them.stats.speed > me.stats.life + me.stats.speed =>
        {
            CombatChoice::Evade
        }
        _ => CombatChoice::Attack,
    }
}
