//! Session state of one room: roster, grid, items, and turn order.
//!
//! [`GameSession`] is plain data plus the registry operations of the
//! game. It never sends anything: the room actor mutates it, then tells
//! clients what changed.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use skirmish_grid::{Grid, Movement, Position, Route, Tile, apply_stumble, nearest_cell, reachable};
use skirmish_protocol::{PlayerId, RoomId};
use tracing::warn;

use crate::{
    GameMode, GameRules, ItemEffects, ItemKind, ItemPlacement, MapLayout, MapSize, Player,
    RoomError,
};

/// Snapshot of a session sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub room_id: RoomId,
    pub map_id: String,
    pub size: MapSize,
    pub mode: GameMode,
    pub grid: Grid,
    pub items: Vec<ItemPlacement>,
    /// In turn order once the game has started.
    pub players: Vec<Player>,
    pub host: Option<PlayerId>,
    pub current: Option<PlayerId>,
    pub turn_count: u32,
    pub started: bool,
    pub locked: bool,
}

/// A player who left, as they were when leaving.
#[derive(Debug, Clone)]
pub struct Departure {
    pub player: Player,
    pub was_host: bool,
    /// The player held the turn.
    pub was_current: bool,
}

/// Result of stepping onto an item tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    pub item: ItemKind,
    /// Oldest item swapped onto the tile when the inventory was full.
    pub dropped: Option<ItemKind>,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: RoomId,
    map_id: String,
    grid: Grid,
    size: MapSize,
    mode: GameMode,
    items: BTreeMap<Position, ItemKind>,
    start_tiles: Vec<Position>,
    players: Vec<Player>,
    host: Option<PlayerId>,
    current_turn: usize,
    turn_count: u32,
    elapsed_secs: u64,
    started: bool,
    locked: bool,
}

impl GameSession {
    /// Builds a lobby from a layout, keeping exactly as many start tiles
    /// as the size tier allows (picked at random among those authored).
    pub fn new<R: Rng>(id: RoomId, layout: MapLayout, rng: &mut R) -> Result<Self, RoomError> {
        let size = layout.size()?;
        let mut start_tiles: Vec<Position> = layout
            .start_points
            .into_iter()
            .filter(|p| layout.grid.contains(*p))
            .collect();
        start_tiles.sort_unstable();
        start_tiles.dedup();
        if start_tiles.len() < size.capacity() {
            return Err(RoomError::InvalidMap(format!(
                "{}: {} start points, need {}",
                layout.id,
                start_tiles.len(),
                size.capacity()
            )));
        }
        discard_randomly(&mut start_tiles, size.capacity(), rng);

        Ok(Self {
            id,
            map_id: layout.id,
            grid: layout.grid,
            size,
            mode: layout.mode,
            items: layout
                .items
                .into_iter()
                .map(|item| (item.position, item.kind))
                .collect(),
            start_tiles,
            players: Vec::new(),
            host: None,
            current_turn: 0,
            turn_count: 0,
            elapsed_secs: 0,
            started: false,
            locked: false,
        })
    }

    // -- accessors --------------------------------------------------------

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn size(&self) -> MapSize {
        self.size
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.size.capacity()
    }

    pub fn items(&self) -> &BTreeMap<Position, ItemKind> {
        &self.items
    }

    pub fn start_tiles(&self) -> &[Position] {
        &self.start_tiles
    }

    /// Players in join order before the start, in turn order after.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Counts one second of either clock.
    pub fn tick_elapsed(&mut self) {
        self.elapsed_secs += 1;
    }

    /// The turn holder, once the game has started.
    pub fn current_player(&self) -> Option<&Player> {
        if !self.started {
            return None;
        }
        self.players.get(self.current_turn).filter(|p| p.active)
    }

    pub fn current_id(&self) -> Option<PlayerId> {
        self.current_player().map(|p| p.id)
    }

    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.active).count()
    }

    pub fn has_active_human(&self) -> bool {
        self.players.iter().any(|p| p.active && !p.is_virtual())
    }

    /// The active player standing on `pos`.
    pub fn occupant(&self, pos: Position) -> Option<&Player> {
        self.players.iter().find(|p| p.active && p.position == pos)
    }

    /// Cells other active pawns stand on.
    pub fn occupied_except(&self, id: PlayerId) -> HashSet<Position> {
        self.players
            .iter()
            .filter(|p| p.active && p.id != id)
            .map(|p| p.position)
            .collect()
    }

    fn index_of(&self, id: PlayerId) -> Result<usize, RoomError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or(RoomError::PlayerNotFound(id))
    }

    fn require(&self, id: PlayerId) -> Result<&Player, RoomError> {
        self.player(id).ok_or(RoomError::PlayerNotFound(id))
    }

    fn require_mut(&mut self, id: PlayerId) -> Result<&mut Player, RoomError> {
        self.player_mut(id).ok_or(RoomError::PlayerNotFound(id))
    }

    // -- lobby ------------------------------------------------------------

    /// `name`, or `name-N` with N one above the highest suffix already
    /// used for that base name (a bare `name` counts as 1).
    pub fn unique_name(&self, name: &str) -> String {
        if !self.players.iter().any(|p| p.name == name) {
            return name.to_string();
        }
        let highest = self
            .players
            .iter()
            .filter_map(|p| name_suffix(&p.name, name))
            .max()
            .unwrap_or(1);
        format!("{name}-{}", highest + 1)
    }

    /// Adds a player to the lobby, renaming on a collision. The first
    /// human becomes host; the room locks itself once full.
    pub fn add_player(&mut self, mut player: Player) -> Result<&Player, RoomError> {
        if self.started {
            return Err(RoomError::AlreadyStarted(self.id.clone()));
        }
        if self.player(player.id).is_some() {
            return Err(RoomError::AlreadyInRoom(player.id, self.id.clone()));
        }
        if self.locked {
            return Err(RoomError::Locked(self.id.clone()));
        }
        if self.players.len() >= self.capacity() {
            return Err(RoomError::RoomFull(self.id.clone()));
        }

        player.name = self.unique_name(&player.name);
        if self.host.is_none() && !player.is_virtual() {
            self.host = Some(player.id);
        }
        let index = self.players.len();
        self.players.push(player);
        if self.players.len() >= self.capacity() {
            self.locked = true;
        }
        Ok(&self.players[index])
    }

    /// Locks or unlocks the lobby. A full room cannot be unlocked.
    pub fn set_locked(&mut self, locked: bool) -> Result<(), RoomError> {
        if self.started {
            return Err(RoomError::AlreadyStarted(self.id.clone()));
        }
        if !locked && self.players.len() >= self.capacity() {
            return Err(RoomError::RoomFull(self.id.clone()));
        }
        self.locked = locked;
        Ok(())
    }

    pub fn is_startable(&self) -> Result<(), RoomError> {
        let active = self.active_count();
        let required = self.size.min_players();
        if active < required {
            return Err(RoomError::NotStartable { active, required });
        }
        Ok(())
    }

    /// Removes a player. Before the start the player is deleted from the
    /// roster (and the room unlocks if below capacity); afterwards they
    /// are only marked inactive so the turn order keeps its slots.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Departure, RoomError> {
        let index = self.index_of(id)?;
        let was_host = self.host == Some(id);

        if !self.started {
            let player = self.players.remove(index);
            if was_host {
                self.host = None;
            }
            if self.players.len() < self.capacity() {
                self.locked = false;
            }
            return Ok(Departure {
                player,
                was_host,
                was_current: false,
            });
        }

        let was_current = self.current_turn == index;
        let player = &mut self.players[index];
        if !player.active {
            return Err(RoomError::PlayerNotFound(id));
        }
        player.active = false;
        Ok(Departure {
            player: player.clone(),
            was_host,
            was_current,
        })
    }

    // -- game start -------------------------------------------------------

    /// Orders players by descending speed. Equal speeds end up in a
    /// uniformly random order: the roster is shuffled before a stable
    /// sort.
    pub fn compute_turn_order<R: Rng>(&mut self, rng: &mut R) {
        self.players.shuffle(rng);
        self.players.sort_by(|a, b| b.stats.speed.cmp(&a.stats.speed));
        self.current_turn = 0;
    }

    /// Drops start tiles at random down to the player count, then gives
    /// every player a distinct tile drawn without replacement. Players
    /// starting on ice take the ice penalty.
    pub fn assign_start_positions<R: Rng>(&mut self, ice_penalty: i32, rng: &mut R) {
        discard_randomly(&mut self.start_tiles, self.players.len(), rng);
        let mut pool = self.start_tiles.clone();
        for player in &mut self.players {
            if pool.is_empty() {
                warn!(room_id = %self.id, player = %player.id, "no start tile left");
                break;
            }
            let tile = pool.swap_remove(rng.random_range(0..pool.len()));
            player.position = tile;
            player.spawn = tile;
            let on_ice = self.grid.tile(tile).is_some_and(Tile::is_ice);
            player.set_terrain(on_ice, ice_penalty);
        }
    }

    /// Checks startability, fixes turn order and start tiles, and locks
    /// the room for good.
    pub fn start<R: Rng>(&mut self, rules: &GameRules, rng: &mut R) -> Result<(), RoomError> {
        if self.started {
            return Err(RoomError::AlreadyStarted(self.id.clone()));
        }
        self.is_startable()?;
        self.compute_turn_order(rng);
        self.assign_start_positions(rules.ice_penalty, rng);
        self.started = true;
        self.locked = true;
        self.current_turn = self.players.iter().position(|p| p.active).unwrap_or(0);
        Ok(())
    }

    /// Moves the turn pointer to the next active player, wrapping around.
    /// Returns `None` when nobody is active.
    pub fn advance_turn(&mut self) -> Option<PlayerId> {
        let count = self.players.len();
        if self.active_count() == 0 {
            return None;
        }
        let mut next = self.current_turn;
        loop {
            next = (next + 1) % count;
            if self.players[next].active {
                break;
            }
        }
        self.current_turn = next;
        self.turn_count += 1;
        Some(self.players[next].id)
    }

    // -- movement ---------------------------------------------------------

    /// Reachable set of a player with its current move points.
    pub fn reachable_for(&self, id: PlayerId) -> Result<BTreeMap<Position, Route>, RoomError> {
        let player = self.require(id)?;
        Ok(reachable(
            &self.grid,
            &self.occupied_except(id),
            player.position,
            player.stats.move_points,
        ))
    }

    /// Cheapest affordable path to `dest`, cut at the first item tile on
    /// the way, then walked with the stumble rule.
    pub fn plan_move<R: Rng>(
        &self,
        id: PlayerId,
        dest: Position,
        fall_probability: f64,
        rng: &mut R,
    ) -> Result<Movement, RoomError> {
        let mut route = self
            .reachable_for(id)?
            .remove(&dest)
            .ok_or_else(|| RoomError::InvalidTransition(format!("{dest} is not reachable")))?;
        if let Some(stop) = route.path.iter().position(|c| self.items.contains_key(c)) {
            route.path.truncate(stop + 1);
            route.cost = route
                .path
                .iter()
                .filter_map(|c| self.grid.weight(*c))
                .sum();
        }
        Ok(apply_stumble(&self.grid, &route, fall_probability, rng))
    }

    /// Moves a player onto an adjacent cell, paying the cell's weight.
    pub fn step_player(
        &mut self,
        id: PlayerId,
        cell: Position,
        ice_penalty: i32,
    ) -> Result<(), RoomError> {
        let tile = self
            .grid
            .tile(cell)
            .filter(|t| t.is_traversable())
            .ok_or_else(|| RoomError::InvalidTransition(format!("{cell} is blocked")))?;
        if self.occupant(cell).is_some_and(|p| p.id != id) {
            return Err(RoomError::InvalidTransition(format!("{cell} is occupied")));
        }
        let weight = tile.weight().unwrap_or(0);
        let player = self.require_mut(id)?;
        player.stats.move_points = player.stats.move_points.saturating_sub(weight);
        player.position = cell;
        player.set_terrain(tile.is_ice(), ice_penalty);
        Ok(())
    }

    /// Picks up the item under the player, if any. A full inventory
    /// swaps its oldest item onto the tile.
    pub fn pick_up(
        &mut self,
        id: PlayerId,
        effects: &dyn ItemEffects,
        capacity: usize,
    ) -> Result<Option<Pickup>, RoomError> {
        let index = self.index_of(id)?;
        let pos = self.players[index].position;
        let Some(item) = self.items.remove(&pos) else {
            return Ok(None);
        };

        let player = &mut self.players[index];
        let mut dropped = None;
        if !player.inventory.is_empty() && player.inventory.len() >= capacity {
            let oldest = player.inventory.remove(0);
            effects.deactivate(player, oldest);
            self.items.insert(pos, oldest);
            dropped = Some(oldest);
        }
        player.inventory.push(item);
        effects.activate(player, item);
        Ok(Some(Pickup { item, dropped }))
    }

    /// Spreads the player's inventory over the nearest free, item-less
    /// cells around them.
    pub fn drop_inventory(
        &mut self,
        id: PlayerId,
        effects: &dyn ItemEffects,
    ) -> Result<Vec<ItemPlacement>, RoomError> {
        let index = self.index_of(id)?;
        let origin = self.players[index].position;
        let items = std::mem::take(&mut self.players[index].inventory);
        let blocked = self.occupied_except(id);

        let mut placed = Vec::with_capacity(items.len());
        for item in items {
            effects.deactivate(&mut self.players[index], item);
            let spot = nearest_cell(&self.grid, origin, |c| {
                !blocked.contains(&c)
                    && !self.items.contains_key(&c)
                    && self.grid.tile(c).is_some_and(Tile::is_traversable)
            });
            match spot {
                Some(position) => {
                    self.items.insert(position, item);
                    placed.push(ItemPlacement {
                        position,
                        kind: item,
                    });
                }
                None => warn!(room_id = %self.id, ?item, "no free cell to drop item"),
            }
        }
        Ok(placed)
    }

    /// Sends a player back to their spawn, or the nearest free
    /// traversable cell if someone stands on it.
    pub fn respawn(&mut self, id: PlayerId, ice_penalty: i32) -> Result<Position, RoomError> {
        let spawn = self.require(id)?.spawn;
        let blocked = self.occupied_except(id);
        let target = nearest_cell(&self.grid, spawn, |c| {
            !blocked.contains(&c) && self.grid.tile(c).is_some_and(Tile::is_traversable)
        })
        .unwrap_or(spawn);
        let on_ice = self.grid.tile(target).is_some_and(Tile::is_ice);
        let player = self.require_mut(id)?;
        player.position = target;
        player.set_terrain(on_ice, ice_penalty);
        Ok(target)
    }

    // -- grid actions -----------------------------------------------------

    /// Opens or closes an adjacent door for one action. Returns the new
    /// open state. A door cannot close on an occupied cell.
    pub fn toggle_door(&mut self, id: PlayerId, pos: Position) -> Result<bool, RoomError> {
        self.check_adjacent_action(id, pos)?;
        let Some(Tile::Door { open }) = self.grid.tile(pos) else {
            return Err(RoomError::InvalidTransition(format!("{pos} is not a door")));
        };
        if open && self.occupant(pos).is_some() {
            return Err(RoomError::InvalidTransition(format!("door {pos} is blocked")));
        }
        self.grid
            .set(pos, Tile::Door { open: !open })
            .map_err(|e| RoomError::InvalidTransition(e.to_string()))?;
        self.require_mut(id)?.stats.actions -= 1;
        Ok(!open)
    }

    /// Turns an adjacent wall into floor for one action.
    pub fn break_wall(&mut self, id: PlayerId, pos: Position) -> Result<(), RoomError> {
        self.check_adjacent_action(id, pos)?;
        if self.grid.tile(pos) != Some(Tile::Wall) {
            return Err(RoomError::InvalidTransition(format!("{pos} is not a wall")));
        }
        self.grid
            .set(pos, Tile::Floor)
            .map_err(|e| RoomError::InvalidTransition(e.to_string()))?;
        self.require_mut(id)?.stats.actions -= 1;
        Ok(())
    }

    fn check_adjacent_action(&self, id: PlayerId, pos: Position) -> Result<(), RoomError> {
        let player = self.require(id)?;
        if !player.position.is_adjacent(pos) {
            return Err(RoomError::InvalidTransition(format!(
                "{pos} is not adjacent to {}",
                player.position
            )));
        }
        if player.stats.actions == 0 {
            return Err(RoomError::Exhausted(format!("{id} has no actions left")));
        }
        Ok(())
    }

    // -- end of game ------------------------------------------------------

    /// The winner, if the game is over: the last active player standing,
    /// the first to enough victories (classic), or an active flag
    /// carrier standing on its own spawn (capture the flag).
    pub fn winner(&self, rules: &GameRules) -> Option<PlayerId> {
        if !self.started {
            return None;
        }
        let mut active = self.players.iter().filter(|p| p.active);
        if self.active_count() < 2 {
            return active.next().map(|p| p.id);
        }
        match self.mode {
            GameMode::Classic => active
                .find(|p| p.record.victories >= rules.victories_to_win)
                .map(|p| p.id),
            GameMode::CaptureTheFlag => active
                .find(|p| p.has_item(ItemKind::Flag) && p.position == p.spawn)
                .map(|p| p.id),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            room_id: self.id.clone(),
            map_id: self.map_id.clone(),
            size: self.size,
            mode: self.mode,
            grid: self.grid.clone(),
            items: self
                .items
                .iter()
                .map(|(&position, &kind)| ItemPlacement { position, kind })
                .collect(),
            players: self.players.clone(),
            host: self.host,
            current: self.current_id(),
            turn_count: self.turn_count,
            started: self.started,
            locked: self.locked,
        }
    }
}

/// Suffix of `candidate` as a variant of `base`: `base` is 1, `base-N`
/// is N.
fn name_suffix(candidate: &str, base: &str) -> Option<u32> {
    if candidate == base {
        return Some(1);
    }
    candidate.strip_prefix(base)?.strip_prefix('-')?.parse().ok()
}

fn discard_randomly<R: Rng>(tiles: &mut Vec<Position>, keep: usize, rng: &mut R) {
    while tiles.len() > keep {
        let victim = rng.random_range(0..tiles.len());
        tiles.remove(victim);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::{CharacterSheet, DiceBonus, Profile, StandardItemEffects, StatBonus};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn layout(side: usize, starts: &[(usize, usize)]) -> MapLayout {
        MapLayout {
            id: "test".into(),
            name: "Test".into(),
            mode: GameMode::Classic,
            grid: Grid::filled(side, Tile::Floor),
            items: vec![],
            start_points: starts.iter().map(|&(x, y)| Position::new(x, y)).collect(),
        }
    }

    fn player(id: u64, name: &str) -> Player {
        Player::new(
            PlayerId(id),
            &CharacterSheet::new(name, StatBonus::Life, DiceBonus::Attack),
        )
    }

    fn session(starts: &[(usize, usize)]) -> GameSession {
        GameSession::new(RoomId::from("G1"), layout(10, starts), &mut rng()).unwrap()
    }

    /// Two players on a 10x10 floor map, started, P1 first.
    fn started_duel() -> GameSession {
        let mut s = session(&[(0, 0), (5, 5)]);
        let mut p1 = player(1, "P1");
        p1.stats.speed = 10;
        let mut p2 = player(2, "P2");
        p2.stats.speed = 5;
        s.add_player(p1).unwrap();
        s.add_player(p2).unwrap();
        s.start(&GameRules::default(), &mut rng()).unwrap();
        s
    }

    // -- lobby ------------------------------------------------------------

    #[test]
    fn test_start_tiles_trimmed_to_tier_cap() {
        let many: Vec<(usize, usize)> = (0..8).map(|i| (i, 0)).collect();
        for (side, cap) in [(10, 2), (15, 4), (20, 6)] {
            let s = GameSession::new(RoomId::from("T"), layout(side, &many), &mut rng()).unwrap();
            assert_eq!(s.start_tiles().len(), cap, "side {side}");
        }
    }

    #[test]
    fn test_repeated_start_points_never_share_a_spawn() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut s = GameSession::new(
                RoomId::from("T"),
                layout(10, &[(0, 0), (5, 5), (0, 0)]),
                &mut rng,
            )
            .unwrap();
            s.add_player(player(1, "P1")).unwrap();
            s.add_player(player(2, "P2")).unwrap();
            s.start(&GameRules::default(), &mut rng).unwrap();
            let spawns: Vec<Position> = s.players().iter().map(|p| p.spawn).collect();
            assert_ne!(spawns[0], spawns[1], "seed {seed}");
        }
    }

    #[test]
    fn test_repeated_start_points_count_once() {
        let result = GameSession::new(
            RoomId::from("T"),
            layout(15, &[(0, 0), (1, 1), (0, 0), (1, 1)]),
            &mut rng(),
        );
        assert!(matches!(result, Err(RoomError::InvalidMap(_))));
    }

    #[test]
    fn test_too_few_start_tiles_is_invalid() {
        let result = GameSession::new(RoomId::from("T"), layout(15, &[(0, 0)]), &mut rng());
        assert!(matches!(result, Err(RoomError::InvalidMap(_))));
    }

    #[test]
    fn test_add_player_renames_collisions() {
        let mut s = GameSession::new(
            RoomId::from("T"),
            layout(20, &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]),
            &mut rng(),
        )
        .unwrap();
        assert_eq!(s.add_player(player(1, "Bob")).unwrap().name, "Bob");
        assert_eq!(s.add_player(player(2, "Bob")).unwrap().name, "Bob-2");
        assert_eq!(s.add_player(player(3, "Bob")).unwrap().name, "Bob-3");
        assert_eq!(s.add_player(player(4, "Bobby")).unwrap().name, "Bobby");
        s.remove_player(PlayerId(2)).unwrap();
        assert_eq!(s.add_player(player(5, "Bob")).unwrap().name, "Bob-4");
    }

    #[test]
    fn test_first_human_is_host() {
        let mut s = session(&[(0, 0), (5, 5)]);
        let bot = Player::virtual_player(
            PlayerId(PlayerId::VIRTUAL_BASE),
            &CharacterSheet::new("Bot", StatBonus::Life, DiceBonus::Attack),
            Profile::Aggressive,
        );
        s.add_player(bot).unwrap();
        assert_eq!(s.host(), None);
        s.add_player(player(1, "Ada")).unwrap();
        assert_eq!(s.host(), Some(PlayerId(1)));
    }

    #[test]
    fn test_room_locks_at_capacity_and_rejects_joins() {
        let mut s = session(&[(0, 0), (5, 5)]);
        s.add_player(player(1, "A")).unwrap();
        assert!(!s.is_locked());
        s.add_player(player(2, "B")).unwrap();
        assert!(s.is_locked());
        assert!(matches!(
            s.add_player(player(3, "C")),
            Err(RoomError::Locked(_))
        ));
        assert!(matches!(s.set_locked(false), Err(RoomError::RoomFull(_))));
    }

    #[test]
    fn test_remove_player_before_start_deletes_and_unlocks() {
        let mut s = session(&[(0, 0), (5, 5)]);
        s.add_player(player(1, "A")).unwrap();
        s.add_player(player(2, "B")).unwrap();
        let gone = s.remove_player(PlayerId(2)).unwrap();
        assert!(!gone.was_host);
        assert_eq!(s.players().len(), 1);
        assert!(!s.is_locked());
        assert!(s.remove_player(PlayerId(1)).unwrap().was_host);
        assert_eq!(s.host(), None);
    }

    #[test]
    fn test_is_startable_requires_two_active() {
        let mut s = session(&[(0, 0), (5, 5)]);
        s.add_player(player(1, "A")).unwrap();
        assert!(matches!(
            s.is_startable(),
            Err(RoomError::NotStartable {
                active: 1,
                required: 2
            })
        ));
        s.add_player(player(2, "B")).unwrap();
        assert!(s.is_startable().is_ok());
    }

    // -- start ------------------------------------------------------------

    #[test]
    fn test_scenario_turn_order_by_speed() {
        let s = started_duel();
        assert_eq!(s.players()[0].id, PlayerId(1));
        assert_eq!(s.players()[1].id, PlayerId(2));
        assert_eq!(s.current_id(), Some(PlayerId(1)));
    }

    #[test]
    fn test_turn_order_ties_are_a_fair_coin() {
        let mut first = 0;
        for seed in 0..2000 {
            let mut s = session(&[(0, 0), (5, 5)]);
            s.add_player(player(1, "A")).unwrap();
            s.add_player(player(2, "B")).unwrap();
            s.compute_turn_order(&mut StdRng::seed_from_u64(seed));
            if s.players()[0].id == PlayerId(1) {
                first += 1;
            }
        }
        assert!((850..=1150).contains(&first), "first = {first}");
    }

    #[test]
    fn test_assign_start_positions_distinct_with_ice_penalty() {
        let mut lay = layout(10, &[(0, 0), (1, 0)]);
        lay.grid.set(Position::new(0, 0), Tile::Ice).unwrap();
        let mut s = GameSession::new(RoomId::from("T"), lay, &mut rng()).unwrap();
        s.add_player(player(1, "A")).unwrap();
        s.add_player(player(2, "B")).unwrap();
        s.start(&GameRules::default(), &mut rng()).unwrap();

        let a = &s.players()[0];
        let b = &s.players()[1];
        assert_ne!(a.position, b.position);
        assert_eq!(a.position, a.spawn);
        let on_ice = if a.position == Position::new(0, 0) { a } else { b };
        assert!(on_ice.on_ice);
        assert_eq!(on_ice.stats.attack, 2);
    }

    #[test]
    fn test_start_discards_unused_start_tiles() {
        let starts: Vec<(usize, usize)> = (0..6).map(|i| (i, 0)).collect();
        let mut s = GameSession::new(RoomId::from("T"), layout(20, &starts), &mut rng()).unwrap();
        s.add_player(player(1, "A")).unwrap();
        s.add_player(player(2, "B")).unwrap();
        s.add_player(player(3, "C")).unwrap();
        s.start(&GameRules::default(), &mut rng()).unwrap();
        assert_eq!(s.start_tiles().len(), 3);
        assert!(s.is_locked());
    }

    #[test]
    fn test_advance_turn_cycles_and_skips_inactive() {
        let starts: Vec<(usize, usize)> = (0..6).map(|i| (i, 0)).collect();
        let mut s = GameSession::new(RoomId::from("T"), layout(20, &starts), &mut rng()).unwrap();
        for id in 1..=5 {
            s.add_player(player(id, "P")).unwrap();
        }
        s.start(&GameRules::default(), &mut rng()).unwrap();
        let dropped = s.players()[2].id;
        s.remove_player(dropped).unwrap();
        assert_eq!(s.players().len(), 5, "slot kept");

        let holder = s.current_id().unwrap();
        let active = s.active_count();
        let mut seen = Vec::new();
        for _ in 0..active {
            seen.push(s.advance_turn().unwrap());
        }
        assert_eq!(*seen.last().unwrap(), holder);
        assert!(!seen.contains(&dropped));
        assert_eq!(s.turn_count(), active as u32);
    }

    // -- movement ---------------------------------------------------------

    #[test]
    fn test_scenario_moving_three_floor_tiles() {
        let mut s = started_duel();
        let p1 = PlayerId(1);
        s.player_mut(p1).unwrap().stats.move_points = 5;
        let from = s.player(p1).unwrap().position;
        let dest = if from == Position::new(0, 0) {
            Position::new(3, 0)
        } else {
            Position::new(8, 5)
        };

        let movement = s.plan_move(p1, dest, 0.0, &mut rng()).unwrap();
        assert_eq!(movement.path.len(), 3);
        for cell in movement.path.clone() {
            s.step_player(p1, cell, 2).unwrap();
        }
        let p = s.player(p1).unwrap();
        assert_eq!(p.stats.move_points, 2);
        assert_eq!(p.position, movement.path[2]);
    }

    #[test]
    fn test_step_player_across_ice_applies_penalty_once() {
        let mut lay = layout(10, &[(0, 0), (9, 9)]);
        lay.grid.set(Position::new(1, 0), Tile::Ice).unwrap();
        lay.grid.set(Position::new(2, 0), Tile::Ice).unwrap();
        let mut s = GameSession::new(RoomId::from("T"), lay, &mut rng()).unwrap();
        s.add_player(player(1, "A")).unwrap();
        s.add_player(player(2, "B")).unwrap();
        s.start(&GameRules::default(), &mut rng()).unwrap();
        let id = s
            .players()
            .iter()
            .find(|p| p.position == Position::new(0, 0))
            .unwrap()
            .id;
        s.player_mut(id).unwrap().stats.move_points = 10;
        let (attack, defense) = {
            let p = s.player(id).unwrap();
            (p.stats.attack, p.stats.defense)
        };

        let walk = [
            (1, 0, true),
            (2, 0, true),
            (3, 0, false),
            (2, 0, true),
            (1, 0, true),
            (0, 0, false),
        ];
        for (x, y, icy) in walk {
            s.step_player(id, Position::new(x, y), 2).unwrap();
            let p = s.player(id).unwrap();
            let penalty = if icy { 2 } else { 0 };
            assert_eq!(p.on_ice, icy, "at ({x}, {y})");
            assert_eq!(p.stats.attack, attack - penalty, "at ({x}, {y})");
            assert_eq!(p.stats.defense, defense - penalty, "at ({x}, {y})");
        }
    }

    #[test]
    fn test_plan_move_stops_on_first_item() {
        let mut lay = layout(10, &[(0, 0), (9, 9)]);
        lay.items = vec![ItemPlacement {
            position: Position::new(2, 0),
            kind: ItemKind::Sword,
        }];
        let mut s = GameSession::new(RoomId::from("T"), lay, &mut rng()).unwrap();
        s.add_player(player(1, "A")).unwrap();
        s.add_player(player(2, "B")).unwrap();
        s.start(&GameRules::default(), &mut rng()).unwrap();
        let id = s
            .players()
            .iter()
            .find(|p| p.position == Position::new(0, 0))
            .unwrap()
            .id;
        s.player_mut(id).unwrap().stats.move_points = 6;

        let movement = s.plan_move(id, Position::new(4, 0), 0.0, &mut rng()).unwrap();
        assert_eq!(movement.path.last(), Some(&Position::new(2, 0)));
        assert_eq!(movement.cost, 2);
    }

    #[test]
    fn test_plan_move_out_of_budget_is_invalid() {
        let mut s = started_duel();
        s.player_mut(PlayerId(1)).unwrap().stats.move_points = 1;
        let from = s.player(PlayerId(1)).unwrap().position;
        let far = Position::new(9 - from.x, 9 - from.y);
        assert!(matches!(
            s.plan_move(PlayerId(1), far, 0.0, &mut rng()),
            Err(RoomError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_pick_up_swaps_oldest_when_full() {
        let mut s = started_duel();
        let id = PlayerId(1);
        let pos = s.player(id).unwrap().position;
        let effects = StandardItemEffects;
        s.player_mut(id).unwrap().inventory = vec![ItemKind::Boots, ItemKind::Armor];
        s.items.insert(pos, ItemKind::Sword);

        let pickup = s.pick_up(id, &effects, 2).unwrap().unwrap();
        assert_eq!(pickup.item, ItemKind::Sword);
        assert_eq!(pickup.dropped, Some(ItemKind::Boots));
        assert_eq!(
            s.player(id).unwrap().inventory,
            vec![ItemKind::Armor, ItemKind::Sword]
        );
        assert_eq!(s.items().get(&pos), Some(&ItemKind::Boots));
    }

    #[test]
    fn test_drop_inventory_spreads_over_free_cells() {
        let mut s = started_duel();
        let id = PlayerId(1);
        let effects = StandardItemEffects;
        effects.activate(s.player_mut(id).unwrap(), ItemKind::Sword);
        s.player_mut(id).unwrap().inventory = vec![ItemKind::Sword, ItemKind::Flag];

        let placed = s.drop_inventory(id, &effects).unwrap();
        assert_eq!(placed.len(), 2);
        assert_ne!(placed[0].position, placed[1].position);
        assert!(s.player(id).unwrap().inventory.is_empty());
        assert_eq!(s.player(id).unwrap().stats.attack, 4);
    }

    #[test]
    fn test_respawn_avoids_occupied_spawn() {
        let mut s = started_duel();
        let (a, b) = (PlayerId(1), PlayerId(2));
        let spawn_a = s.player(a).unwrap().spawn;
        s.player_mut(a).unwrap().position = Position::new(4, 4);
        s.player_mut(b).unwrap().position = spawn_a;

        let at = s.respawn(a, 2).unwrap();
        assert_ne!(at, spawn_a);
        assert_eq!(at.manhattan(spawn_a), 1);
    }

    // -- grid actions -----------------------------------------------------

    #[test]
    fn test_toggle_door_costs_an_action() {
        let mut s = started_duel();
        let id = PlayerId(1);
        s.player_mut(id).unwrap().position = Position::new(3, 3);
        s.player_mut(id).unwrap().stats.actions = 1;
        s.grid.set(Position::new(3, 4), Tile::Door { open: false }).unwrap();

        assert!(s.toggle_door(id, Position::new(3, 4)).unwrap());
        assert!(matches!(
            s.toggle_door(id, Position::new(3, 4)),
            Err(RoomError::Exhausted(_))
        ));
    }

    #[test]
    fn test_door_cannot_close_on_occupied_cell() {
        let mut s = started_duel();
        let (a, b) = (PlayerId(1), PlayerId(2));
        s.player_mut(a).unwrap().position = Position::new(3, 3);
        s.player_mut(a).unwrap().stats.actions = 1;
        s.player_mut(b).unwrap().position = Position::new(3, 4);
        s.grid.set(Position::new(3, 4), Tile::Door { open: true }).unwrap();

        assert!(matches!(
            s.toggle_door(a, Position::new(3, 4)),
            Err(RoomError::InvalidTransition(_))
        ));
        assert_eq!(s.player(a).unwrap().stats.actions, 1);
    }

    #[test]
    fn test_break_wall_turns_into_floor() {
        let mut s = started_duel();
        let id = PlayerId(1);
        s.player_mut(id).unwrap().position = Position::new(3, 3);
        s.player_mut(id).unwrap().stats.actions = 1;
        s.grid.set(Position::new(4, 3), Tile::Wall).unwrap();

        assert!(matches!(
            s.break_wall(id, Position::new(5, 5)),
            Err(RoomError::InvalidTransition(_))
        ));
        s.break_wall(id, Position::new(4, 3)).unwrap();
        assert_eq!(s.grid().tile(Position::new(4, 3)), Some(Tile::Floor));
    }

    // -- end of game ------------------------------------------------------

    #[test]
    fn test_winner_by_victories_and_by_survival() {
        let rules = GameRules::default();
        let mut s = started_duel();
        assert_eq!(s.winner(&rules), None);
        s.player_mut(PlayerId(2)).unwrap().record.victories = 3;
        assert_eq!(s.winner(&rules), Some(PlayerId(2)));

        let mut s = started_duel();
        s.remove_player(PlayerId(2)).unwrap();
        assert_eq!(s.winner(&rules), Some(PlayerId(1)));
    }

    #[test]
    fn test_winner_capture_the_flag() {
        let rules = GameRules::default();
        let mut s = started_duel();
        s.mode = GameMode::CaptureTheFlag;
        let id = PlayerId(2);
        s.player_mut(id).unwrap().inventory.push(ItemKind::Flag);
        s.player_mut(id).unwrap().position = Position::new(4, 4);
        assert_eq!(s.winner(&rules), None);
        let spawn = s.player(id).unwrap().spawn;
        s.player_mut(id).unwrap().position = spawn;
        assert_eq!(s.winner(&rules), Some(id));
    }
}
