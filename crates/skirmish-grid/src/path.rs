//! Weighted shortest-path search over the tile grid.
//!
//! Dijkstra with a binary heap: the frontier is popped in non-decreasing
//! cost order and a cell's predecessor is replaced only on a strictly
//! cheaper route. Ice weighs 0, which Dijkstra handles as long as no
//! weight is negative.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Grid, Position};

/// A path from (but excluding) a start cell, with its summed weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<Position>,
    pub cost: u32,
}

impl Route {
    /// Final cell of the path, if the path is not empty.
    pub fn destination(&self) -> Option<Position> {
        self.path.last().copied()
    }
}

/// A route after the stumble rule has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub path: Vec<Position>,
    pub cost: u32,
    /// The mover slipped on ice and stopped early.
    pub fell: bool,
}

/// Cheapest known cost and predecessor for each settled cell.
struct Search {
    start: Position,
    dist: HashMap<Position, u32>,
    prev: HashMap<Position, Position>,
}

impl Search {
    fn run(
        grid: &Grid,
        blocked: &HashSet<Position>,
        start: Position,
        budget: u32,
        goal: Option<Position>,
    ) -> Self {
        let mut dist = HashMap::new();
        let mut prev = HashMap::new();
        let mut frontier = BinaryHeap::new();

        if grid.contains(start) {
            dist.insert(start, 0);
            frontier.push(Reverse((0u32, start)));
        }

        while let Some(Reverse((cost, pos))) = frontier.pop() {
            if dist.get(&pos).is_some_and(|best| cost > *best) {
                continue;
            }
            if goal == Some(pos) {
                break;
            }
            for next in grid.neighbors(pos) {
                if blocked.contains(&next) {
                    continue;
                }
                let Some(weight) = grid.weight(next) else {
                    continue;
                };
                let candidate = cost.saturating_add(weight);
                if candidate > budget {
                    continue;
                }
                if candidate < dist.get(&next).copied().unwrap_or(u32::MAX) {
                    dist.insert(next, candidate);
                    prev.insert(next, pos);
                    frontier.push(Reverse((candidate, next)));
                }
            }
        }

        trace!(%start, settled = dist.len(), budget, "grid search finished");
        Self { start, dist, prev }
    }

    fn route_to(&self, dest: Position) -> Option<Route> {
        if dest == self.start {
            return None;
        }
        let cost = *self.dist.get(&dest)?;
        let mut path = vec![dest];
        let mut cursor = dest;
        while let Some(&step) = self.prev.get(&cursor) {
            if step == self.start {
                break;
            }
            path.push(step);
            cursor = step;
        }
        path.reverse();
        Some(Route { path, cost })
    }
}

/// Every cell reachable from `start` within `budget` move points, keyed
/// by destination, each with its minimal-weight path.
///
/// The start cell itself is not included. Cells in `blocked` (other
/// pawns) are never entered.
pub fn reachable(
    grid: &Grid,
    blocked: &HashSet<Position>,
    start: Position,
    budget: u32,
) -> BTreeMap<Position, Route> {
    let search = Search::run(grid, blocked, start, budget, None);
    search
        .dist
        .keys()
        .filter_map(|&dest| search.route_to(dest).map(|route| (dest, route)))
        .collect()
}

/// Cheapest path from `start` to `goal` ignoring any budget.
pub fn shortest_path(
    grid: &Grid,
    blocked: &HashSet<Position>,
    start: Position,
    goal: Position,
) -> Option<Route> {
    Search::run(grid, blocked, start, u32::MAX, Some(goal)).route_to(goal)
}

/// Longest prefix of `route` whose cost fits in `budget`.
pub fn truncate_to_budget(grid: &Grid, route: &Route, budget: u32) -> Route {
    let mut cost: u32 = 0;
    let mut path = Vec::new();
    for &cell in &route.path {
        let weight = grid.weight(cell).unwrap_or(u32::MAX);
        match cost.checked_add(weight) {
            Some(next) if next <= budget => {
                cost = next;
                path.push(cell);
            }
            _ => break,
        }
    }
    Route { path, cost }
}

/// Walks `route` cell by cell; on entering a weight-0 (ice) cell one
/// sample is drawn and, with `fall_probability`, the path stops there.
pub fn apply_stumble<R: Rng>(
    grid: &Grid,
    route: &Route,
    fall_probability: f64,
    rng: &mut R,
) -> Movement {
    let mut path = Vec::with_capacity(route.path.len());
    let mut cost = 0;
    for &cell in &route.path {
        let weight = grid.weight(cell).unwrap_or(0);
        cost += weight;
        path.push(cell);
        if weight == 0 && rng.random::<f64>() < fall_probability {
            return Movement {
                path,
                cost,
                fell: true,
            };
        }
    }
    Movement {
        path,
        cost,
        fell: false,
    }
}

/// Cheapest path to `dest` within `budget`, with the stumble rule applied.
///
/// Returns `None` when `dest` is unreachable within the budget.
pub fn plan_move<R: Rng>(
    grid: &Grid,
    blocked: &HashSet<Position>,
    start: Position,
    dest: Position,
    budget: u32,
    fall_probability: f64,
    rng: &mut R,
) -> Option<Movement> {
    let route = Search::run(grid, blocked, start, budget, Some(dest)).route_to(dest)?;
    Some(apply_stumble(grid, &route, fall_probability, rng))
}

/// The reachable cells, the start, and every in-bounds cell one step
/// beyond them.
pub fn visibility_halo(
    grid: &Grid,
    start: Position,
    reachable: &BTreeMap<Position, Route>,
) -> BTreeSet<Position> {
    let mut halo: BTreeSet<Position> = reachable.keys().copied().collect();
    halo.insert(start);
    let core: Vec<Position> = halo.iter().copied().collect();
    for cell in core {
        halo.extend(grid.neighbors(cell));
    }
    halo
}

/// Breadth-first search outward from `from` (through any tile) for the
/// closest cell satisfying `accept`, `from` included.
pub fn nearest_cell(
    grid: &Grid,
    from: Position,
    accept: impl Fn(Position) -> bool,
) -> Option<Position> {
    if !grid.contains(from) {
        return None;
    }
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(cell) = queue.pop_front() {
        if accept(cell) {
            return Some(cell);
        }
        for next in grid.neighbors(cell) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    None
}
