//! Property-style checks for the reachability search and the stumble rule.
//!
//! Grids are generated from fixed seeds so failures are reproducible.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skirmish_grid::{Grid, Position, Route, Tile, apply_stumble, plan_move, reachable};

// =========================================================================
// Helpers
// =========================================================================

fn random_grid(rng: &mut StdRng, size: usize) -> Grid {
    let rows = (0..size)
        .map(|_| {
            (0..size)
                .map(|_| match rng.random_range(0..10) {
                    0 | 1 => Tile::Wall,
                    2 => Tile::Water,
                    3 => Tile::Ice,
                    4 => Tile::Door {
                        open: rng.random_bool(0.5),
                    },
                    _ => Tile::Floor,
                })
                .collect()
        })
        .collect();
    Grid::from_rows(rows).unwrap()
}

/// Minimal entry costs by repeated relaxation until nothing improves.
/// Slow, but obviously correct.
fn brute_force_costs(
    grid: &Grid,
    blocked: &HashSet<Position>,
    start: Position,
) -> HashMap<Position, u32> {
    let mut best = HashMap::from([(start, 0u32)]);
    loop {
        let mut changed = false;
        for cell in grid.positions() {
            let Some(&here) = best.get(&cell) else {
                continue;
            };
            for next in grid.neighbors(cell) {
                if blocked.contains(&next) {
                    continue;
                }
                let Some(weight) = grid.weight(next) else {
                    continue;
                };
                let candidate = here + weight;
                if candidate < best.get(&next).copied().unwrap_or(u32::MAX) {
                    best.insert(next, candidate);
                    changed = true;
                }
            }
        }
        if !changed {
            return best;
        }
    }
}

fn assert_route_is_walkable(grid: &Grid, blocked: &HashSet<Position>, start: Position, route: &Route) {
    let mut cursor = start;
    let mut cost = 0;
    for &cell in &route.path {
        assert!(cursor.is_adjacent(cell), "path jumps from {cursor} to {cell}");
        assert!(!blocked.contains(&cell), "path enters blocked {cell}");
        cost += grid.weight(cell).expect("path enters impassable tile");
        cursor = cell;
    }
    assert_eq!(cost, route.cost, "reported cost must equal summed weights");
}

// =========================================================================
// Reachable set
// =========================================================================

#[test]
fn test_reachable_routes_fit_budget_and_nothing_is_omitted() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..150 {
        let size = rng.random_range(3..=8);
        let grid = random_grid(&mut rng, size);
        let start = Position::new(rng.random_range(0..size), rng.random_range(0..size));
        let blocked: HashSet<Position> = (0..2)
            .map(|_| Position::new(rng.random_range(0..size), rng.random_range(0..size)))
            .filter(|p| *p != start)
            .collect();
        let budget = rng.random_range(0..=7);

        let moves = reachable(&grid, &blocked, start, budget);
        let truth = brute_force_costs(&grid, &blocked, start);

        for (dest, route) in &moves {
            assert!(route.cost <= budget);
            assert_eq!(route.destination(), Some(*dest));
            assert_route_is_walkable(&grid, &blocked, start, route);
            assert_eq!(route.cost, truth[dest], "route to {dest} is not minimal");
        }

        for (cell, cost) in &truth {
            if *cell != start && *cost <= budget {
                assert!(moves.contains_key(cell), "{cell} (cost {cost}) omitted");
            }
        }
    }
}

#[test]
fn test_scenario_three_floor_tiles_cost_three() {
    let grid = Grid::filled(10, Tile::Floor);
    let start = Position::new(0, 0);
    let dest = Position::new(3, 0);
    let mut rng = StdRng::seed_from_u64(1);

    let movement = plan_move(&grid, &HashSet::new(), start, dest, 5, 0.1, &mut rng).unwrap();

    assert_eq!(movement.cost, 3);
    assert_eq!(movement.path.len(), 3);
    assert_eq!(movement.path.last(), Some(&dest));
    assert!(!movement.fell);
}

#[test]
fn test_plan_move_beyond_budget_is_none() {
    let grid = Grid::filled(10, Tile::Floor);
    let mut rng = StdRng::seed_from_u64(1);
    let result = plan_move(
        &grid,
        &HashSet::new(),
        Position::new(0, 0),
        Position::new(9, 9),
        5,
        0.1,
        &mut rng,
    );
    assert!(result.is_none());
}

// =========================================================================
// Stumble
// =========================================================================

#[test]
fn test_falls_only_on_ice_at_documented_rate() {
    let grid = Grid::parse(
        "
        ._..
        ....
        ....
        ....
        ",
    )
    .unwrap();
    let route = Route {
        path: vec![Position::new(1, 0), Position::new(2, 0), Position::new(3, 0)],
        cost: 2,
    };
    let mut rng = StdRng::seed_from_u64(0xfa11);
    let trials = 20_000;
    let mut falls = 0;

    for _ in 0..trials {
        let movement = apply_stumble(&grid, &route, 0.1, &mut rng);
        if movement.fell {
            falls += 1;
            let last = *movement.path.last().unwrap();
            assert_eq!(grid.tile(last), Some(Tile::Ice), "fell on non-ice {last}");
            assert_eq!(movement.path.len(), 1);
        } else {
            assert_eq!(movement.path, route.path);
        }
    }

    let rate = falls as f64 / trials as f64;
    assert!((0.09..=0.11).contains(&rate), "fall rate {rate} far from 0.1");
}
