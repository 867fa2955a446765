//! Grid, tile, and position types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GridError;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate. `x` is the column, `y` the row, both from the
/// top-left corner.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns `true` if `other` shares an edge with this cell.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// The terrain category of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Floor,
    Wall,
    Water,
    Ice,
    Door { open: bool },
}

impl Tile {
    /// Movement cost of entering this tile, or `None` if it cannot be
    /// entered.
    pub fn weight(self) -> Option<u32> {
        match self {
            Self::Floor | Self::Door { open: true } => Some(1),
            Self::Water => Some(2),
            Self::Ice => Some(0),
            Self::Wall | Self::Door { open: false } => None,
        }
    }

    pub fn is_traversable(self) -> bool {
        self.weight().is_some()
    }

    pub fn is_ice(self) -> bool {
        matches!(self, Self::Ice)
    }

    /// The tile written as `c` in a text layout.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Floor),
            '#' => Some(Self::Wall),
            '~' => Some(Self::Water),
            '_' => Some(Self::Ice),
            'D' => Some(Self::Door { open: false }),
            'd' => Some(Self::Door { open: true }),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Floor => '.',
            Self::Wall => '#',
            Self::Water => '~',
            Self::Ice => '_',
            Self::Door { open: false } => 'D',
            Self::Door { open: true } => 'd',
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A square tile grid stored row-major.
///
/// On the wire a grid is its list of rows; deserialization goes through
/// [`Grid::from_rows`] so a ragged layout never becomes a `Grid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Tile>>", into = "Vec<Vec<Tile>>")]
pub struct Grid {
    size: usize,
    tiles: Vec<Tile>,
}

impl Grid {
    /// A `size × size` grid filled with `fill`.
    pub fn filled(size: usize, fill: Tile) -> Self {
        Self {
            size,
            tiles: vec![fill; size * size],
        }
    }

    /// Builds a grid from rows, rejecting empty or non-square input.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, GridError> {
        let size = rows.len();
        if size == 0 {
            return Err(GridError::Empty);
        }
        let mut tiles = Vec::with_capacity(size * size);
        for (row, cells) in rows.into_iter().enumerate() {
            if cells.len() != size {
                return Err(GridError::NotSquare {
                    row,
                    len: cells.len(),
                    expected: size,
                });
            }
            tiles.extend(cells);
        }
        Ok(Self { size, tiles })
    }

    /// Parses the compact text form used by tests and fixtures:
    /// `.` floor, `#` wall, `~` water, `_` ice, `D` closed door,
    /// `d` open door. Whitespace-only lines are skipped; any other
    /// symbol is an error.
    pub fn parse(text: &str) -> Result<Self, GridError> {
        let rows = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(row, line)| {
                line.chars()
                    .enumerate()
                    .map(|(col, c)| {
                        Tile::from_symbol(c).ok_or(GridError::UnknownSymbol { symbol: c, row, col })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rows(rows)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.size && pos.y < self.size
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        self.contains(pos).then(|| self.tiles[pos.y * self.size + pos.x])
    }

    /// Replaces the tile at `pos`.
    pub fn set(&mut self, pos: Position, tile: Tile) -> Result<(), GridError> {
        if !self.contains(pos) {
            return Err(GridError::OutOfBounds(pos));
        }
        self.tiles[pos.y * self.size + pos.x] = tile;
        Ok(())
    }

    /// Weight of entering `pos`; `None` when out of bounds or blocked.
    pub fn weight(&self, pos: Position) -> Option<u32> {
        self.tile(pos).and_then(Tile::weight)
    }

    /// The in-bounds 4-connected neighbours of `pos`.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        let Position { x, y } = pos;
        [
            y.checked_sub(1).map(|y| Position::new(x, y)),
            Some(Position::new(x + 1, y)),
            Some(Position::new(x, y + 1)),
            x.checked_sub(1).map(|x| Position::new(x, y)),
        ]
        .into_iter()
        .flatten()
        .filter(move |p| self.contains(*p))
    }

    /// Iterates every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.size).flat_map(move |y| (0..self.size).map(move |x| Position::new(x, y)))
    }
}

impl TryFrom<Vec<Vec<Tile>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<Tile>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<Tile>> {
    fn from(grid: Grid) -> Self {
        grid.tiles.chunks(grid.size).map(<[Tile]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_weights() {
        assert_eq!(Tile::Floor.weight(), Some(1));
        assert_eq!(Tile::Water.weight(), Some(2));
        assert_eq!(Tile::Ice.weight(), Some(0));
        assert_eq!(Tile::Door { open: true }.weight(), Some(1));
        assert_eq!(Tile::Door { open: false }.weight(), None);
        assert_eq!(Tile::Wall.weight(), None);
    }

    #[test]
    fn test_from_rows_rejects_ragged_layout() {
        let rows = vec![vec![Tile::Floor; 2], vec![Tile::Floor; 3]];
        assert!(matches!(
            Grid::from_rows(rows),
            Err(GridError::NotSquare { row: 1, len: 3, expected: 2 })
        ));
        assert!(matches!(Grid::from_rows(vec![]), Err(GridError::Empty)));
    }

    #[test]
    fn test_parse_reads_every_symbol() {
        let grid = Grid::parse(
            "
            .#~
            _Dd
            ...
            ",
        )
        .unwrap();
        assert_eq!(grid.size(), 3);
        assert_eq!(grid.tile(Position::new(1, 0)), Some(Tile::Wall));
        assert_eq!(grid.tile(Position::new(2, 0)), Some(Tile::Water));
        assert_eq!(grid.tile(Position::new(0, 1)), Some(Tile::Ice));
        assert_eq!(grid.tile(Position::new(1, 1)), Some(Tile::Door { open: false }));
        assert_eq!(grid.tile(Position::new(2, 1)), Some(Tile::Door { open: true }));
        assert_eq!(grid.tile(Position::new(3, 0)), None);
    }

    #[test]
    fn test_parse_rejects_unknown_symbol() {
        assert!(matches!(
            Grid::parse("..\n.X"),
            Err(GridError::UnknownSymbol { symbol: 'X', row: 1, col: 1 })
        ));
    }

    #[test]
    fn test_symbols_match_parse() {
        let grid = Grid::parse(".#~\n_Dd\n...").unwrap();
        let text: String = grid.positions().filter_map(|p| grid.tile(p)).map(Tile::symbol).collect();
        assert_eq!(text, ".#~_Dd...");
    }

    #[test]
    fn test_neighbors_stay_in_bounds() {
        let grid = Grid::filled(3, Tile::Floor);
        let corner: Vec<_> = grid.neighbors(Position::new(0, 0)).collect();
        assert_eq!(corner, vec![Position::new(1, 0), Position::new(0, 1)]);
        assert_eq!(grid.neighbors(Position::new(1, 1)).count(), 4);
        assert_eq!(grid.neighbors(Position::new(2, 2)).count(), 2);
    }

    #[test]
    fn test_set_out_of_bounds_is_rejected() {
        let mut grid = Grid::filled(2, Tile::Floor);
        assert!(grid.set(Position::new(1, 1), Tile::Wall).is_ok());
        assert!(matches!(
            grid.set(Position::new(2, 0), Tile::Wall),
            Err(GridError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_grid_serializes_as_rows() {
        let grid = Grid::parse("._\n#d").unwrap();
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(
            json,
            serde_json::json!([["floor", "ice"], ["wall", { "door": { "open": true } }]])
        );
        let back: Grid = serde_json::from_value(json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn test_position_adjacency() {
        let p = Position::new(2, 2);
        assert!(p.is_adjacent(Position::new(2, 3)));
        assert!(!p.is_adjacent(Position::new(3, 3)));
        assert!(!p.is_adjacent(p));
    }
}
