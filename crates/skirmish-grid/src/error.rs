//! Error types for the grid layer.

use crate::Position;

/// Errors raised while building or editing a grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// A layout with no rows.
    #[error("grid has no rows")]
    Empty,

    /// Rows must all be as long as there are rows.
    #[error("row {row} has {len} tiles, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },

    /// A character that names no tile.
    #[error("unknown tile symbol {symbol:?} at row {row}, column {col}")]
    UnknownSymbol { symbol: char, row: usize, col: usize },

    /// A position outside the grid.
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),
}
