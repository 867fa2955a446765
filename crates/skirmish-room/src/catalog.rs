//! Map layouts and the read-only catalog they come from.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use skirmish_grid::{Grid, Position};

use crate::{GameMode, ItemPlacement, MapSize, RoomError};

/// A validated map as the editor publishes it.
///
/// The grid travels as text rows (`.` floor, `#` wall, `~` water,
/// `_` ice, `D`/`d` closed/open door):
///
/// ```json
/// { "id": "arena", "name": "Arena", "mode": "classic",
///   "grid": ["..........", "..~~......", ...],
///   "items": [{ "position": { "x": 4, "y": 4 }, "kind": "Sword" }],
///   "start_points": [{ "x": 0, "y": 0 }, { "x": 9, "y": 9 }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayout {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: GameMode,
    #[serde(with = "text_rows")]
    pub grid: Grid,
    #[serde(default)]
    pub items: Vec<ItemPlacement>,
    pub start_points: Vec<Position>,
}

impl MapLayout {
    /// Size tier of the layout's grid.
    pub fn size(&self) -> Result<MapSize, RoomError> {
        MapSize::from_side(self.grid.size()).ok_or_else(|| {
            RoomError::InvalidMap(format!(
                "{}: side {} is not a known tier",
                self.id,
                self.grid.size()
            ))
        })
    }
}

mod text_rows {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use skirmish_grid::{Grid, Tile};

    pub fn serialize<S: Serializer>(grid: &Grid, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<String> = Vec::<Vec<Tile>>::from(grid.clone())
            .into_iter()
            .map(|row| row.into_iter().map(Tile::symbol).collect())
            .collect();
        serializer.collect_seq(rows)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Grid, D::Error> {
        let rows = Vec::<String>::deserialize(deserializer)?;
        Grid::parse(&rows.join("\n")).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// MapCatalog
// ---------------------------------------------------------------------------

/// Read-only source of map layouts.
pub trait MapCatalog: Send + Sync + 'static {
    /// Fetches the layout with the given id.
    fn fetch(&self, map_id: &str) -> impl Future<Output = Result<MapLayout, RoomError>> + Send;
}

/// A catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    maps: HashMap<String, MapLayout>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a layout, keyed by its id.
    pub fn insert(&mut self, layout: MapLayout) {
        self.maps.insert(layout.id.clone(), layout);
    }

    pub fn with(mut self, layout: MapLayout) -> Self {
        self.insert(layout);
        self
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Loads every `*.json` file of `dir` as a [`MapLayout`].
    pub fn from_json_dir(dir: impl AsRef<Path>) -> Result<Self, RoomError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| RoomError::InvalidMap(format!("{}: {e}", dir.display())))?;
        let mut catalog = Self::new();
        for entry in entries {
            let path = entry
                .map_err(|e| RoomError::InvalidMap(format!("{}: {e}", dir.display())))?
                .path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|e| RoomError::InvalidMap(format!("{}: {e}", path.display())))?;
            let layout: MapLayout = serde_json::from_str(&text)
                .map_err(|e| RoomError::InvalidMap(format!("{}: {e}", path.display())))?;
            tracing::debug!(map_id = %layout.id, path = %path.display(), "map loaded");
            catalog.insert(layout);
        }
        Ok(catalog)
    }
}

impl MapCatalog for InMemoryCatalog {
    async fn fetch(&self, map_id: &str) -> Result<MapLayout, RoomError> {
        self.maps
            .get(map_id)
            .cloned()
            .ok_or_else(|| RoomError::MapNotFound(map_id.to_string()))
    }
}
