use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::grid::GridPos;
use crate::state::{EntityKind, Properties};

pub const DEFAULT_ROOM_ID: &str = "room1";
const WALL_VALUE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Floor,
    Wall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellProbe {
    Floor,
    Wall,
    OutOfBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("wall grid has no cells")]
    EmptyWallGrid,
    #[error("wall grid row {row} has {actual} cells, expected {expected}")]
    RaggedWallGrid {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Rectangular wall/floor grid, row-major with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallGrid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl WallGrid {
    /// Builds a grid from raw rows where `1` marks a wall.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, LayoutError> {
        let expected = rows.first().map(Vec::len).unwrap_or(0);
        if expected == 0 {
            return Err(LayoutError::EmptyWallGrid);
        }

        let mut cells = Vec::with_capacity(expected * rows.len());
        for (row, values) in rows.iter().enumerate() {
            if values.len() != expected {
                return Err(LayoutError::RaggedWallGrid {
                    row,
                    expected,
                    actual: values.len(),
                });
            }
            cells.extend(values.iter().map(|value| {
                if *value == WALL_VALUE {
                    Cell::Wall
                } else {
                    Cell::Floor
                }
            }));
        }

        Ok(Self {
            width: expected as u32,
            height: rows.len() as u32,
            cells,
        })
    }

    /// Floor everywhere except the outer ring.
    pub fn bordered(width: u32, height: u32) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let border = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
                cells.push(if border { Cell::Wall } else { Cell::Floor });
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_wall(&mut self, pos: GridPos) {
        if let Some(index) = self.index_of(pos) {
            self.cells[index] = Cell::Wall;
        }
    }

    pub fn probe(&self, pos: GridPos) -> CellProbe {
        match self.index_of(pos).and_then(|index| self.cells.get(index)) {
            Some(Cell::Floor) => CellProbe::Floor,
            Some(Cell::Wall) => CellProbe::Wall,
            None => CellProbe::OutOfBounds,
        }
    }

    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.probe(pos) == CellProbe::Floor
    }

    fn index_of(&self, pos: GridPos) -> Option<usize> {
        let x = u32::try_from(pos.x).ok()?;
        let y = u32::try_from(pos.y).ok()?;
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// One entity placement from a room's static layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub properties: Properties,
}

impl LayoutEntity {
    pub fn new(id: impl Into<String>, kind: EntityKind, x: i32, y: i32) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn grid(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

/// On-disk room description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomLayoutSource {
    #[serde(rename = "wallData", default)]
    pub wall_data: Option<Vec<Vec<u8>>>,
    #[serde(default)]
    pub entities: Vec<LayoutEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomLayout {
    pub room_id: String,
    /// `None` when the layout carried no usable wall grid; collision then
    /// treats every cell as walkable.
    pub walls: Option<WallGrid>,
    pub entities: Vec<LayoutEntity>,
}

impl RoomLayout {
    pub fn new(room_id: impl Into<String>, walls: Option<WallGrid>, entities: Vec<LayoutEntity>) -> Self {
        Self {
            room_id: room_id.into(),
            walls,
            entities,
        }
    }

    pub fn from_source(room_id: impl Into<String>, source: RoomLayoutSource) -> Self {
        let room_id = room_id.into();
        let walls = match source.wall_data.as_deref().map(WallGrid::from_rows) {
            Some(Ok(grid)) => Some(grid),
            Some(Err(error)) => {
                warn!(room = %room_id, error = %error, "wall_grid_unusable");
                None
            }
            None => {
                warn!(room = %room_id, "wall_grid_missing");
                None
            }
        };
        Self {
            room_id,
            walls,
            entities: source.entities,
        }
    }
}

/// Read-only lookup of static room definitions. Implementations must be
/// idempotent and free of side effects.
pub trait RoomLayoutProvider {
    fn layout(&self, room_id: &str) -> Option<&RoomLayout>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRoomLayouts {
    layouts: HashMap<String, RoomLayout>,
}

impl InMemoryRoomLayouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layout: RoomLayout) -> Option<RoomLayout> {
        self.layouts.insert(layout.room_id.clone(), layout)
    }

    pub fn with_layout(mut self, layout: RoomLayout) -> Self {
        self.insert(layout);
        self
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn room_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.layouts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl RoomLayoutProvider for InMemoryRoomLayouts {
    fn layout(&self, room_id: &str) -> Option<&RoomLayout> {
        self.layouts.get(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_marks_ones_as_walls() {
        let grid = WallGrid::from_rows(&[vec![1, 1, 1], vec![1, 0, 2], vec![1, 1, 1]])
            .expect("grid");
        assert_eq!((grid.width(), grid.height()), (3, 3));
        assert_eq!(grid.probe(GridPos::new(0, 0)), CellProbe::Wall);
        assert_eq!(grid.probe(GridPos::new(1, 1)), CellProbe::Floor);
        assert_eq!(grid.probe(GridPos::new(2, 1)), CellProbe::Floor);
        assert_eq!(grid.probe(GridPos::new(3, 1)), CellProbe::OutOfBounds);
        assert_eq!(grid.probe(GridPos::new(-1, 1)), CellProbe::OutOfBounds);
    }

    #[test]
    fn from_rows_rejects_ragged_and_empty_grids() {
        assert_eq!(
            WallGrid::from_rows(&[vec![1, 1], vec![1]]),
            Err(LayoutError::RaggedWallGrid {
                row: 1,
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(WallGrid::from_rows(&[]), Err(LayoutError::EmptyWallGrid));
    }

    #[test]
    fn bordered_grid_has_walls_on_the_ring_only() {
        let mut grid = WallGrid::bordered(15, 10);
        assert!(!grid.is_walkable(GridPos::new(0, 5)));
        assert!(!grid.is_walkable(GridPos::new(14, 9)));
        assert!(grid.is_walkable(GridPos::new(1, 1)));
        assert!(grid.is_walkable(GridPos::new(13, 8)));

        grid.set_wall(GridPos::new(4, 4));
        assert!(!grid.is_walkable(GridPos::new(4, 4)));
    }

    #[test]
    fn layout_source_parses_room_file_format() {
        let raw = r#"{
            "wallData": [[1,1,1,1],[1,0,0,1],[1,1,1,1]],
            "entities": [
                { "id": "door1", "type": "door", "x": 2, "y": 1,
                  "properties": { "targetRoomId": "room2", "targetX": 1, "targetY": 1 } },
                { "id": "chest1", "type": "chest", "x": 1, "y": 1 }
            ]
        }"#;
        let source: RoomLayoutSource = serde_json::from_str(raw).expect("parse");
        let layout = RoomLayout::from_source("room1", source);

        assert!(layout.walls.is_some());
        assert_eq!(layout.entities.len(), 2);
        assert_eq!(layout.entities[0].kind, EntityKind::Door);
        assert_eq!(
            layout.entities[0].properties.get("targetRoomId"),
            Some(&serde_json::json!("room2"))
        );
        assert_eq!(layout.entities[1].kind, EntityKind::Unknown);
        assert!(layout.entities[1].properties.is_empty());
    }

    #[test]
    fn ragged_source_grid_falls_back_to_no_walls() {
        let source = RoomLayoutSource {
            wall_data: Some(vec![vec![1, 1, 1], vec![1, 0]]),
            entities: Vec::new(),
        };
        let layout = RoomLayout::from_source("broken", source);
        assert!(layout.walls.is_none());
    }

    #[test]
    fn in_memory_provider_is_keyed_by_room_id() {
        let layouts = InMemoryRoomLayouts::new()
            .with_layout(RoomLayout::new("room2", None, Vec::new()))
            .with_layout(RoomLayout::new("room1", Some(WallGrid::bordered(4, 4)), Vec::new()));

        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts.room_ids(), ["room1", "room2"]);
        assert!(layouts.layout("room1").is_some());
        assert!(layouts.layout("room9").is_none());
    }
}
