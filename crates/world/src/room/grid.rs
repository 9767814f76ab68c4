use serde::{Deserialize, Serialize};

pub const TILE_SIZE_PX: f32 = 16.0;
pub const DEFAULT_SPAWN_TILE: GridPos = GridPos { x: 1, y: 1 };

/// Cell coordinates. `y` grows downward, so `Up` is `y - 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn center_px(self) -> PixelPos {
        PixelPos {
            x: self.x as f32 * TILE_SIZE_PX + TILE_SIZE_PX / 2.0,
            y: self.y as f32 * TILE_SIZE_PX + TILE_SIZE_PX / 2.0,
        }
    }

    pub fn from_px(position: PixelPos) -> Self {
        Self {
            x: (position.x / TILE_SIZE_PX).floor() as i32,
            y: (position.y / TILE_SIZE_PX).floor() as i32,
        }
    }

    /// Orthogonal neighbour: one step on exactly one axis.
    pub fn is_adjacent_to(self, other: GridPos) -> bool {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).abs();
        (dx == 1 && dy == 0) || (dx == 0 && dy == 1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f32,
    pub y: f32,
}

impl PixelPos {
    pub fn lerp(self, to: PixelPos, t: f32) -> PixelPos {
        let t = t.clamp(0.0, 1.0);
        PixelPos {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }

    pub fn offset_y(self, dy: f32) -> PixelPos {
        PixelPos {
            x: self.x,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "left" | "l" | "west" | "w" => Some(Self::Left),
            "right" | "r" | "east" | "e" => Some(Self::Right),
            "up" | "u" | "north" | "n" => Some(Self::Up),
            "down" | "d" | "south" | "s" => Some(Self::Down),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_one_cell_per_direction() {
        let origin = GridPos::new(3, 3);
        assert_eq!(origin.step(Direction::Left), GridPos::new(2, 3));
        assert_eq!(origin.step(Direction::Right), GridPos::new(4, 3));
        assert_eq!(origin.step(Direction::Up), GridPos::new(3, 2));
        assert_eq!(origin.step(Direction::Down), GridPos::new(3, 4));
    }

    #[test]
    fn adjacency_is_orthogonal_and_symmetric() {
        let player = GridPos::new(4, 3);
        for direction in Direction::ALL {
            let neighbour = player.step(direction);
            assert!(player.is_adjacent_to(neighbour));
            assert!(neighbour.is_adjacent_to(player));
        }
        assert!(!player.is_adjacent_to(player));
        assert!(!player.is_adjacent_to(GridPos::new(5, 4)));
        assert!(!player.is_adjacent_to(GridPos::new(3, 2)));
        assert!(!player.is_adjacent_to(GridPos::new(6, 3)));
    }

    #[test]
    fn pixel_center_round_trips_through_from_px() {
        let cell = GridPos::new(7, 2);
        assert_eq!(cell.center_px(), PixelPos { x: 120.0, y: 40.0 });
        assert_eq!(GridPos::from_px(cell.center_px()), cell);
        assert_eq!(GridPos::from_px(PixelPos { x: -1.0, y: 0.0 }), GridPos::new(-1, 0));
    }

    #[test]
    fn lerp_clamps_progress() {
        let from = PixelPos { x: 0.0, y: 0.0 };
        let to = PixelPos { x: 16.0, y: -16.0 };
        assert_eq!(from.lerp(to, 0.5), PixelPos { x: 8.0, y: -8.0 });
        assert_eq!(from.lerp(to, 3.0), to);
    }

    #[test]
    fn direction_parse_accepts_aliases() {
        assert_eq!(Direction::parse("LEFT"), Some(Direction::Left));
        assert_eq!(Direction::parse("s"), Some(Direction::Down));
        assert_eq!(Direction::parse("sideways"), None);
    }
}
