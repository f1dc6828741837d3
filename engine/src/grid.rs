use serde::{Deserialize, Serialize};

/// A cell on the arena grid. The map's geometric centre is (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// One cell in the given direction. `Stop` is the identity.
    pub fn step(self, direction: Direction) -> Self {
        self.offset(direction, 1)
    }

    pub fn offset(self, direction: Direction, cells: i32) -> Self {
        match direction {
            Direction::Up => Self::new(self.x, self.y - cells),
            Direction::Down => Self::new(self.x, self.y + cells),
            Direction::Left => Self::new(self.x - cells, self.y),
            Direction::Right => Self::new(self.x + cells, self.y),
            Direction::Stop => self,
        }
    }

    /// Manhattan distance between two cells.
    pub fn distance(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Stop,
}
