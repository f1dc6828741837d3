use crate::grid::{Coordinate, Direction};
use std::time::SystemTime;
use uuid::Uuid;

/// One laser cell of travel per this many milliseconds.
pub const LASER_CELL_INTERVAL_MS: u128 = 21;

/// A connected avatar. The only movable entity on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub icon: char,
    pub position: Coordinate,
}

/// A projectile. Owned by id, never by reference, so the owner can disconnect
/// while the laser is still in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Laser {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub direction: Direction,
    pub initial_position: Coordinate,
    pub start_time: SystemTime,
}

impl Laser {
    /// Cells travelled since firing, floored.
    pub fn cells_travelled(&self, now: SystemTime) -> i32 {
        let elapsed = now.duration_since(self.start_time).unwrap_or_default();
        (elapsed.as_millis() / LASER_CELL_INTERVAL_MS) as i32
    }

    /// A laser's position is a pure function of elapsed time and direction.
    pub fn position_at(&self, now: SystemTime) -> Coordinate {
        self.initial_position
            .offset(self.direction, self.cells_travelled(now))
    }
}

/// Everything that lives in the entity map.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Player(Player),
    Laser(Laser),
}

impl Entity {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Player(player) => player.id,
            Entity::Laser(laser) => laser.id,
        }
    }

    pub fn position_at(&self, now: SystemTime) -> Coordinate {
        match self {
            Entity::Player(player) => player.position,
            Entity::Laser(laser) => laser.position_at(now),
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_laser(&self) -> Option<&Laser> {
        match self {
            Entity::Laser(laser) => Some(laser),
            _ => None,
        }
    }
}
