// Shared simulation core for the arena: world state, the action pipeline,
// the collision/round engine and the wire message types. The server runs it
// in authoritative mode; clients run the same code as a replica.

pub mod action;
pub mod collision;
pub mod entity;
pub mod grid;
pub mod map;
pub mod round;
pub mod runtime;
pub mod time;
pub mod wire;
pub mod world;

pub use action::Action;
pub use entity::{Entity, Laser, Player};
pub use grid::{Coordinate, Direction};
pub use map::ArenaMap;
pub use runtime::WorldHandle;
pub use world::{Change, World};
