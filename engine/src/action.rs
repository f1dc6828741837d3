use crate::entity::{Entity, Laser};
use crate::grid::Direction;
use crate::world::{Change, World};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Minimum interval between accepted moves per player.
pub const MOVE_THROTTLE: Duration = Duration::from_millis(100);

/// Minimum interval between accepted shots per player.
pub const FIRE_THROTTLE: Duration = Duration::from_millis(500);

/// An inward-facing intent submitted by a client or bot. `created_at` is
/// stamped when the action is dispatched into the pipeline; client-reported
/// clocks never enter throttling.
#[derive(Debug, Clone)]
pub enum Action {
    Move {
        id: Uuid,
        direction: Direction,
        created_at: SystemTime,
    },
    Fire {
        owner_id: Uuid,
        laser_id: Uuid,
        direction: Direction,
        created_at: SystemTime,
    },
}

impl Action {
    /// Applies the action against world state. Callers hold the write lock.
    /// Contract violations (missing entities, wrong kinds) are skipped
    /// silently; rejection is the normal case here, not an error.
    pub fn perform(&self, world: &mut World) {
        match *self {
            Action::Move {
                id,
                direction,
                created_at,
            } => perform_move(world, id, direction, created_at),
            Action::Fire {
                owner_id,
                laser_id,
                direction,
                created_at,
            } => perform_fire(world, owner_id, laser_id, direction, created_at),
        }
    }
}

fn perform_move(world: &mut World, id: Uuid, direction: Direction, created_at: SystemTime) {
    if direction == Direction::Stop {
        return;
    }

    // Only players are movable.
    let Some(player) = world.get_entity(&id).and_then(Entity::as_player) else {
        return;
    };
    let candidate = player.position.step(direction);

    let key = format!("move:{id}");
    if !world.throttle_ok(&key, created_at, MOVE_THROTTLE) {
        return;
    }
    if world.map().is_wall(candidate) {
        return;
    }
    // Another player blocks the cell; lasers and anything else do not.
    if world
        .players()
        .any(|other| other.id != id && other.position == candidate)
    {
        return;
    }

    let Some(player) = world.get_entity_mut(&id).and_then(Entity::as_player_mut) else {
        return;
    };
    player.position = candidate;
    let moved = player.clone();

    world.send_change(Change::Move {
        player: moved,
        direction,
    });
    world.note_action(key, created_at);
}

fn perform_fire(
    world: &mut World,
    owner_id: Uuid,
    laser_id: Uuid,
    direction: Direction,
    created_at: SystemTime,
) {
    if direction == Direction::Stop {
        return;
    }

    let Some(owner) = world.get_entity(&owner_id) else {
        return;
    };
    let origin = owner.position_at(created_at);

    let key = format!("fire:{owner_id}");
    if !world.throttle_ok(&key, created_at, FIRE_THROTTLE) {
        return;
    }
    // Identity collisions are signalled to the offending client upstream;
    // the pipeline just refuses to clobber the existing entity.
    if world.get_entity(&laser_id).is_some() {
        return;
    }

    let laser = Laser {
        id: laser_id,
        owner_id,
        direction,
        initial_position: origin.step(direction),
        start_time: created_at,
    };
    world.add_entity(Entity::Laser(laser.clone()));

    world.send_change(Change::AddEntity(Entity::Laser(laser)));
    world.note_action(key, created_at);
}
