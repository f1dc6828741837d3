// Reconciliation shim between the authoritative stream and the local
// replica. Two local-echo cases are suppressed to avoid visible jitter:
// the server's echo of our own recent moves, and the re-announcement of a
// laser we already added optimistically.

use engine::time::from_unix_micros;
use engine::wire::{EntityDto, Response};
use engine::{Coordinate, Entity, World};
use std::collections::VecDeque;
use uuid::Uuid;

/// How many locally-committed positions the echo filter remembers.
pub const POSITION_HISTORY_LIMIT: usize = 5;

/// The last few positions this client committed locally, newest first.
#[derive(Debug, Default)]
pub struct PositionHistory {
    entries: VecDeque<Coordinate>,
}

impl PositionHistory {
    pub fn record(&mut self, position: Coordinate) {
        self.entries.push_front(position);
        self.entries.truncate(POSITION_HISTORY_LIMIT);
    }

    pub fn contains(&self, position: Coordinate) -> bool {
        self.entries.contains(&position)
    }
}

/// Applies one server delta to the replica. Callers hold the write lock.
pub fn apply_response(
    world: &mut World,
    local_player: Uuid,
    history: &PositionHistory,
    response: Response,
) {
    match response {
        Response::AddEntity { entity } => {
            // Our own lasers were added optimistically when fired.
            if let EntityDto::Laser(laser) = &entity {
                if laser.owner_id == local_player {
                    return;
                }
            }
            world.add_entity(entity.into());
        }
        Response::UpdateEntity { entity } => {
            // The server echoing a position we recently held is stale news,
            // not a correction.
            if let EntityDto::Player(player) = &entity {
                if player.id == local_player && history.contains(player.position) {
                    return;
                }
            }
            world.update_entity(entity.into());
        }
        Response::RemoveEntity { id } => {
            world.remove_entity(&id);
        }
        Response::PlayerRespawn {
            player,
            killed_by_id,
        } => {
            world.add_score(killed_by_id);
            world.update_entity(Entity::Player(player.into()));
        }
        Response::RoundOver {
            round_winner_id,
            new_round_at,
        } => {
            world.set_round_over(round_winner_id, from_unix_micros(new_round_at));
            world.clear_scores();
        }
        Response::RoundStart { players } => {
            world.set_round_active();
            for player in players {
                world.update_entity(Entity::Player(player.into()));
            }
        }
    }
}
