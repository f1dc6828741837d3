use crate::entity::Entity;
use crate::grid::Coordinate;
use crate::round;
use crate::world::{Change, World};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Cadence of the collision/eviction pass.
pub const COLLISION_INTERVAL: Duration = Duration::from_millis(10);

/// What a pass decided beyond its world mutations.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Set when this pass ended the round; the runtime schedules the
    /// one-shot timer that starts the next one.
    pub new_round_at: Option<SystemTime>,
}

/// One collision pass over every positioned entity. Callers hold the write
/// lock. In non-authoritative mode the pass only despawns lasers; kills,
/// score and round transitions arrive as deltas from the authority.
pub fn run_pass(world: &mut World, now: SystemTime) -> PassOutcome {
    let mut by_cell: HashMap<Coordinate, Vec<Uuid>> = HashMap::new();
    for entity in world.entities() {
        by_cell
            .entry(entity.position_at(now))
            .or_default()
            .push(entity.id());
    }

    let mut doomed_lasers: Vec<Uuid> = Vec::new();
    let mut kills: Vec<(Uuid, Uuid)> = Vec::new();

    for ids in by_cell.values() {
        if ids.len() < 2 {
            continue;
        }
        // (laser id, owner id) pairs sharing this cell.
        let lasers: Vec<(Uuid, Uuid)> = ids
            .iter()
            .filter_map(|id| world.get_entity(id).and_then(Entity::as_laser))
            .map(|laser| (laser.id, laser.owner_id))
            .collect();
        if lasers.is_empty() {
            continue;
        }

        for id in ids {
            match world.get_entity(id) {
                Some(Entity::Laser(_)) => doomed_lasers.push(*id),
                Some(Entity::Player(player)) => {
                    if !world.authoritative() || world.wait_for_round() {
                        continue;
                    }
                    // A player walking into their own shot is not a kill.
                    if let Some((_, killer)) =
                        lasers.iter().find(|(_, owner)| *owner != player.id)
                    {
                        kills.push((player.id, *killer));
                    }
                }
                None => {}
            }
        }
    }

    let mut outcome = PassOutcome::default();
    for (victim, killer) in kills {
        let Some(spawn) = world.next_spawn() else {
            continue;
        };
        let Some(player) = world.get_entity_mut(&victim).and_then(|e| e.as_player_mut()) else {
            continue;
        };
        player.position = spawn;
        let respawned = player.clone();
        world.send_change(Change::PlayerRespawn {
            player: respawned,
            killed_by: killer,
        });

        let score = world.add_score(killer);
        tracing::info!(%victim, %killer, score, "player hit");
        if score >= world.round_over_score() {
            outcome.new_round_at = round::begin_round_cooldown(world, killer, now);
        }
    }

    // Lasers despawn against walls; stray ones are capped at the arena
    // extent so a shot that never hits anything cannot live forever.
    let range_cap = world.map().max_extent();
    for entity in world.entities() {
        if let Entity::Laser(laser) = entity {
            if world.map().is_wall(laser.position_at(now)) || laser.cells_travelled(now) > range_cap
            {
                doomed_lasers.push(laser.id);
            }
        }
    }

    doomed_lasers.sort();
    doomed_lasers.dedup();
    for id in doomed_lasers {
        if world.remove_entity(&id).is_some() {
            world.send_change(Change::RemoveEntity(id));
        }
    }

    world.sweep_throttle_ledger();

    outcome
}
