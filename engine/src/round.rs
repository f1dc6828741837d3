use crate::world::{Change, World};
use std::time::SystemTime;
use uuid::Uuid;

/// Ends the round: freezes the action pipeline, records the winner and the
/// next-round deadline, and announces it. The caller schedules the one-shot
/// timer that later calls [`start_new_round`]. No-op while already waiting.
pub fn begin_round_cooldown(world: &mut World, winner: Uuid, now: SystemTime) -> Option<SystemTime> {
    if world.wait_for_round() {
        return None;
    }
    let new_round_at = now + world.round_wait();
    world.set_round_over(winner, new_round_at);
    world.send_change(Change::RoundOver {
        winner,
        new_round_at,
    });
    tracing::info!(%winner, "round over");
    Some(new_round_at)
}

/// Starts the next round: clears the score table, moves every player to a
/// round-robin spawn point and reopens the action pipeline.
pub fn start_new_round(world: &mut World) {
    world.clear_scores();

    let player_ids: Vec<Uuid> = world.players().map(|p| p.id).collect();
    for id in player_ids {
        let Some(spawn) = world.next_spawn() else {
            break;
        };
        if let Some(player) = world.get_entity_mut(&id).and_then(|e| e.as_player_mut()) {
            player.position = spawn;
        }
    }

    world.set_round_active();
    let players = world.players().cloned().collect();
    world.send_change(Change::RoundStart { players });
    tracing::info!("round started");
}
