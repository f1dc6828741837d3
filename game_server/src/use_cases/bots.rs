// In-process bot players. They push actions through the same pipeline as
// remote clients; anything smarter than a random walk belongs in an
// external driver.

use engine::{Action, Direction, Entity, Player, WorldHandle};
use rand::Rng;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

const BOT_STEP_INTERVAL: Duration = Duration::from_millis(200);
const BOT_FIRE_PROBABILITY: f64 = 0.15;
const BOT_TURN_PROBABILITY: f64 = 0.25;

/// Spawns `count` bot players into the world and a walker task for each.
pub async fn deploy(handle: &WorldHandle, count: usize) {
    for index in 0..count {
        let id = Uuid::new_v4();
        {
            let mut world = handle.world.write().await;
            let Some(spawn) = world.next_spawn() else {
                tracing::warn!("map has no spawn points; skipping bots");
                return;
            };
            world.add_entity(Entity::Player(Player {
                id,
                name: format!("bot{index}"),
                icon: 'b',
                position: spawn,
            }));
        }
        tokio::spawn(wander(handle.clone(), id));
        tracing::info!(%id, index, "bot deployed");
    }
}

async fn wander(handle: WorldHandle, id: Uuid) {
    let mut interval = tokio::time::interval(BOT_STEP_INTERVAL);
    let mut heading = random_direction();
    loop {
        interval.tick().await;
        if handle.world.read().await.get_entity(&id).is_none() {
            break;
        }

        // Thread-local rng must not be held across an await.
        let (turn, fire) = {
            let mut rng = rand::rng();
            (
                rng.random_bool(BOT_TURN_PROBABILITY),
                rng.random_bool(BOT_FIRE_PROBABILITY),
            )
        };
        if turn {
            heading = random_direction();
        }

        let now = SystemTime::now();
        if handle
            .actions
            .send(Action::Move {
                id,
                direction: heading,
                created_at: now,
            })
            .await
            .is_err()
        {
            break;
        }
        if fire {
            let shot = Action::Fire {
                owner_id: id,
                laser_id: Uuid::new_v4(),
                direction: heading,
                created_at: now,
            };
            if handle.actions.send(shot).await.is_err() {
                break;
            }
        }
    }
    tracing::debug!(%id, "bot walker exiting");
}

fn random_direction() -> Direction {
    match rand::rng().random_range(0..4u8) {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}
