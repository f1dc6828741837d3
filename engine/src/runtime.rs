use crate::action::Action;
use crate::collision::{self, COLLISION_INTERVAL};
use crate::round;
use crate::world::World;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, RwLock};

/// Inbound intents queue here for the single pipeline consumer. Larger than
/// the change channel to absorb bursts from many session readers without
/// back-pressure on their inbound loops; still one consumer, so the
/// single-writer property is unchanged.
pub const ACTION_CHANNEL_CAPACITY: usize = 64;

/// Shared access to a running simulation: the locked world plus the sender
/// feeding the action pipeline.
#[derive(Clone)]
pub struct WorldHandle {
    pub world: Arc<RwLock<World>>,
    pub actions: mpsc::Sender<Action>,
}

/// Wires up and spawns the simulation tasks: the action pipeline consumer
/// and the collision ticker (which schedules round timers as rounds end).
/// These are the only writers; they serialise through the world's write lock.
pub fn spawn_simulation(world: World) -> WorldHandle {
    let world = Arc::new(RwLock::new(world));
    let (action_tx, action_rx) = mpsc::channel(ACTION_CHANNEL_CAPACITY);

    tokio::spawn(consume_actions(world.clone(), action_rx));
    tokio::spawn(run_collision_ticker(world.clone()));

    WorldHandle {
        world,
        actions: action_tx,
    }
}

async fn consume_actions(world: Arc<RwLock<World>>, mut actions: mpsc::Receiver<Action>) {
    while let Some(action) = actions.recv().await {
        let mut world = world.write().await;
        // Between rounds the pipeline drops everything on the floor.
        if world.wait_for_round() {
            continue;
        }
        action.perform(&mut world);
    }
    tracing::debug!("action channel closed; pipeline exiting");
}

async fn run_collision_ticker(world: Arc<RwLock<World>>) {
    let mut interval = tokio::time::interval(COLLISION_INTERVAL);
    loop {
        interval.tick().await;
        let outcome = {
            let mut world = world.write().await;
            collision::run_pass(&mut world, SystemTime::now())
        };
        if let Some(deadline) = outcome.new_round_at {
            tokio::spawn(start_round_after(world.clone(), deadline));
        }
    }
}

/// One-shot timer armed when a round ends. Runs to completion regardless of
/// disconnects in the meantime.
async fn start_round_after(world: Arc<RwLock<World>>, deadline: SystemTime) {
    if let Ok(delay) = deadline.duration_since(SystemTime::now()) {
        tokio::time::sleep(delay).await;
    }
    let mut world = world.write().await;
    round::start_new_round(&mut world);
}
