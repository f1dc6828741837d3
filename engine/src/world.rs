use crate::entity::{Entity, Player};
use crate::grid::{Coordinate, Direction};
use crate::map::ArenaMap;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffered deltas between the simulation and the transport layer. The
/// stream is a hint, not a durable log; the entity map stays authoritative,
/// so a slow consumer sheds load instead of stalling the simulation.
pub const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Points a player needs to win the round.
pub const ROUND_OVER_SCORE: u32 = 10;

/// Cooldown between a round ending and the next one starting.
pub const NEW_ROUND_WAIT: Duration = Duration::from_secs(10);

/// Outward-facing deltas produced by the engine. Round variants carry their
/// payload so the broadcaster never needs the world lock.
#[derive(Debug, Clone)]
pub enum Change {
    Move { player: Player, direction: Direction },
    AddEntity(Entity),
    RemoveEntity(Uuid),
    PlayerRespawn { player: Player, killed_by: Uuid },
    RoundOver { winner: Uuid, new_round_at: SystemTime },
    RoundStart { players: Vec<Player> },
}

/// The single-writer simulation state. Every field is guarded by one
/// readers-writer lock held by the caller: mutation under the write lock,
/// reads under the read lock. The lock wraps the whole pass, not each field.
#[derive(Debug)]
pub struct World {
    entities: HashMap<Uuid, Entity>,
    score: HashMap<Uuid, u32>,
    map: ArenaMap,
    authoritative: bool,
    wait_for_round: bool,
    round_winner: Option<Uuid>,
    new_round_at: Option<SystemTime>,
    spawn_index: usize,
    last_action: HashMap<String, SystemTime>,
    round_over_score: u32,
    round_wait: Duration,
    change_tx: mpsc::Sender<Change>,
}

impl World {
    pub fn new(map: ArenaMap, authoritative: bool) -> (Self, mpsc::Receiver<Change>) {
        let (change_tx, change_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let world = Self {
            entities: HashMap::new(),
            score: HashMap::new(),
            map,
            authoritative,
            wait_for_round: false,
            round_winner: None,
            new_round_at: None,
            spawn_index: 0,
            last_action: HashMap::new(),
            round_over_score: ROUND_OVER_SCORE,
            round_wait: NEW_ROUND_WAIT,
            change_tx,
        };
        (world, change_rx)
    }

    pub fn map(&self) -> &ArenaMap {
        &self.map
    }

    pub fn authoritative(&self) -> bool {
        self.authoritative
    }

    // Entity map

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    /// Replaces the stored entity wholesale; inserts when absent.
    pub fn update_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    pub fn get_entity(&self, id: &Uuid) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_entity_mut(&mut self, id: &Uuid) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn remove_entity(&mut self, id: &Uuid) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.entities.values().filter_map(Entity::as_player)
    }

    // Score table

    pub fn add_score(&mut self, id: Uuid) -> u32 {
        let score = self.score.entry(id).or_insert(0);
        *score += 1;
        *score
    }

    pub fn score(&self, id: &Uuid) -> u32 {
        self.score.get(id).copied().unwrap_or(0)
    }

    pub fn clear_scores(&mut self) {
        self.score.clear();
    }

    pub fn round_over_score(&self) -> u32 {
        self.round_over_score
    }

    /// Shrinks the winning threshold and the between-round cooldown, for
    /// exercising round transitions without waiting out the defaults.
    pub fn set_round_rules(&mut self, round_over_score: u32, round_wait: Duration) {
        self.round_over_score = round_over_score;
        self.round_wait = round_wait;
    }

    pub fn round_wait(&self) -> Duration {
        self.round_wait
    }

    // Round flags

    pub fn wait_for_round(&self) -> bool {
        self.wait_for_round
    }

    pub fn round_winner(&self) -> Option<Uuid> {
        self.round_winner
    }

    pub fn new_round_at(&self) -> Option<SystemTime> {
        self.new_round_at
    }

    pub fn set_round_over(&mut self, winner: Uuid, new_round_at: SystemTime) {
        self.wait_for_round = true;
        self.round_winner = Some(winner);
        self.new_round_at = Some(new_round_at);
    }

    pub fn set_round_active(&mut self) {
        self.wait_for_round = false;
        self.round_winner = None;
        self.new_round_at = None;
    }

    // Spawn points

    /// Next spawn point, round-robin over the map's scan order.
    pub fn next_spawn(&mut self) -> Option<Coordinate> {
        let spawns = self.map.spawn_points();
        if spawns.is_empty() {
            return None;
        }
        let spawn = spawns[self.spawn_index % spawns.len()];
        self.spawn_index += 1;
        Some(spawn)
    }

    // Throttle ledger

    /// True when enough time has passed since the last accepted action under
    /// this key. Keys are `<kind>:<entity id>`.
    pub fn throttle_ok(&self, key: &str, at: SystemTime, window: Duration) -> bool {
        match self.last_action.get(key) {
            Some(last) => *last + window <= at,
            None => true,
        }
    }

    /// Records the time an action was accepted, never merely attempted.
    pub fn note_action(&mut self, key: String, at: SystemTime) {
        self.last_action.insert(key, at);
    }

    /// Drops ledger entries whose entity has been removed, bounding memory.
    pub fn sweep_throttle_ledger(&mut self) {
        let entities = &self.entities;
        self.last_action.retain(|key, _| {
            key.split(':')
                .nth(1)
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .is_some_and(|id| entities.contains_key(&id))
        });
    }

    // Change stream

    /// Non-blocking enqueue; a full channel drops the change by design.
    pub fn send_change(&self, change: Change) {
        if let Err(mpsc::error::TrySendError::Full(dropped)) = self.change_tx.try_send(change) {
            tracing::trace!(?dropped, "change channel full; dropping");
        }
    }
}
