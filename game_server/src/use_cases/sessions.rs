// Per-client transport records: token, bound player, activity tracking and
// the failure channel that serialises every disconnect decision.

use crate::interface_adapters::state::AppState;
use crate::use_cases::broadcast;
use axum::extract::ws::Utf8Bytes;
use engine::wire::Response;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Room for failure signals from the broadcaster, the supervisor and the
/// reader; whoever gets there first wins, later signals are redundant.
const FAILURE_CHANNEL_CAPACITY: usize = 4;

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One accepted client. Sessions reference their player by identity, never
/// by value, so the player can be removed independently.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: Uuid,
    pub player_id: Uuid,
    /// Wall-clock millis of the last inbound message.
    pub last_message: Arc<AtomicU64>,
    /// Requests parsed off this stream, reported on cleanup.
    pub messages_received: Arc<AtomicU64>,
    /// Outbound queue, present once a stream is bound.
    pub outbound: Option<mpsc::Sender<Utf8Bytes>>,
    /// Failure signal, present once a stream is bound.
    pub failure: Option<mpsc::Sender<String>>,
}

impl Session {
    pub fn new(token: Uuid, player_id: Uuid) -> Self {
        Self {
            token,
            player_id,
            last_message: Arc::new(AtomicU64::new(now_millis())),
            messages_received: Arc::new(AtomicU64::new(0)),
            outbound: None,
            failure: None,
        }
    }

    pub fn touch(&self) {
        self.last_message.store(now_millis(), Ordering::Relaxed);
    }

    pub fn note_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn idle_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_message.load(Ordering::Relaxed))
    }

    /// Non-blocking; a full or closed failure channel means a disconnect is
    /// already underway.
    pub fn signal_failure(&self, reason: &str) {
        if let Some(failure) = &self.failure {
            let _ = failure.try_send(reason.to_string());
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BindError {
    TokenNotRecognized,
    StreamAlreadyActive,
}

/// All live sessions, keyed by token. Guarded by its own lock; never held
/// across sends or together with the world lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn insert(&self, session: Session) {
        self.sessions.write().await.insert(session.token, session);
    }

    pub async fn get(&self, token: &Uuid) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Attaches the outbound queue to a session, activating it for
    /// broadcast. Exactly one stream per session.
    pub async fn bind_stream(
        &self,
        token: &Uuid,
        outbound: mpsc::Sender<Utf8Bytes>,
    ) -> Result<(Session, mpsc::Receiver<String>), BindError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(token)
            .ok_or(BindError::TokenNotRecognized)?;
        if session.outbound.is_some() {
            return Err(BindError::StreamAlreadyActive);
        }

        let (failure_tx, failure_rx) = mpsc::channel(FAILURE_CHANNEL_CAPACITY);
        session.outbound = Some(outbound);
        session.failure = Some(failure_tx);
        Ok((session.clone(), failure_rx))
    }

    pub async fn remove(&self, token: &Uuid) -> Option<Session> {
        self.sessions.write().await.remove(token)
    }

    pub async fn snapshot(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }
}

/// Tears a session down: drops the record, removes the bound player and
/// tells everyone else. The broadcast goes out directly rather than through
/// the change stream so a departure is never load-shed.
pub async fn remove_session(state: &AppState, token: Uuid) {
    let Some(session) = state.sessions.remove(&token).await else {
        return;
    };
    let removed = {
        let mut world = state.handle.world.write().await;
        world.remove_entity(&session.player_id)
    };
    if removed.is_some() {
        broadcast::broadcast_response(
            &state.sessions,
            &Response::RemoveEntity {
                id: session.player_id,
            },
        )
        .await;
    }
    tracing::debug!(
        player_id = %session.player_id,
        messages_received = session.messages_received.load(Ordering::Relaxed),
        "connection stats"
    );
    tracing::info!(player_id = %session.player_id, "client disconnected");
}

/// Periodic scan for clients that have gone quiet. Holds no simulation
/// locks while scanning.
pub async fn supervise_idle(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(state.settings.idle_check_interval);
    interval.tick().await; // first tick is immediate
    loop {
        interval.tick().await;
        let now = now_millis();
        let idle_cap = state.settings.idle_timeout.as_millis() as u64;
        for session in state.sessions.snapshot().await {
            if session.idle_millis(now) <= idle_cap {
                continue;
            }
            if session.failure.is_some() {
                session.signal_failure("you have been timed out");
            } else {
                // Connected but never bound a stream, so nothing is
                // listening for failures; clean up directly.
                tracing::info!(player_id = %session.player_id, "dropping idle session with no stream");
                remove_session(&state, session.token).await;
            }
        }
    }
}
