use crate::frameworks::config::SESSION_SEND_BUFFER;
use crate::interface_adapters::state::AppState;
use crate::use_cases::broadcast;
use crate::use_cases::sessions::{self, BindError, Session};

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        Json, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
};
use engine::wire::{ConnectRequest, ConnectResponse, EntityDto, Request, Response};
use engine::{Action, Entity, Player};
use rand::seq::IndexedRandom;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything that can sink a connect handshake. Responses carry the reason
/// as a plain string body.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectError {
    ServerFull,
    InvalidId,
    DuplicateId,
    InvalidPassword,
    InvalidName,
    NoSpawnPoints,
}

impl IntoResponse for ConnectError {
    fn into_response(self) -> HttpResponse {
        let (status, reason) = match self {
            ConnectError::ServerFull => (StatusCode::SERVICE_UNAVAILABLE, "the server is full"),
            ConnectError::InvalidId => (StatusCode::BAD_REQUEST, "invalid player ID provided"),
            ConnectError::DuplicateId => (StatusCode::CONFLICT, "duplicate player ID provided"),
            ConnectError::InvalidPassword => {
                (StatusCode::UNAUTHORIZED, "invalid password provided")
            }
            ConnectError::InvalidName => (StatusCode::BAD_REQUEST, "invalid name provided"),
            ConnectError::NoSpawnPoints => {
                (StatusCode::INTERNAL_SERVER_ERROR, "map has no spawn points")
            }
        };
        (status, reason).into_response()
    }
}

/// Equal-length strings compare in constant time; length is the only
/// early-out.
fn password_matches(supplied: &str, expected: &str) -> bool {
    let (a, b) = (supplied.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `POST /connect`: validates the handshake, spawns the player, and mints
/// the session token the stream call authenticates with.
pub async fn connect_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<ConnectResponse>), ConnectError> {
    if state.sessions.count().await >= state.settings.max_clients {
        return Err(ConnectError::ServerFull);
    }

    let player_id = Uuid::parse_str(req.id.trim()).map_err(|_| ConnectError::InvalidId)?;
    if !password_matches(&req.password, &state.settings.password) {
        return Err(ConnectError::InvalidPassword);
    }
    if !valid_name(&req.name) {
        return Err(ConnectError::InvalidName);
    }
    let icon = req.name.to_uppercase().chars().next().unwrap_or('?');

    let player = {
        let world = state.handle.world.read().await;
        let spawn = *world
            .map()
            .spawn_points()
            .choose(&mut rand::rng())
            .ok_or(ConnectError::NoSpawnPoints)?;
        Player {
            id: player_id,
            name: req.name.clone(),
            icon,
            position: spawn,
        }
    };

    let (added, entities) = {
        // One write-lock scope keeps the duplicate check and the insert
        // atomic against concurrent connects.
        let mut world = state.handle.world.write().await;
        if world.get_entity(&player_id).is_some() {
            return Err(ConnectError::DuplicateId);
        }
        world.add_entity(Entity::Player(player.clone()));
        let entities: Vec<EntityDto> = world.entities().map(EntityDto::from).collect();
        (EntityDto::from(&Entity::Player(player)), entities)
    };

    // Tell existing clients about the newcomer; its own session is not
    // bound yet and is skipped by the fan-out.
    broadcast::broadcast_response(&state.sessions, &Response::AddEntity { entity: added }).await;

    let token = Uuid::new_v4();
    state.sessions.insert(Session::new(token, player_id)).await;
    info!(%player_id, name = %req.name, "client connected");

    Ok((
        StatusCode::CREATED,
        Json(ConnectResponse {
            token: token.to_string(),
            entities,
        }),
    ))
}

/// `GET /stream`: authenticates the upgrade via the `authorization` header
/// and hands the socket to the per-session loop.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> HttpResponse {
    let Some(raw) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::UNAUTHORIZED, "no token provided").into_response();
    };
    let Ok(token) = Uuid::parse_str(raw.trim()) else {
        return (StatusCode::UNAUTHORIZED, "cannot parse token").into_response();
    };

    // Reject before upgrading; bind_stream re-checks under the lock.
    match state.sessions.get(&token).await {
        None => return (StatusCode::UNAUTHORIZED, "token not recognized").into_response(),
        Some(session) if session.outbound.is_some() => {
            return (StatusCode::CONFLICT, "stream already active").into_response()
        }
        Some(_) => {}
    }

    ws.on_upgrade(move |socket| run_session(socket, state, token))
}

async fn run_session(mut socket: WebSocket, state: Arc<AppState>, token: Uuid) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Utf8Bytes>(SESSION_SEND_BUFFER);
    let (session, mut failure_rx) = match state.sessions.bind_stream(&token, outbound_tx).await {
        Ok(bound) => bound,
        Err(reason) => {
            let reason = match reason {
                BindError::TokenNotRecognized => "token not recognized",
                BindError::StreamAlreadyActive => "stream already active",
            };
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };
    info!(player_id = %session.player_id, "stream bound");

    let close_reason =
        run_stream_loop(&mut socket, &state, &session, &mut outbound_rx, &mut failure_rx).await;
    if let Some(reason) = close_reason {
        info!(player_id = %session.player_id, %reason, "closing stream");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: reason.into(),
            })))
            .await;
    }

    sessions::remove_session(&state, token).await;
}

/// Pumps one session: inbound requests, the outbound broadcast queue and
/// the failure channel. Returns the close reason to send, if any.
async fn run_stream_loop(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    session: &Session,
    outbound_rx: &mut mpsc::Receiver<Utf8Bytes>,
    failure_rx: &mut mpsc::Receiver<String>,
) -> Option<String> {
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    session.touch();
                    if let Err(reason) = dispatch_request(state, session, text.as_str()).await {
                        return Some(reason);
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    return Some("binary messages not supported".to_string());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => {
                    warn!(player_id = %session.player_id, error = %e, "stream receive error");
                    return None;
                }
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = socket.send(Message::Text(text)).await {
                        warn!(player_id = %session.player_id, error = %e, "stream send error");
                        return None;
                    }
                }
                None => return None,
            },
            reason = failure_rx.recv() => return reason,
        }
    }
}

/// Translates one inbound request into an action. An `Err` is a protocol
/// violation and disconnects the sender with the returned reason.
async fn dispatch_request(
    state: &Arc<AppState>,
    session: &Session,
    text: &str,
) -> Result<(), String> {
    let request: Request = serde_json::from_str(text).map_err(|e| {
        warn!(player_id = %session.player_id, error = %e, "failed to parse request");
        "failed to parse request".to_string()
    })?;
    session.note_message();

    let action = match request {
        Request::Move { direction } => Action::Move {
            id: session.player_id,
            direction,
            created_at: SystemTime::now(),
        },
        Request::Fire { id, direction } => {
            {
                let world = state.handle.world.read().await;
                if world.get_entity(&id).is_some() {
                    return Err("duplicate laser ID provided".to_string());
                }
            }
            Action::Fire {
                owner_id: session.player_id,
                laser_id: id,
                direction,
                created_at: SystemTime::now(),
            }
        }
    };

    match state.handle.actions.try_send(action) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(player_id = %session.player_id, "action channel full; dropping");
            Ok(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err("simulation unavailable".to_string()),
    }
}
