use crate::replica::{self, PositionHistory};

use engine::wire::{ConnectRequest, ConnectResponse, Request, Response};
use engine::{runtime, Action, ArenaMap, Change, Direction, Entity, World};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
pub enum ClientError {
    /// The connect call never completed.
    Connect(String),
    /// The server refused the handshake; carries its reason verbatim.
    Rejected(String),
    /// The stream died underneath us.
    Transport(String),
    /// The server closed the stream, usually with a reason.
    Closed(String),
    /// The server sent something we cannot decode.
    Protocol(String),
}

/// A connected client: the local replica plus the sender feeding its
/// optimistic action pipeline. A frontend drives this handle and renders
/// from the replica world.
#[derive(Clone)]
pub struct GameClient {
    pub player_id: Uuid,
    pub world: Arc<RwLock<World>>,
    actions: mpsc::Sender<Action>,
}

impl GameClient {
    /// Predict a move locally; the committed change is relayed upstream by
    /// the stream driver.
    pub async fn submit_move(&self, direction: Direction) {
        let action = Action::Move {
            id: self.player_id,
            direction,
            created_at: SystemTime::now(),
        };
        if self.actions.send(action).await.is_err() {
            warn!("local pipeline gone; dropping move");
        }
    }

    /// Fire optimistically under a fresh laser identity.
    pub async fn submit_fire(&self, direction: Direction) {
        let action = Action::Fire {
            owner_id: self.player_id,
            laser_id: Uuid::new_v4(),
            direction,
            created_at: SystemTime::now(),
        };
        if self.actions.send(action).await.is_err() {
            warn!("local pipeline gone; dropping shot");
        }
    }
}

/// Performs the connect handshake, seeds the replica from the snapshot and
/// opens the authenticated stream.
pub async fn connect(
    address: &str,
    name: &str,
    password: &str,
) -> Result<(GameClient, StreamDriver), ClientError> {
    let player_id = Uuid::new_v4();

    let response = reqwest::Client::new()
        .post(format!("{address}/connect"))
        .json(&ConnectRequest {
            id: player_id.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        })
        .send()
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;
    if response.status() != reqwest::StatusCode::CREATED {
        let reason = response.text().await.unwrap_or_default();
        return Err(ClientError::Rejected(reason));
    }
    let connected: ConnectResponse = response
        .json()
        .await
        .map_err(|e| ClientError::Protocol(e.to_string()))?;

    // Replica world, seeded with the snapshot. Non-authoritative: kills and
    // rounds arrive as deltas, only lasers are reconciled locally.
    let (mut world, change_rx) = World::new(ArenaMap::default(), false);
    for dto in connected.entities {
        world.add_entity(dto.into());
    }
    let handle = runtime::spawn_simulation(world);

    let ws_url = format!("{}/stream", address.replacen("http", "ws", 1));
    let mut request = ws_url
        .into_client_request()
        .map_err(|e| ClientError::Connect(e.to_string()))?;
    request.headers_mut().insert(
        "authorization",
        connected
            .token
            .parse()
            .map_err(|_| ClientError::Protocol("unusable token".to_string()))?,
    );
    let (stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;

    info!(%player_id, "connected");

    let client = GameClient {
        player_id,
        world: handle.world.clone(),
        actions: handle.actions.clone(),
    };
    let driver = StreamDriver {
        player_id,
        world: handle.world,
        stream,
        changes: change_rx,
        history: PositionHistory::default(),
    };
    Ok((client, driver))
}

/// Pumps the session: relays locally-committed changes upstream and applies
/// the server's deltas to the replica. One task owns both directions, so
/// the echo filter needs no further synchronisation.
pub struct StreamDriver {
    player_id: Uuid,
    world: Arc<RwLock<World>>,
    stream: WsStream,
    changes: mpsc::Receiver<Change>,
    history: PositionHistory,
}

impl StreamDriver {
    pub async fn run(mut self) -> Result<(), ClientError> {
        loop {
            tokio::select! {
                change = self.changes.recv() => match change {
                    Some(change) => self.relay_local_change(change).await?,
                    None => return Ok(()),
                },
                frame = self.stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let response: Response = serde_json::from_str(text.as_str())
                            .map_err(|e| ClientError::Protocol(e.to_string()))?;
                        debug!(?response, "delta received");
                        let mut world = self.world.write().await;
                        replica::apply_response(&mut world, self.player_id, &self.history, response);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "stream closed".to_string());
                        return Err(ClientError::Closed(reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
                    None => return Ok(()),
                },
            }
        }
    }

    async fn relay_local_change(&mut self, change: Change) -> Result<(), ClientError> {
        let request = match change {
            Change::Move { player, direction } if player.id == self.player_id => {
                self.history.record(player.position);
                Request::Move { direction }
            }
            Change::AddEntity(Entity::Laser(laser)) if laser.owner_id == self.player_id => {
                Request::Fire {
                    id: laser.id,
                    direction: laser.direction,
                }
            }
            // Everything else is replica housekeeping, not an intent.
            _ => return Ok(()),
        };

        let text =
            serde_json::to_string(&request).map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
