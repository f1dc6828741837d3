// Shared primitives for booting a real server and driving it over HTTP and
// WebSocket in integration tests.
#![allow(dead_code)]

use engine::wire::{ConnectRequest, ConnectResponse, EntityDto, Request, Response};
use engine::{ArenaMap, Coordinate, Direction};
use futures_util::{SinkExt, StreamExt};
use game_server::ServerSettings;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

pub type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Boots a fresh server on an ephemeral port and returns its base URL. Each
/// test gets its own world so state never leaks between tests.
pub async fn spawn_server(settings: ServerSettings) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        game_server::run(listener, settings).await.expect("server failed");
    });
    format!("http://{addr}")
}

pub async fn connect(base_url: &str, id: Uuid, name: &str, password: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base_url}/connect"))
        .json(&ConnectRequest {
            id: id.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        })
        .send()
        .await
        .expect("connect request should reach the server")
}

pub async fn connect_ok(base_url: &str, id: Uuid, name: &str, password: &str) -> ConnectResponse {
    let res = connect(base_url, id, name, password).await;
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    res.json().await.expect("connect response should decode")
}

pub async fn try_open_stream(
    base_url: &str,
    token: &str,
) -> Result<Stream, tokio_tungstenite::tungstenite::Error> {
    let ws_url = format!("{}/stream", base_url.replacen("http", "ws", 1));
    let mut request = ws_url.into_client_request()?;
    request
        .headers_mut()
        .insert("authorization", token.parse().expect("token header value"));
    let (stream, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

pub async fn open_stream(base_url: &str, token: &str) -> Stream {
    try_open_stream(base_url, token)
        .await
        .expect("stream should open")
}

pub async fn send_request(stream: &mut Stream, request: &Request) {
    let text = serde_json::to_string(request).expect("request should encode");
    stream
        .send(Message::text(text))
        .await
        .expect("request should send");
}

/// Next pushed response within the deadline; `None` on timeout or close.
pub async fn recv_response(stream: &mut Stream, deadline: Duration) -> Option<Response> {
    let limit = tokio::time::Instant::now() + deadline;
    loop {
        let remaining = limit.checked_duration_since(tokio::time::Instant::now())?;
        match tokio::time::timeout(remaining, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(&text).expect("response should decode"))
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return None,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Err(_) => return None,
        }
    }
}

/// Reads responses until one matches, discarding unrelated deltas.
pub async fn wait_for(
    stream: &mut Stream,
    deadline: Duration,
    matches: impl Fn(&Response) -> bool,
) -> Option<Response> {
    let limit = tokio::time::Instant::now() + deadline;
    loop {
        let remaining = limit.checked_duration_since(tokio::time::Instant::now())?;
        let response = recv_response(stream, remaining).await?;
        if matches(&response) {
            return Some(response);
        }
    }
}

/// Free cells between `from` and the first wall in `direction`.
pub fn steps_to_wall(map: &ArenaMap, from: Coordinate, direction: Direction) -> i32 {
    let mut steps = 0;
    let mut cell = from.step(direction);
    while !map.is_wall(cell) {
        steps += 1;
        cell = cell.step(direction);
    }
    steps
}

/// Shortest wall-free move sequence from `from` to `to`. `avoid` marks one
/// extra cell as blocked, for routing around another player.
pub fn path_between(
    map: &ArenaMap,
    from: Coordinate,
    to: Coordinate,
    avoid: Option<Coordinate>,
) -> Vec<Direction> {
    let mut prev: HashMap<Coordinate, (Coordinate, Direction)> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(cell) = queue.pop_front() {
        if cell == to {
            break;
        }
        for direction in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            let next = cell.step(direction);
            if map.is_wall(next) || avoid == Some(next) || next == from || prev.contains_key(&next)
            {
                continue;
            }
            prev.insert(next, (cell, direction));
            queue.push_back(next);
        }
    }

    let mut steps = Vec::new();
    let mut cell = to;
    while cell != from {
        let (parent, direction) = *prev.get(&cell).expect("target should be reachable");
        steps.push(direction);
        cell = parent;
    }
    steps.reverse();
    steps
}

/// Steers a player along the shortest path, waiting for each move's echo
/// and spacing sends past the move throttle. Returns the final position.
pub async fn walk_to(
    stream: &mut Stream,
    id: Uuid,
    map: &ArenaMap,
    from: Coordinate,
    to: Coordinate,
    avoid: Option<Coordinate>,
) -> Coordinate {
    let mut position = from;
    for direction in path_between(map, from, to, avoid) {
        send_request(stream, &Request::Move { direction }).await;
        let expected = position.step(direction);
        wait_for(stream, Duration::from_secs(2), |response| {
            matches!(
                response,
                Response::UpdateEntity {
                    entity: EntityDto::Player(player)
                } if player.id == id && player.position == expected
            )
        })
        .await
        .expect("steering move should be applied");
        position = expected;
        tokio::time::sleep(Duration::from_millis(110)).await;
    }
    position
}
