mod support;

use engine::wire::{EntityDto, Request, Response};
use engine::{ArenaMap, Coordinate, Direction};
use game_server::ServerSettings;
use std::time::Duration;
use support::*;
use uuid::Uuid;

fn spawn_of(resp: &engine::wire::ConnectResponse, id: Uuid) -> Coordinate {
    resp.entities
        .iter()
        .find_map(|entity| match entity {
            EntityDto::Player(player) if player.id == id => Some(player.position),
            _ => None,
        })
        .expect("own player should be in the snapshot")
}

#[tokio::test]
async fn stream_requires_a_recognized_token() {
    let base = spawn_server(ServerSettings::default()).await;

    // Unparsable token.
    assert!(try_open_stream(&base, "not-a-token").await.is_err());
    // Well-formed but never issued.
    assert!(try_open_stream(&base, &Uuid::new_v4().to_string())
        .await
        .is_err());
}

#[tokio::test]
async fn second_stream_on_the_same_token_is_rejected() {
    let base = spawn_server(ServerSettings::default()).await;
    let resp = connect_ok(&base, Uuid::new_v4(), "alice", "").await;

    let mut stream = open_stream(&base, &resp.token).await;
    // A served move proves the first stream is bound before we try again.
    send_request(
        &mut stream,
        &Request::Move {
            direction: Direction::Up,
        },
    )
    .await;
    wait_for(&mut stream, Duration::from_secs(2), |response| {
        matches!(response, Response::UpdateEntity { .. })
    })
    .await
    .expect("bound stream should see its own update");

    assert!(try_open_stream(&base, &resp.token).await.is_err());
}

#[tokio::test]
async fn moves_are_applied_and_throttled() {
    let base = spawn_server(ServerSettings::default()).await;
    let id = Uuid::new_v4();
    let resp = connect_ok(&base, id, "alice", "").await;
    let spawn = spawn_of(&resp, id);
    let mut stream = open_stream(&base, &resp.token).await;

    // Two moves in quick succession: only the first is accepted.
    send_request(
        &mut stream,
        &Request::Move {
            direction: Direction::Up,
        },
    )
    .await;
    send_request(
        &mut stream,
        &Request::Move {
            direction: Direction::Up,
        },
    )
    .await;

    let update = wait_for(&mut stream, Duration::from_secs(2), |response| {
        matches!(response, Response::UpdateEntity { .. })
    })
    .await
    .expect("first move should produce an update");
    match update {
        Response::UpdateEntity {
            entity: EntityDto::Player(player),
        } => {
            assert_eq!(player.id, id);
            assert_eq!(player.position, Coordinate::new(spawn.x, spawn.y - 1));
        }
        other => panic!("unexpected response {other:?}"),
    }

    // The throttled second move produced nothing.
    assert!(recv_response(&mut stream, Duration::from_millis(300))
        .await
        .is_none());

    // Outside the window the next move lands.
    send_request(
        &mut stream,
        &Request::Move {
            direction: Direction::Up,
        },
    )
    .await;
    let update = wait_for(&mut stream, Duration::from_secs(2), |response| {
        matches!(response, Response::UpdateEntity { .. })
    })
    .await
    .expect("move outside the throttle window should land");
    match update {
        Response::UpdateEntity {
            entity: EntityDto::Player(player),
        } => assert_eq!(player.position, Coordinate::new(spawn.x, spawn.y - 2)),
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test]
async fn move_into_a_wall_is_rejected() {
    let base = spawn_server(ServerSettings::default()).await;
    let id = Uuid::new_v4();
    let resp = connect_ok(&base, id, "alice", "").await;
    let spawn = spawn_of(&resp, id);
    let mut stream = open_stream(&base, &resp.token).await;

    // Face the nearest wall from wherever we spawned.
    let map = ArenaMap::default();
    let direction = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ]
    .into_iter()
    .min_by_key(|d| steps_to_wall(&map, spawn, *d))
    .unwrap();
    let against_wall = spawn.offset(direction, steps_to_wall(&map, spawn, direction));
    let position = walk_to(&mut stream, id, &map, spawn, against_wall, None).await;
    assert!(map.is_wall(position.step(direction)));

    send_request(&mut stream, &Request::Move { direction }).await;
    assert!(recv_response(&mut stream, Duration::from_millis(400))
        .await
        .is_none());
}

/// Lines two players up on the wall-free centre row, two cells apart, and
/// returns their streams ready for a shot from the first at the second.
async fn stage_duel(base: &str, alice: Uuid, bob: Uuid) -> (Stream, Stream) {
    let alice_resp = connect_ok(base, alice, "alice", "").await;
    let alice_spawn = spawn_of(&alice_resp, alice);
    let mut alice_stream = open_stream(base, &alice_resp.token).await;
    let bob_resp = connect_ok(base, bob, "bob", "").await;
    let bob_spawn = spawn_of(&bob_resp, bob);
    let mut bob_stream = open_stream(base, &bob_resp.token).await;

    let map = ArenaMap::default();
    let alice_at = walk_to(
        &mut alice_stream,
        alice,
        &map,
        alice_spawn,
        Coordinate::new(2, 0),
        Some(bob_spawn),
    )
    .await;
    walk_to(
        &mut bob_stream,
        bob,
        &map,
        bob_spawn,
        Coordinate::new(5, 0),
        Some(alice_at),
    )
    .await;
    (alice_stream, bob_stream)
}

#[tokio::test]
async fn laser_kill_respawns_scores_and_ends_the_round() {
    let base = spawn_server(ServerSettings {
        round_over_score: 1,
        ..ServerSettings::default()
    })
    .await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let (mut alice_stream, _bob_stream) = stage_duel(&base, alice, bob).await;

    let laser_id = Uuid::new_v4();
    send_request(
        &mut alice_stream,
        &Request::Fire {
            id: laser_id,
            direction: Direction::Right,
        },
    )
    .await;

    // The laser is announced before it lands.
    wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(
            response,
            Response::AddEntity { entity: EntityDto::Laser(laser) } if laser.id == laser_id
        )
    })
    .await
    .expect("the shot should be announced");

    let respawn = wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::PlayerRespawn { .. })
    })
    .await
    .expect("the hit should respawn the victim");
    match respawn {
        Response::PlayerRespawn {
            player,
            killed_by_id,
        } => {
            assert_eq!(player.id, bob);
            assert_eq!(killed_by_id, alice);
            assert!(ArenaMap::default().spawn_points().contains(&player.position));
        }
        other => panic!("unexpected response {other:?}"),
    }

    // One point crosses the shrunken threshold and ends the round.
    let over = wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::RoundOver { .. })
    })
    .await
    .expect("the score threshold should end the round");
    assert!(
        matches!(over, Response::RoundOver { round_winner_id, .. } if round_winner_id == alice)
    );

    // The spent laser is cleaned up on the same stream.
    wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::RemoveEntity { id } if *id == laser_id)
    })
    .await
    .expect("the spent laser should despawn");
}

#[tokio::test]
async fn round_restart_reopens_the_action_pipeline() {
    let base = spawn_server(ServerSettings {
        round_over_score: 1,
        round_wait: Duration::from_millis(600),
        ..ServerSettings::default()
    })
    .await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let (mut alice_stream, _bob_stream) = stage_duel(&base, alice, bob).await;

    send_request(
        &mut alice_stream,
        &Request::Fire {
            id: Uuid::new_v4(),
            direction: Direction::Right,
        },
    )
    .await;
    wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::RoundOver { .. })
    })
    .await
    .expect("the kill should end the round");

    // Moves submitted during the cooldown are dropped on the floor: nothing
    // but laser cleanup may arrive before the round starts again.
    send_request(
        &mut alice_stream,
        &Request::Move {
            direction: Direction::Up,
        },
    )
    .await;
    let limit = tokio::time::Instant::now() + Duration::from_secs(3);
    let players = loop {
        let remaining = limit
            .checked_duration_since(tokio::time::Instant::now())
            .expect("round should restart in time");
        match recv_response(&mut alice_stream, remaining)
            .await
            .expect("stream should stay open until the round starts")
        {
            Response::UpdateEntity { .. } => {
                panic!("pipeline accepted an action while waiting for the round")
            }
            Response::RoundStart { players } => break players,
            _ => {}
        }
    };

    // Everyone is back on a spawn point with the scores wiped.
    assert_eq!(players.len(), 2);
    let alice_at = players
        .iter()
        .find(|player| player.id == alice)
        .expect("winner should be in the round start")
        .position;
    assert!(players.iter().any(|player| player.id == bob));
    let map = ArenaMap::default();
    assert!(players
        .iter()
        .all(|player| map.spawn_points().contains(&player.position)));

    // The pipeline accepts actions again once the round is running.
    send_request(
        &mut alice_stream,
        &Request::Move {
            direction: Direction::Up,
        },
    )
    .await;
    let update = wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(
            response,
            Response::UpdateEntity { entity: EntityDto::Player(player) } if player.id == alice
        )
    })
    .await
    .expect("moves should land again after the restart");
    match update {
        Response::UpdateEntity {
            entity: EntityDto::Player(player),
        } => assert_eq!(player.position, Coordinate::new(alice_at.x, alice_at.y - 1)),
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test]
async fn fire_is_broadcast_to_other_sessions() {
    let base = spawn_server(ServerSettings::default()).await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alice_resp = connect_ok(&base, alice, "alice", "").await;
    let mut alice_stream = open_stream(&base, &alice_resp.token).await;
    let bob_resp = connect_ok(&base, bob, "bob", "").await;
    let mut bob_stream = open_stream(&base, &bob_resp.token).await;

    let laser_id = Uuid::new_v4();
    send_request(
        &mut bob_stream,
        &Request::Fire {
            id: laser_id,
            direction: Direction::Right,
        },
    )
    .await;

    let added = wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(
            response,
            Response::AddEntity {
                entity: EntityDto::Laser(_)
            }
        )
    })
    .await
    .expect("laser should be broadcast");
    match added {
        Response::AddEntity {
            entity: EntityDto::Laser(laser),
        } => {
            assert_eq!(laser.id, laser_id);
            assert_eq!(laser.owner_id, bob);
            assert_eq!(laser.direction, Direction::Right);
        }
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_laser_identity_disconnects_the_offender() {
    let base = spawn_server(ServerSettings::default()).await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alice_resp = connect_ok(&base, alice, "alice", "").await;
    let mut alice_stream = open_stream(&base, &alice_resp.token).await;
    let bob_resp = connect_ok(&base, bob, "bob", "").await;
    let mut bob_stream = open_stream(&base, &bob_resp.token).await;

    // Drain bob's join announcement before provoking the disconnect.
    wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::AddEntity { .. })
    })
    .await
    .expect("bob's join should be announced");

    // A laser id colliding with bob's player identity always collides.
    send_request(
        &mut alice_stream,
        &Request::Fire {
            id: bob,
            direction: Direction::Up,
        },
    )
    .await;

    // Alice is disconnected; her stream drains to a close.
    assert!(recv_response(&mut alice_stream, Duration::from_secs(2))
        .await
        .is_none());

    // Everyone else sees her player leave; nobody else is disconnected.
    let removed = wait_for(&mut bob_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::RemoveEntity { .. })
    })
    .await
    .expect("offender's player should be removed");
    assert!(matches!(removed, Response::RemoveEntity { id } if id == alice));
}

#[tokio::test]
async fn clean_disconnect_removes_the_player() {
    let base = spawn_server(ServerSettings::default()).await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alice_resp = connect_ok(&base, alice, "alice", "").await;
    let alice_stream = open_stream(&base, &alice_resp.token).await;
    let bob_resp = connect_ok(&base, bob, "bob", "").await;
    let mut bob_stream = open_stream(&base, &bob_resp.token).await;

    drop(alice_stream);

    let removed = wait_for(&mut bob_stream, Duration::from_secs(2), |response| {
        matches!(response, Response::RemoveEntity { .. })
    })
    .await
    .expect("disconnect should broadcast the removal");
    assert!(matches!(removed, Response::RemoveEntity { id } if id == alice));
}

#[tokio::test]
async fn idle_sessions_are_disconnected() {
    let base = spawn_server(ServerSettings {
        idle_timeout: Duration::from_millis(300),
        idle_check_interval: Duration::from_millis(100),
        ..ServerSettings::default()
    })
    .await;
    let alice = Uuid::new_v4();
    let alice_resp = connect_ok(&base, alice, "alice", "").await;
    let mut alice_stream = open_stream(&base, &alice_resp.token).await;

    // Stay quiet past the idle threshold; the supervisor closes the stream.
    assert!(recv_response(&mut alice_stream, Duration::from_secs(3))
        .await
        .is_none());

    // The session is gone, so the token no longer opens a stream.
    assert!(try_open_stream(&base, &alice_resp.token).await.is_err());
}

#[tokio::test]
async fn connects_are_announced_to_bound_streams() {
    let base = spawn_server(ServerSettings::default()).await;
    let alice = Uuid::new_v4();
    let alice_resp = connect_ok(&base, alice, "alice", "").await;
    let mut alice_stream = open_stream(&base, &alice_resp.token).await;

    let bob = Uuid::new_v4();
    connect_ok(&base, bob, "bob", "").await;

    let added = wait_for(&mut alice_stream, Duration::from_secs(2), |response| {
        matches!(
            response,
            Response::AddEntity {
                entity: EntityDto::Player(_)
            }
        )
    })
    .await
    .expect("new players are announced");
    match added {
        Response::AddEntity {
            entity: EntityDto::Player(player),
        } => assert_eq!(player.id, bob),
        other => panic!("unexpected response {other:?}"),
    }
}
