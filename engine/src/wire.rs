// Wire protocol shared by the server and the client adapter. JSON text
// frames, tagged the same way on both ends; timestamps travel as unix
// microseconds.

use crate::entity::{Entity, Laser, Player};
use crate::grid::{Coordinate, Direction};
use crate::time::{from_unix_micros, unix_micros};
use crate::world::Change;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /connect`. The id is the client-chosen player identity;
/// it stays a string here so the server can reject malformed ids cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub id: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub token: String,
    pub entities: Vec<EntityDto>,
}

/// Messages a client sends over its stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    Move { direction: Direction },
    Fire { id: Uuid, direction: Direction },
}

/// Deltas the server pushes to every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    AddEntity {
        entity: EntityDto,
    },
    UpdateEntity {
        entity: EntityDto,
    },
    RemoveEntity {
        id: Uuid,
    },
    PlayerRespawn {
        player: PlayerDto,
        killed_by_id: Uuid,
    },
    RoundOver {
        round_winner_id: Uuid,
        new_round_at: u64,
    },
    RoundStart {
        players: Vec<PlayerDto>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EntityDto {
    Player(PlayerDto),
    Laser(LaserDto),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDto {
    pub id: Uuid,
    pub name: String,
    pub icon: char,
    pub position: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub direction: Direction,
    pub initial_position: Coordinate,
    pub start_time: u64,
}

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            icon: player.icon,
            position: player.position,
        }
    }
}

impl From<PlayerDto> for Player {
    fn from(dto: PlayerDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            icon: dto.icon,
            position: dto.position,
        }
    }
}

impl From<&Laser> for LaserDto {
    fn from(laser: &Laser) -> Self {
        Self {
            id: laser.id,
            owner_id: laser.owner_id,
            direction: laser.direction,
            initial_position: laser.initial_position,
            start_time: unix_micros(laser.start_time),
        }
    }
}

impl From<LaserDto> for Laser {
    fn from(dto: LaserDto) -> Self {
        Self {
            id: dto.id,
            owner_id: dto.owner_id,
            direction: dto.direction,
            initial_position: dto.initial_position,
            start_time: from_unix_micros(dto.start_time),
        }
    }
}

impl From<&Entity> for EntityDto {
    fn from(entity: &Entity) -> Self {
        match entity {
            Entity::Player(player) => EntityDto::Player(player.into()),
            Entity::Laser(laser) => EntityDto::Laser(laser.into()),
        }
    }
}

impl From<EntityDto> for Entity {
    fn from(dto: EntityDto) -> Self {
        match dto {
            EntityDto::Player(player) => Entity::Player(player.into()),
            EntityDto::Laser(laser) => Entity::Laser(laser.into()),
        }
    }
}

/// Each engine change maps to exactly one outbound message.
pub fn response_for(change: &Change) -> Response {
    match change {
        Change::Move { player, .. } => Response::UpdateEntity {
            entity: EntityDto::Player(player.into()),
        },
        Change::AddEntity(entity) => Response::AddEntity {
            entity: entity.into(),
        },
        Change::RemoveEntity(id) => Response::RemoveEntity { id: *id },
        Change::PlayerRespawn { player, killed_by } => Response::PlayerRespawn {
            player: player.into(),
            killed_by_id: *killed_by,
        },
        Change::RoundOver {
            winner,
            new_round_at,
        } => Response::RoundOver {
            round_winner_id: *winner,
            new_round_at: unix_micros(*new_round_at),
        },
        Change::RoundStart { players } => Response::RoundStart {
            players: players.iter().map(PlayerDto::from).collect(),
        },
    }
}
