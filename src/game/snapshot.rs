//! Snapshot building for network transmission
//!
//! Every snapshot carries the full room state; there is no delta encoding.

use crate::ws::protocol::{BallSnapshot, OccupantSnapshot, PlayerSnapshot, RoomSnapshot, ServerMsg};

use super::room::{Occupant, Room};

/// Builds wire snapshots from room state
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build an `update` message for the whole room
    pub fn build(room: &Room) -> ServerMsg {
        ServerMsg::Update(Self::room(room))
    }

    pub fn room(room: &Room) -> RoomSnapshot {
        RoomSnapshot {
            players: room
                .occupants
                .iter()
                .map(|(id, occupant)| (*id, Self::occupant(occupant)))
                .collect(),
            ball: Self::ball(room),
            score: room.score,
        }
    }

    pub fn occupant(occupant: &Occupant) -> OccupantSnapshot {
        match occupant {
            Occupant::Spectator { nickname } => OccupantSnapshot::Spectator {
                nickname: nickname.clone(),
            },
            Occupant::Field(p) => OccupantSnapshot::Field(PlayerSnapshot {
                nickname: p.nickname.clone(),
                x: p.x,
                y: p.y,
                radius: p.radius,
                mass: p.mass,
                range: p.range,
                team: p.team,
                spawn: p.spawn,
                angle: p.angle,
            }),
        }
    }

    fn ball(room: &Room) -> BallSnapshot {
        let ball = &room.ball;
        BallSnapshot {
            x: ball.x,
            y: ball.y,
            radius: ball.radius,
            velocity_x: ball.velocity_x,
            velocity_y: ball.velocity_y,
            friction: ball.friction,
            acceleration: ball.acceleration,
            mass: ball.mass,
            angle: ball.angle,
            active: room.ball_active(),
            scorer: ball.scorer.clone(),
            assister: ball.assister.clone(),
        }
    }
}
