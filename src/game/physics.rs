//! Ball and player physics for one room tick
//!
//! All quantities are per tick: velocities are units per tick, there is no
//! delta time. Radii and masses are positive constants, so every path here
//! is numerically total.

use std::collections::BTreeMap;
use std::time::Instant;

use uuid::Uuid;

use crate::ws::protocol::Team;

use super::goal::GoalEvent;
use super::pitch::{Pitch, GOAL_DEPTH};
use super::room::{Ball, Occupant, Room};

/// Distance a moving player covers per tick
pub const PLAYER_SPEED: f32 = 2.4;

/// Velocity kept when the ball bounces off a touchline
pub const WALL_RESTITUTION: f32 = 0.5;

/// Velocity kept when the ball bounces inside the goal cavity
pub const NET_RESTITUTION: f32 = 0.3;

/// Scale of positional correction between overlapping circles
pub const SEPARATION_SCALE: f32 = 0.1;

/// Physics system for advancing a room by one tick
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance `room` by one tick. Returns the goal credited this tick, if any.
    pub fn step(room: &mut Room, now: Instant) -> Option<GoalEvent> {
        Self::integrate_ball(&mut room.ball);

        let goal = Self::collide_ball_with_walls(&mut room.ball, &room.pitch)
            .and_then(|team| room.score_goal(team, now));

        Self::resolve_player_collisions(&mut room.occupants);
        Self::resolve_ball_contacts(&mut room.occupants, &mut room.ball);
        Self::advance_players(&mut room.occupants);

        goal
    }

    pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let dx = x1 - x2;
        let dy = y1 - y2;
        (dx * dx + dy * dy).sqrt()
    }

    /// Check whether two circles overlap (touching does not count)
    pub fn check_circle_collision(
        x1: f32,
        y1: f32,
        radius1: f32,
        x2: f32,
        y2: f32,
        radius2: f32,
    ) -> bool {
        Self::distance(x1, y1, x2, y2) < radius1 + radius2
    }

    /// Correction vector pointing from circle 1 towards circle 2, scaled by
    /// overlap and the pair's mean mass. Zero when the circles do not overlap.
    #[allow(clippy::too_many_arguments)]
    pub fn separation(
        x1: f32,
        y1: f32,
        radius1: f32,
        mass1: f32,
        x2: f32,
        y2: f32,
        radius2: f32,
        mass2: f32,
    ) -> (f32, f32) {
        let distance = Self::distance(x1, y1, x2, y2);
        let overlap = radius1 + radius2 - distance;
        if overlap <= 0.0 {
            return (0.0, 0.0);
        }

        let angle = (y2 - y1).atan2(x2 - x1);
        let force = (mass1 + mass2) / 2.0;
        let push = overlap * force * SEPARATION_SCALE;

        (angle.cos() * push, angle.sin() * push)
    }

    /// Move the ball by its velocity, apply friction and accumulate spin
    pub fn integrate_ball(ball: &mut Ball) {
        ball.x += ball.velocity_x;
        ball.y += ball.velocity_y;

        ball.velocity_x *= ball.friction;
        ball.velocity_y *= ball.friction;

        // At rest the speed term is zero, so the spin simply holds
        let direction = if ball.velocity_x >= 0.0 { 1.0 } else { -1.0 };
        ball.angle += ball.speed() / ball.radius * direction;
    }

    /// Bounce the ball off the pitch boundary or let it into a goal cavity.
    /// Returns the team credited when the ball is fully over a goal line.
    pub fn collide_ball_with_walls(ball: &mut Ball, pitch: &Pitch) -> Option<Team> {
        let mut scored = None;
        let r = ball.radius;

        // Right goal line, defended by away
        if ball.x + r > pitch.right() {
            if pitch.in_goal_band(ball.y, r) {
                Self::keep_between_posts(ball, pitch);
                if ball.x + r > pitch.right() + GOAL_DEPTH {
                    ball.x = pitch.right() + GOAL_DEPTH - r;
                    ball.velocity_x = -ball.velocity_x * NET_RESTITUTION;
                }
                if ball.x - r > pitch.right() {
                    scored = Some(Team::Home);
                }
            } else {
                ball.x = pitch.right() - r;
                ball.velocity_x = -ball.velocity_x * WALL_RESTITUTION;
            }
        }

        // Left goal line, defended by home
        if ball.x - r < pitch.left() {
            if pitch.in_goal_band(ball.y, r) {
                Self::keep_between_posts(ball, pitch);
                if ball.x - r < pitch.left() - GOAL_DEPTH {
                    ball.x = pitch.left() - GOAL_DEPTH + r;
                    ball.velocity_x = -ball.velocity_x * NET_RESTITUTION;
                }
                if ball.x + r < pitch.left() {
                    scored = Some(Team::Away);
                }
            } else {
                ball.x = pitch.left() + r;
                ball.velocity_x = -ball.velocity_x * WALL_RESTITUTION;
            }
        }

        if ball.y + r > pitch.bottom() {
            ball.y = pitch.bottom() - r;
            ball.velocity_y = -ball.velocity_y * WALL_RESTITUTION;
        }

        if ball.y - r < pitch.top() {
            ball.y = pitch.top() + r;
            ball.velocity_y = -ball.velocity_y * WALL_RESTITUTION;
        }

        scored
    }

    /// Side walls of the goal cavity
    fn keep_between_posts(ball: &mut Ball, pitch: &Pitch) {
        let (upper, lower) = pitch.goal_posts();
        let r = ball.radius;

        if ball.y - r < upper {
            ball.y = upper + r;
            ball.velocity_y = -ball.velocity_y * NET_RESTITUTION;
        }
        if ball.y + r > lower {
            ball.y = lower - r;
            ball.velocity_y = -ball.velocity_y * NET_RESTITUTION;
        }
    }

    /// Push overlapping field players apart, once per unordered pair
    pub fn resolve_player_collisions(occupants: &mut BTreeMap<Uuid, Occupant>) {
        let ids: Vec<Uuid> = occupants
            .iter()
            .filter(|(_, occupant)| occupant.as_field().is_some())
            .map(|(id, _)| *id)
            .collect();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(a), Some(b)) = (
                    occupants.get(&ids[i]).and_then(Occupant::as_field),
                    occupants.get(&ids[j]).and_then(Occupant::as_field),
                ) else {
                    continue;
                };

                if !Self::check_circle_collision(a.x, a.y, a.radius, b.x, b.y, b.radius) {
                    continue;
                }

                let (dx, dy) =
                    Self::separation(a.x, a.y, a.radius, a.mass, b.x, b.y, b.radius, b.mass);

                if let Some(a) = occupants.get_mut(&ids[i]).and_then(Occupant::as_field_mut) {
                    a.x -= dx;
                    a.y -= dy;
                }
                if let Some(b) = occupants.get_mut(&ids[j]).and_then(Occupant::as_field_mut) {
                    b.x += dx;
                    b.y += dy;
                }
            }
        }
    }

    /// Players bumping into the ball push it away and give it a small impulse
    pub fn resolve_ball_contacts(occupants: &mut BTreeMap<Uuid, Occupant>, ball: &mut Ball) {
        for player in occupants.values_mut().filter_map(Occupant::as_field_mut) {
            if !Self::check_circle_collision(
                player.x,
                player.y,
                player.radius,
                ball.x,
                ball.y,
                ball.radius,
            ) {
                continue;
            }

            let (dx, dy) = Self::separation(
                player.x,
                player.y,
                player.radius,
                player.mass,
                ball.x,
                ball.y,
                ball.radius,
                ball.mass,
            );

            ball.x += dx;
            ball.y += dy;

            let angle = dy.atan2(dx);
            ball.velocity_x += angle.cos() * ball.acceleration;
            ball.velocity_y += angle.sin() * ball.acceleration;

            player.x -= dx / 2.0;
            player.y -= dy / 2.0;
        }
    }

    /// Walk every player with a heading. Players are not clamped to the pitch.
    pub fn advance_players(occupants: &mut BTreeMap<Uuid, Occupant>) {
        for player in occupants.values_mut().filter_map(Occupant::as_field_mut) {
            if let Some(angle) = player.angle {
                player.x += angle.cos() * PLAYER_SPEED;
                player.y += angle.sin() * PLAYER_SPEED;
            }
        }
    }
}
