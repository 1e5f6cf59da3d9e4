//! Goal and kickoff state machine
//!
//! `Live` → goal crosses the line → `Celebrating` (ball inactive, score
//! bumped) → deadline passes → kickoff reset → `Live`.

use std::time::{Duration, Instant};

use tracing::info;

use crate::ws::protocol::{Kicker, Score, ServerMsg, Team};

use super::room::{Ball, Occupant, Room};

/// Pause between a goal and the following kickoff
pub const KICKOFF_DELAY: Duration = Duration::from_secs(2);

/// Goals needed to win; reaching it wipes the scoreboard at kickoff
pub const SCORE_LIMIT: u32 = 5;

/// Ball availability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayPhase {
    /// Ball in play, goals count
    Live,
    /// Goal scored, waiting for the kickoff reset
    Celebrating { scored_by: Team, resume_at: Instant },
}

impl PlayPhase {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// A goal that was just credited
#[derive(Debug, Clone, PartialEq)]
pub struct GoalEvent {
    pub team: Team,
    pub scorer: Option<Kicker>,
    pub assister: Option<Kicker>,
}

impl From<GoalEvent> for ServerMsg {
    fn from(goal: GoalEvent) -> Self {
        ServerMsg::Goal {
            team: goal.team,
            scorer: goal.scorer,
            assister: goal.assister,
        }
    }
}

impl Room {
    pub fn ball_active(&self) -> bool {
        self.phase.is_live()
    }

    /// Credit `team` with a goal if the ball is live. While celebrating,
    /// further crossings are ignored.
    pub fn score_goal(&mut self, team: Team, now: Instant) -> Option<GoalEvent> {
        if !self.phase.is_live() {
            return None;
        }

        self.score.bump(team);
        self.phase = PlayPhase::Celebrating {
            scored_by: team,
            resume_at: now + KICKOFF_DELAY,
        };

        info!(
            room_id = %self.id,
            team = ?team,
            home = self.score.home,
            away = self.score.away,
            "Goal scored"
        );

        Some(GoalEvent {
            team,
            scorer: self.ball.scorer.clone(),
            assister: self.ball.assister.clone(),
        })
    }

    /// Run the kickoff reset once its deadline has passed.
    /// Returns true if the room went back to live play.
    pub fn resume_if_due(&mut self, now: Instant) -> bool {
        match self.phase {
            PlayPhase::Celebrating {
                scored_by,
                resume_at,
            } if now >= resume_at => {
                self.reset_for_kickoff(scored_by);
                true
            }
            _ => false,
        }
    }

    fn reset_for_kickoff(&mut self, scored_by: Team) {
        // Spin carries over
        let (x, y) = self.pitch.center();
        self.ball = Ball {
            angle: self.ball.angle,
            ..Ball::at((x, y))
        };

        for occupant in self.occupants.values_mut() {
            if let Occupant::Field(player) = occupant {
                let (sx, sy) = self.alignment.slot(player.team, player.spawn);
                player.x = sx;
                player.y = sy;
                player.angle = None;
            }
        }

        if self.score.get(scored_by) >= SCORE_LIMIT {
            info!(room_id = %self.id, winner = ?scored_by, "Score limit reached, resetting");
            self.score = Score::default();
        }

        self.phase = PlayPhase::Live;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::RoomDescriptor;
    use uuid::Uuid;

    fn room() -> Room {
        Room::new(&RoomDescriptor {
            id: "g".to_string(),
            name: "Goals".to_string(),
        })
    }

    #[test]
    fn goal_only_counts_while_live() {
        let mut room = room();
        let now = Instant::now();

        let goal = room.score_goal(Team::Home, now).expect("first goal fires");
        assert_eq!(goal.team, Team::Home);
        assert_eq!(room.score.home, 1);
        assert!(!room.ball_active());

        assert!(room.score_goal(Team::Home, now).is_none());
        assert!(room.score_goal(Team::Away, now + Duration::from_millis(500)).is_none());
        assert_eq!(room.score, Score { home: 1, away: 0 });
    }

    #[test]
    fn kickoff_waits_for_delay() {
        let mut room = room();
        let now = Instant::now();
        room.score_goal(Team::Away, now);

        assert!(!room.resume_if_due(now + Duration::from_millis(1999)));
        assert!(!room.ball_active());
        assert!(room.resume_if_due(now + KICKOFF_DELAY));
        assert!(room.ball_active());
        assert!(!room.resume_if_due(now + KICKOFF_DELAY * 2));
    }

    #[test]
    fn kickoff_resets_ball_players_and_chain() {
        let mut room = room();
        let id = Uuid::new_v4();
        room.admit(id, "nine");

        let player = room.occupants.get_mut(&id).unwrap().as_field_mut().unwrap();
        player.x += 123.0;
        player.angle = Some(1.0);
        room.ball.x = 1520.0;
        room.ball.velocity_x = 3.0;
        room.ball.scorer = Some(Kicker {
            id,
            nickname: "nine".to_string(),
            team: Team::Home,
        });

        let now = Instant::now();
        let goal = room.score_goal(Team::Home, now).unwrap();
        assert_eq!(goal.scorer.unwrap().id, id);
        assert!(goal.assister.is_none());

        room.resume_if_due(now + KICKOFF_DELAY);

        assert_eq!((room.ball.x, room.ball.y), room.pitch.center());
        assert_eq!(room.ball.speed(), 0.0);
        assert!(room.ball.scorer.is_none());
        assert!(room.ball.assister.is_none());

        let player = room.occupants[&id].as_field().unwrap();
        assert_eq!((player.x, player.y), room.alignment.slot(Team::Home, 0));
        assert_eq!(player.angle, None);
        assert_eq!(room.score.home, 1);
    }

    #[test]
    fn reaching_score_limit_wipes_scoreboard_only() {
        let mut room = room();
        room.score = Score { home: 4, away: 3 };
        let id = Uuid::new_v4();
        room.admit(id, "keeper");

        let now = Instant::now();
        room.score_goal(Team::Home, now);
        assert_eq!(room.score.home, SCORE_LIMIT);

        room.resume_if_due(now + KICKOFF_DELAY);
        assert_eq!(room.score, Score::default());
        assert_eq!(room.occupant_count(), 1);
        assert_eq!(room.name, "Goals");
        assert!(room.ball_active());
    }

    #[test]
    fn goal_converts_to_server_message() {
        let msg: ServerMsg = GoalEvent {
            team: Team::Away,
            scorer: None,
            assister: None,
        }
        .into();
        assert!(matches!(msg, ServerMsg::Goal { team: Team::Away, .. }));
    }
}
