//! Room state: pitch, score, ball, occupants and spawn pools

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use uuid::Uuid;

use crate::util::text::{clip, MAX_NICKNAME_CHARS};
use crate::ws::protocol::{Kicker, RoomDescriptor, RoomSummary, Score, Team};

use super::goal::{GoalEvent, PlayPhase};
use super::physics::PhysicsSystem;
use super::pitch::{Alignment, Pitch, SPAWN_SLOTS};

/// Impulse applied to the ball by a successful kick
pub const KICK_FORCE: f32 = 8.0;

/// Free kickoff slots per team.
///
/// A slot index is either queued here or held by exactly one field player.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPools {
    home: VecDeque<usize>,
    away: VecDeque<usize>,
}

impl SpawnPools {
    pub fn full() -> Self {
        Self {
            home: (0..SPAWN_SLOTS).collect(),
            away: (0..SPAWN_SLOTS).collect(),
        }
    }

    fn pool_mut(&mut self, team: Team) -> &mut VecDeque<usize> {
        match team {
            Team::Home => &mut self.home,
            Team::Away => &mut self.away,
        }
    }

    /// Take a slot from the team with more free slots (ties go to home).
    /// Returns `None` once both pools are exhausted.
    pub fn claim(&mut self) -> Option<(Team, usize)> {
        let team = if self.home.len() >= self.away.len() {
            Team::Home
        } else {
            Team::Away
        };
        self.pool_mut(team).pop_front().map(|slot| (team, slot))
    }

    /// Return a slot to the back of its team's pool
    pub fn release(&mut self, team: Team, slot: usize) {
        let pool = self.pool_mut(team);
        if !pool.contains(&slot) {
            pool.push_back(slot);
        }
    }
}

#[cfg(test)]
impl SpawnPools {
    fn pool(&self, team: Team) -> &VecDeque<usize> {
        match team {
            Team::Home => &self.home,
            Team::Away => &self.away,
        }
    }

    pub fn available(&self, team: Team) -> usize {
        self.pool(team).len()
    }

    pub fn contains(&self, team: Team, slot: usize) -> bool {
        self.pool(team).contains(&slot)
    }
}

impl Default for SpawnPools {
    fn default() -> Self {
        Self::full()
    }
}

/// A player on the pitch
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlayer {
    pub nickname: String,
    pub team: Team,
    pub spawn: usize,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub mass: f32,
    pub range: f32,
    /// Desired heading in radians, `None` while standing still
    pub angle: Option<f32>,
}

impl FieldPlayer {
    pub fn new(nickname: String, team: Team, spawn: usize, (x, y): (f32, f32)) -> Self {
        Self {
            nickname,
            team,
            spawn,
            x,
            y,
            radius: 20.0,
            mass: 10.0,
            range: 10.0,
            angle: None,
        }
    }

    /// Farthest ball-center distance from which a kick connects
    pub fn kick_reach(&self, ball: &Ball) -> f32 {
        self.radius + ball.radius + self.range
    }
}

/// Anyone connected to a room
#[derive(Debug, Clone, PartialEq)]
pub enum Occupant {
    /// Present for chat only, takes no part in physics
    Spectator { nickname: String },
    Field(FieldPlayer),
}

impl Occupant {
    pub fn nickname(&self) -> &str {
        match self {
            Self::Spectator { nickname } => nickname,
            Self::Field(player) => &player.nickname,
        }
    }

    pub fn as_field(&self) -> Option<&FieldPlayer> {
        match self {
            Self::Field(player) => Some(player),
            Self::Spectator { .. } => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut FieldPlayer> {
        match self {
            Self::Field(player) => Some(player),
            Self::Spectator { .. } => None,
        }
    }
}

/// The match ball
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    /// Per-tick velocity retention
    pub friction: f32,
    /// Impulse gained when a player bumps into the ball
    pub acceleration: f32,
    pub mass: f32,
    /// Accumulated spin
    pub angle: f32,
    pub scorer: Option<Kicker>,
    pub assister: Option<Kicker>,
}

impl Ball {
    /// Stationary ball at `(x, y)`
    pub fn at((x, y): (f32, f32)) -> Self {
        Self {
            x,
            y,
            radius: 10.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            friction: 0.98,
            acceleration: 0.3,
            mass: 4.0,
            angle: 0.0,
            scorer: None,
            assister: None,
        }
    }

    pub fn speed(&self) -> f32 {
        (self.velocity_x * self.velocity_x + self.velocity_y * self.velocity_y).sqrt()
    }

    /// Push the kick chain: the previous scorer becomes the assister
    /// unless the same player kicks again.
    pub fn record_kick(&mut self, kicker: Kicker) {
        match self.scorer.take() {
            Some(previous) if previous.id != kicker.id => self.assister = Some(previous),
            _ => {}
        }
        self.scorer = Some(kicker);
    }
}

/// One independent match
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub pitch: Pitch,
    pub alignment: Alignment,
    pub score: Score,
    pub ball: Ball,
    /// Keyed by connection id; ordered so physics runs deterministically
    pub occupants: BTreeMap<Uuid, Occupant>,
    pub spawn_pools: SpawnPools,
    pub phase: PlayPhase,
}

impl Room {
    pub fn new(descriptor: &RoomDescriptor) -> Self {
        let pitch = Pitch::default();
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            pitch,
            alignment: Alignment::default(),
            score: Score::default(),
            ball: Ball::at(pitch.center()),
            occupants: BTreeMap::new(),
            spawn_pools: SpawnPools::full(),
            phase: PlayPhase::Live,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            count: self.occupant_count(),
        }
    }

    pub fn field_players(&self) -> impl Iterator<Item = (&Uuid, &FieldPlayer)> {
        self.occupants
            .iter()
            .filter_map(|(id, occupant)| occupant.as_field().map(|player| (id, player)))
    }

    /// One simulation tick: a due kickoff reset first, then physics
    pub fn tick(&mut self, now: Instant) -> Option<GoalEvent> {
        self.resume_if_due(now);
        PhysicsSystem::step(self, now)
    }

    /// Seat a new occupant: a free kickoff slot if any remain, else the stands.
    pub fn admit(&mut self, id: Uuid, nickname: &str) -> &Occupant {
        if self.occupants.contains_key(&id) {
            return &self.occupants[&id];
        }

        let nickname = clip(nickname, MAX_NICKNAME_CHARS);
        let occupant = match self.spawn_pools.claim() {
            Some((team, slot)) => Occupant::Field(FieldPlayer::new(
                nickname,
                team,
                slot,
                self.alignment.slot(team, slot),
            )),
            None => Occupant::Spectator { nickname },
        };
        self.occupants.entry(id).or_insert(occupant)
    }

    /// Remove an occupant and hand its slot back to the pool
    pub fn release(&mut self, id: Uuid) -> Option<Occupant> {
        let occupant = self.occupants.remove(&id)?;
        if let Occupant::Field(player) = &occupant {
            self.spawn_pools.release(player.team, player.spawn);
        }
        Some(occupant)
    }

    /// Set a field player's heading. Returns false for unknown ids and spectators.
    pub fn set_heading(&mut self, id: Uuid, angle: Option<f32>) -> bool {
        match self.occupants.get_mut(&id).and_then(Occupant::as_field_mut) {
            Some(player) => {
                player.angle = angle;
                true
            }
            None => false,
        }
    }

    /// Kick the ball if `id` is a field player within reach.
    pub fn kick(&mut self, id: Uuid) -> bool {
        let Some(player) = self.occupants.get(&id).and_then(Occupant::as_field) else {
            return false;
        };

        let distance = PhysicsSystem::distance(player.x, player.y, self.ball.x, self.ball.y);
        if distance > player.kick_reach(&self.ball) {
            return false;
        }

        let angle = (self.ball.y - player.y).atan2(self.ball.x - player.x);
        self.ball.velocity_x += angle.cos() * KICK_FORCE;
        self.ball.velocity_y += angle.sin() * KICK_FORCE;

        let kicker = Kicker {
            id,
            nickname: player.nickname.clone(),
            team: player.team,
        };
        self.ball.record_kick(kicker);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new(&RoomDescriptor {
            id: "r1".to_string(),
            name: "Sunday League".to_string(),
        })
    }

    fn team_counts(room: &Room) -> (usize, usize) {
        room.field_players()
            .fold((0, 0), |(home, away), (_, p)| match p.team {
                Team::Home => (home + 1, away),
                Team::Away => (home, away + 1),
            })
    }

    #[test]
    fn new_room_is_empty_with_centered_ball() {
        let room = room();
        assert!(room.is_empty());
        assert_eq!((room.ball.x, room.ball.y), room.pitch.center());
        assert_eq!(room.ball.speed(), 0.0);
        assert_eq!(room.score, Score::default());
        assert_eq!(room.spawn_pools.available(Team::Home), SPAWN_SLOTS);
        assert_eq!(room.spawn_pools.available(Team::Away), SPAWN_SLOTS);
    }

    #[test]
    fn first_two_joins_take_slot_zero_on_each_side() {
        let mut room = room();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        room.admit(first, "alpha");
        room.admit(second, "bravo");

        let a = room.occupants[&first].as_field().unwrap();
        assert_eq!((a.team, a.spawn), (Team::Home, 0));
        assert_eq!((a.x, a.y), room.alignment.slot(Team::Home, 0));
        assert_eq!(a.angle, None);

        let b = room.occupants[&second].as_field().unwrap();
        assert_eq!((b.team, b.spawn), (Team::Away, 0));
    }

    #[test]
    fn teams_stay_balanced_and_overflow_spectates() {
        let mut room = room();
        for i in 0..(SPAWN_SLOTS * 2 + 3) {
            room.admit(Uuid::new_v4(), &format!("p{i}"));
            let (home, away) = team_counts(&room);
            assert!(home.abs_diff(away) <= 1);
        }

        assert_eq!(room.field_players().count(), SPAWN_SLOTS * 2);
        let spectators = room
            .occupants
            .values()
            .filter(|o| matches!(o, Occupant::Spectator { .. }))
            .count();
        assert_eq!(spectators, 3);
    }

    #[test]
    fn slots_are_exclusive_and_recycled() {
        let mut room = room();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            room.admit(*id, "p");
        }

        // ids[0] holds home slot 0
        let freed = room.release(ids[0]).unwrap();
        let freed = freed.as_field().unwrap();
        assert!(room.spawn_pools.contains(Team::Home, freed.spawn));

        for (_, player) in room.field_players() {
            assert!(!room.spawn_pools.contains(player.team, player.spawn));
        }

        // Home now has more free slots, so the next join lands there; slot 0
        // went to the back of the queue behind slot 2
        let late = Uuid::new_v4();
        room.admit(late, "late");
        let late = room.occupants[&late].as_field().unwrap();
        assert_eq!((late.team, late.spawn), (Team::Home, 2));
    }

    #[test]
    fn nickname_is_clipped() {
        let mut room = room();
        let id = Uuid::new_v4();
        let occupant = room.admit(id, &"n".repeat(40));
        assert_eq!(occupant.nickname().len(), MAX_NICKNAME_CHARS);
    }

    #[test]
    fn spectators_cannot_move_or_kick() {
        let mut room = room();
        for _ in 0..SPAWN_SLOTS * 2 {
            room.admit(Uuid::new_v4(), "p");
        }
        let spectator = Uuid::new_v4();
        room.admit(spectator, "fan");

        assert!(!room.set_heading(spectator, Some(0.0)));
        assert!(!room.kick(spectator));
        assert!(!room.set_heading(Uuid::new_v4(), Some(0.0)));
    }

    #[test]
    fn kick_reach_is_inclusive() {
        let mut room = room();
        let id = Uuid::new_v4();
        room.admit(id, "striker");

        let (bx, by) = room.pitch.center();
        let reach = {
            let player = room.occupants[&id].as_field().unwrap();
            player.kick_reach(&room.ball)
        };
        assert_eq!(reach, 40.0);

        let player = room.occupants.get_mut(&id).unwrap().as_field_mut().unwrap();
        player.x = bx - reach - 0.01;
        player.y = by;
        assert!(!room.kick(id));
        assert_eq!(room.ball.speed(), 0.0);
        assert!(room.ball.scorer.is_none());

        let player = room.occupants.get_mut(&id).unwrap().as_field_mut().unwrap();
        player.x = bx - reach;
        assert!(room.kick(id));
        assert!((room.ball.velocity_x - KICK_FORCE).abs() < 1e-4);
        assert!(room.ball.velocity_y.abs() < 1e-4);
    }

    #[test]
    fn kick_points_away_from_player_and_builds_chain() {
        let mut room = room();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        room.admit(first, "alpha");
        room.admit(second, "bravo");

        let (bx, by) = room.pitch.center();
        let p = room.occupants.get_mut(&first).unwrap().as_field_mut().unwrap();
        p.x = bx - 30.0;
        p.y = by;

        assert!(room.kick(first));
        assert!(room.ball.velocity_x > 0.0);
        assert!((room.ball.speed() - KICK_FORCE).abs() < 1e-4);
        assert_eq!(room.ball.scorer.as_ref().unwrap().id, first);
        assert!(room.ball.assister.is_none());

        let p = room.occupants.get_mut(&second).unwrap().as_field_mut().unwrap();
        p.x = bx + 30.0;
        p.y = by;

        assert!(room.kick(second));
        let scorer = room.ball.scorer.as_ref().unwrap();
        assert_eq!((scorer.id, scorer.team), (second, Team::Away));
        assert_eq!(room.ball.assister.as_ref().unwrap().id, first);
    }

    #[test]
    fn repeat_kick_keeps_distinct_assister() {
        let mut ball = Ball::at((0.0, 0.0));
        let a = Kicker {
            id: Uuid::new_v4(),
            nickname: "a".to_string(),
            team: Team::Home,
        };
        let b = Kicker {
            id: Uuid::new_v4(),
            nickname: "b".to_string(),
            team: Team::Home,
        };

        ball.record_kick(a.clone());
        ball.record_kick(a.clone());
        assert_eq!(ball.scorer, Some(a.clone()));
        assert!(ball.assister.is_none());

        ball.record_kick(b.clone());
        ball.record_kick(b.clone());
        assert_eq!(ball.scorer, Some(b));
        assert_eq!(ball.assister, Some(a));
    }
}
