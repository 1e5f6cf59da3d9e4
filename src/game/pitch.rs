//! Pitch geometry and kickoff alignment

use crate::ws::protocol::Team;

/// Kickoff slots per team
pub const SPAWN_SLOTS: usize = 4;

/// Slack around the goal mouth within which the ball still enters the cavity
pub const GOAL_MOUTH_TOLERANCE: f32 = 10.0;

/// Depth of the goal cavity behind each goal line
pub const GOAL_DEPTH: f32 = 85.0;

/// Static playing field layout, in world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    pub width: f32,
    pub height: f32,
    /// Offset of the left touchline from world origin
    pub margin_x: f32,
    /// Offset of the top touchline from world origin
    pub margin_y: f32,
    /// Half-width of the goal mouth
    pub goal_side: f32,
}

impl Default for Pitch {
    fn default() -> Self {
        Self {
            width: 1100.0,
            height: 750.0,
            margin_x: 400.0,
            margin_y: 400.0,
            goal_side: 125.0,
        }
    }
}

impl Pitch {
    pub fn left(&self) -> f32 {
        self.margin_x
    }

    pub fn right(&self) -> f32 {
        self.margin_x + self.width
    }

    pub fn top(&self) -> f32 {
        self.margin_y
    }

    pub fn bottom(&self) -> f32 {
        self.margin_y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.width / 2.0 + self.margin_x,
            self.height / 2.0 + self.margin_y,
        )
    }

    /// Upper and lower post of the goal mouth (y coordinates)
    pub fn goal_posts(&self) -> (f32, f32) {
        let (_, cy) = self.center();
        (cy - self.goal_side, cy + self.goal_side)
    }

    /// Whether a ball at `y` with `radius` lines up with the goal mouth
    pub fn in_goal_band(&self, y: f32, radius: f32) -> bool {
        let (upper, lower) = self.goal_posts();
        y - radius > upper - GOAL_MOUTH_TOLERANCE && y + radius < lower + GOAL_MOUTH_TOLERANCE
    }
}

/// Kickoff coordinates, one per spawn slot and team
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    home: [(f32, f32); SPAWN_SLOTS],
    away: [(f32, f32); SPAWN_SLOTS],
}

impl Default for Alignment {
    fn default() -> Self {
        Self {
            home: [(600.0, 775.0), (700.0, 650.0), (700.0, 900.0), (800.0, 775.0)],
            away: [(1300.0, 775.0), (1200.0, 650.0), (1200.0, 900.0), (1100.0, 775.0)],
        }
    }
}

impl Alignment {
    /// Coordinates of `slot` for `team`. Slots come from the spawn pools,
    /// which only ever hold indices below `SPAWN_SLOTS`.
    pub fn slot(&self, team: Team, slot: usize) -> (f32, f32) {
        let slots = match team {
            Team::Home => &self.home,
            Team::Away => &self.away,
        };
        slots[slot % SPAWN_SLOTS]
    }
}
