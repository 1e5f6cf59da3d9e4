//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Defends the left goal, kicks off from the left half
    Home,
    /// Defends the right goal
    Away,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Activate the session inside a room
    Join(JoinRequest),

    /// Desired heading in radians, `None` stops the player
    Move {
        #[serde(default)]
        angle: Option<f32>,
    },

    /// Attempt to kick the ball
    Kick {},

    /// Chat line for the room
    Chat(ChatContent),

    /// Latency probe, answered with `Pong`
    Ping {},
}

impl ClientMsg {
    /// Parse a text frame. A missing `data` reads as `{}`, so `{"event":"ping"}`
    /// is a valid ping.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(envelope) = value.as_object_mut() {
            envelope
                .entry("data")
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
        }
        serde_json::from_value(value)
    }

    /// The `event` name of a frame, even when its payload does not parse
    pub fn event_name(text: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        value.get("event")?.as_str().map(str::to_owned)
    }
}

/// Join payload. Shape is validated by the session before it reaches a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub room: Option<RoomDescriptor>,
}

/// External room identity chosen by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    pub id: String,
    pub name: String,
}

/// Chat content, relayed as-is apart from text clipping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContent {
    /// A line typed by an occupant
    Message { body: ChatBody },
    /// Server notice that an occupant connected or left
    Connection { connected: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub text: String,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full room state, sent every tick and after each successful kick
    Update(RoomSnapshot),

    /// A goal was scored
    Goal {
        team: Team,
        scorer: Option<Kicker>,
        assister: Option<Kicker>,
    },

    /// Chat relay and connect/disconnect notices
    Chat {
        id: Uuid,
        entity: OccupantSnapshot,
        content: ChatContent,
    },

    /// Answer to `Ping`
    Pong {},
}

/// Full state of one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub players: BTreeMap<Uuid, OccupantSnapshot>,
    pub ball: BallSnapshot,
    pub score: Score,
}

/// Occupant as seen by clients. Spectators carry only their nickname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OccupantSnapshot {
    Field(PlayerSnapshot),
    Spectator { nickname: String },
}

/// Field player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub nickname: String,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    pub radius: f32,
    pub mass: f32,
    /// Extra kick reach beyond touching distance
    pub range: f32,
    pub team: Team,
    /// Kickoff alignment slot held by this player
    pub spawn: usize,
    /// Current heading in radians, `None` when standing still
    pub angle: Option<f32>,
}

/// Ball state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub friction: f32,
    pub acceleration: f32,
    pub mass: f32,
    /// Accumulated spin, for rendering only
    pub angle: f32,
    /// False between a goal and the following kickoff
    pub active: bool,
    pub scorer: Option<Kicker>,
    pub assister: Option<Kicker>,
}

/// Identity of a player who touched the ball with a kick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kicker {
    pub id: Uuid,
    pub nickname: String,
    pub team: Team,
}

/// Match score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Home => self.home,
            Team::Away => self.away,
        }
    }

    pub fn bump(&mut self, team: Team) {
        match team {
            Team::Home => self.home += 1,
            Team::Away => self.away += 1,
        }
    }
}

/// Entry of the public room listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    /// Occupants including spectators
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_events() {
        let join: ClientMsg = serde_json::from_value(json!({
            "event": "join",
            "data": { "nickname": "pele", "room": { "id": "r1", "name": "Lobby" } }
        }))
        .unwrap();
        match join {
            ClientMsg::Join(req) => {
                assert_eq!(req.nickname, "pele");
                assert_eq!(req.room.unwrap().id, "r1");
            }
            other => panic!("expected join, got {other:?}"),
        }

        let stop: ClientMsg =
            serde_json::from_value(json!({ "event": "move", "data": { "angle": null } })).unwrap();
        assert!(matches!(stop, ClientMsg::Move { angle: None }));

        let kick: ClientMsg =
            serde_json::from_value(json!({ "event": "kick", "data": {} })).unwrap();
        assert!(matches!(kick, ClientMsg::Kick {}));

        let chat: ClientMsg = serde_json::from_value(json!({
            "event": "chat",
            "data": { "type": "message", "body": { "text": "gg" } }
        }))
        .unwrap();
        match chat {
            ClientMsg::Chat(ChatContent::Message { body }) => assert_eq!(body.text, "gg"),
            other => panic!("expected chat message, got {other:?}"),
        }
    }

    #[test]
    fn join_without_room_still_parses_for_validation() {
        let msg: ClientMsg =
            serde_json::from_value(json!({ "event": "join", "data": { "nickname": "x" } }))
                .unwrap();
        assert!(matches!(msg, ClientMsg::Join(JoinRequest { room: None, .. })));
    }

    #[test]
    fn missing_data_reads_as_empty_payload() {
        assert!(matches!(
            ClientMsg::parse(r#"{"event":"ping"}"#),
            Ok(ClientMsg::Ping {})
        ));
        assert!(matches!(
            ClientMsg::parse(r#"{"event":"kick"}"#),
            Ok(ClientMsg::Kick {})
        ));
        assert!(matches!(
            ClientMsg::parse(r#"{"event":"move"}"#),
            Ok(ClientMsg::Move { angle: None })
        ));
        assert!(matches!(
            ClientMsg::parse(r#"{"event":"kick","data":{}}"#),
            Ok(ClientMsg::Kick {})
        ));
    }

    #[test]
    fn event_name_survives_bad_payload() {
        let text = r#"{"event":"chat","data":{"text":"hi"}}"#;
        assert!(ClientMsg::parse(text).is_err());
        assert_eq!(ClientMsg::event_name(text).as_deref(), Some("chat"));
        assert_eq!(ClientMsg::event_name("not json"), None);
        assert_eq!(ClientMsg::event_name(r#"{"data":{}}"#), None);
    }

    #[test]
    fn spectators_serialize_as_nickname_only() {
        let spectator = OccupantSnapshot::Spectator {
            nickname: "watcher".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&spectator).unwrap(),
            json!({ "nickname": "watcher" })
        );
    }

    #[test]
    fn server_events_use_envelope() {
        let goal = ServerMsg::Goal {
            team: Team::Away,
            scorer: None,
            assister: None,
        };
        let value = serde_json::to_value(&goal).unwrap();
        assert_eq!(value["event"], "goal");
        assert_eq!(value["data"]["team"], "away");

        let pong = serde_json::to_value(ServerMsg::Pong {}).unwrap();
        assert_eq!(pong, json!({ "event": "pong", "data": {} }));
    }

    #[test]
    fn score_bump_targets_team() {
        let mut score = Score::default();
        score.bump(Team::Away);
        score.bump(Team::Away);
        score.bump(Team::Home);
        assert_eq!(score.get(Team::Home), 1);
        assert_eq!(score.get(Team::Away), 2);
    }
}
