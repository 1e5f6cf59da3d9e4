//! Arena task: owns the room registry and drives the shared tick loop
//!
//! Every room mutation (joins, moves, kicks, chat, leaves and ticks) runs
//! inside this one task, in the order it arrives. Sessions reach it through
//! an [`ArenaHandle`].

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::text::{clip, MAX_CHAT_CHARS};
use crate::util::time::tick_duration;
use crate::ws::protocol::{ChatBody, ChatContent, RoomDescriptor, RoomSummary, ServerMsg};

use super::registry::RoomRegistry;
use super::snapshot::SnapshotBuilder;

/// Commands queued by sessions and HTTP handlers
#[derive(Debug)]
pub enum ArenaCommand {
    Join {
        conn_id: Uuid,
        nickname: String,
        room: RoomDescriptor,
        reply: oneshot::Sender<JoinTicket>,
    },
    Move {
        conn_id: Uuid,
        room_id: String,
        angle: Option<f32>,
    },
    Kick {
        conn_id: Uuid,
        room_id: String,
    },
    Chat {
        conn_id: Uuid,
        room_id: String,
        content: ChatContent,
    },
    Leave {
        conn_id: Uuid,
        room_id: String,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
}

/// What a session gets back from a successful join
#[derive(Debug)]
pub struct JoinTicket {
    /// Room broadcast stream, subscribed before the join notice went out
    pub events: broadcast::Receiver<ServerMsg>,
    /// Full state for the joiner alone
    pub snapshot: ServerMsg,
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("Arena task is not running")]
    Closed,
}

/// Cloneable handle for talking to the arena task
#[derive(Clone)]
pub struct ArenaHandle {
    commands: mpsc::Sender<ArenaCommand>,
}

impl ArenaHandle {
    async fn send(&self, cmd: ArenaCommand) -> Result<(), ArenaError> {
        self.commands.send(cmd).await.map_err(|_| ArenaError::Closed)
    }

    pub async fn join(
        &self,
        conn_id: Uuid,
        nickname: String,
        room: RoomDescriptor,
    ) -> Result<JoinTicket, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArenaCommand::Join {
            conn_id,
            nickname,
            room,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }

    pub async fn steer(
        &self,
        conn_id: Uuid,
        room_id: String,
        angle: Option<f32>,
    ) -> Result<(), ArenaError> {
        self.send(ArenaCommand::Move {
            conn_id,
            room_id,
            angle,
        })
        .await
    }

    pub async fn kick(&self, conn_id: Uuid, room_id: String) -> Result<(), ArenaError> {
        self.send(ArenaCommand::Kick { conn_id, room_id }).await
    }

    pub async fn chat(
        &self,
        conn_id: Uuid,
        room_id: String,
        content: ChatContent,
    ) -> Result<(), ArenaError> {
        self.send(ArenaCommand::Chat {
            conn_id,
            room_id,
            content,
        })
        .await
    }

    pub async fn leave(&self, conn_id: Uuid, room_id: String) -> Result<(), ArenaError> {
        self.send(ArenaCommand::Leave { conn_id, room_id }).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.send(ArenaCommand::ListRooms { reply }).await?;
        rx.await.map_err(|_| ArenaError::Closed)
    }
}

/// Command queue depth between sessions and the arena
const COMMAND_CAPACITY: usize = 1024;

/// The single owner of all room state
pub struct Arena {
    registry: RoomRegistry,
    commands: mpsc::Receiver<ArenaCommand>,
}

impl Arena {
    pub fn new() -> (Self, ArenaHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let arena = Self {
            registry: RoomRegistry::new(),
            commands: rx,
        };
        (arena, ArenaHandle { commands: tx })
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("Arena started");

        let mut ticker = interval(tick_duration());
        // A late tick pushes the schedule back rather than bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_all(Instant::now().into_std());
                }
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }

        info!(rooms = self.registry.len(), "Arena stopped");
    }

    /// Advance every live room by one tick and broadcast its state
    fn tick_all(&mut self, now: std::time::Instant) {
        for entry in self.registry.iter_mut() {
            if let Some(goal) = entry.room.tick(now) {
                entry.broadcast(goal.into());
            }
            entry.broadcast_snapshot();
        }
    }

    fn handle(&mut self, cmd: ArenaCommand) {
        match cmd {
            ArenaCommand::Join {
                conn_id,
                nickname,
                room,
                reply,
            } => {
                let ticket = self.handle_join(conn_id, &nickname, &room);
                if reply.send(ticket).is_err() {
                    // Session went away while waiting
                    self.handle_leave(conn_id, &room.id);
                }
            }
            ArenaCommand::Move {
                conn_id,
                room_id,
                angle,
            } => {
                if let Some(entry) = self.registry.get_mut(&room_id) {
                    entry.room.set_heading(conn_id, angle);
                }
            }
            ArenaCommand::Kick { conn_id, room_id } => {
                if let Some(entry) = self.registry.get_mut(&room_id) {
                    if entry.room.kick(conn_id) {
                        entry.broadcast_snapshot();
                    }
                }
            }
            ArenaCommand::Chat {
                conn_id,
                room_id,
                content,
            } => self.handle_chat(conn_id, &room_id, content),
            ArenaCommand::Leave { conn_id, room_id } => self.handle_leave(conn_id, &room_id),
            ArenaCommand::ListRooms { reply } => {
                let _ = reply.send(self.registry.summaries());
            }
        }
    }

    fn handle_join(&mut self, conn_id: Uuid, nickname: &str, room: &RoomDescriptor) -> JoinTicket {
        let entry = self.registry.get_or_create(room);
        let events = entry.subscribe();

        let occupant = entry.room.admit(conn_id, nickname);
        let seated = occupant.as_field().is_some();
        let entity = SnapshotBuilder::occupant(occupant);
        let snapshot = SnapshotBuilder::build(&entry.room);

        info!(
            room_id = %room.id,
            conn_id = %conn_id,
            seated,
            occupants = entry.room.occupant_count(),
            field_players = entry.room.field_players().count(),
            "Occupant joined room"
        );

        entry.broadcast(ServerMsg::Chat {
            id: conn_id,
            entity,
            content: ChatContent::Connection { connected: true },
        });

        JoinTicket { events, snapshot }
    }

    fn handle_chat(&mut self, conn_id: Uuid, room_id: &str, content: ChatContent) {
        let Some(entry) = self.registry.get_mut(room_id) else {
            return;
        };
        let Some(occupant) = entry.room.occupants.get(&conn_id) else {
            return;
        };

        let content = match content {
            ChatContent::Message { body } => ChatContent::Message {
                body: ChatBody {
                    text: clip(&body.text, MAX_CHAT_CHARS),
                },
            },
            ChatContent::Connection { .. } => {
                debug!(conn_id = %conn_id, "Ignoring client-sent connection notice");
                return;
            }
        };

        let entity = SnapshotBuilder::occupant(occupant);
        entry.broadcast(ServerMsg::Chat {
            id: conn_id,
            entity,
            content,
        });
    }

    fn handle_leave(&mut self, conn_id: Uuid, room_id: &str) {
        let Some(entry) = self.registry.get_mut(room_id) else {
            return;
        };
        let Some(occupant) = entry.room.release(conn_id) else {
            return;
        };

        info!(
            room_id = %room_id,
            conn_id = %conn_id,
            nickname = %occupant.nickname(),
            occupants = entry.room.occupant_count(),
            "Occupant left room"
        );

        entry.broadcast_snapshot();
        entry.broadcast(ServerMsg::Chat {
            id: conn_id,
            entity: SnapshotBuilder::occupant(&occupant),
            content: ChatContent::Connection { connected: false },
        });

        if entry.room.is_empty() {
            self.registry.remove(room_id);
        }
    }
}
