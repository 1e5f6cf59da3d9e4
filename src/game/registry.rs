//! Registry of all live rooms

use std::collections::HashMap;

use tokio::sync::broadcast;
use tracing::info;

use crate::ws::protocol::{RoomDescriptor, RoomSummary, ServerMsg};

use super::room::Room;
use super::snapshot::SnapshotBuilder;

/// Per-room fan-out buffer. Slow clients skip ahead instead of stalling the room.
pub const ROOM_BROADCAST_CAPACITY: usize = 64;

/// A live room and the channel its members listen on
pub struct RoomEntry {
    pub room: Room,
    events: broadcast::Sender<ServerMsg>,
}

impl RoomEntry {
    fn new(room: Room) -> Self {
        let (events, _) = broadcast::channel(ROOM_BROADCAST_CAPACITY);
        Self { room, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events.subscribe()
    }

    /// Send to every member. Nobody listening is not an error.
    pub fn broadcast(&self, msg: ServerMsg) {
        let _ = self.events.send(msg);
    }

    pub fn broadcast_snapshot(&self) {
        self.broadcast(SnapshotBuilder::build(&self.room));
    }
}

/// Owns every room, keyed by the client-chosen room id.
///
/// A room is present exactly while it has at least one occupant: the
/// arena creates it on first join and removes it when the last one leaves.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, RoomEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the room for `descriptor.id`, creating it on first use.
    /// An existing room keeps its original name.
    pub fn get_or_create(&mut self, descriptor: &RoomDescriptor) -> &mut RoomEntry {
        self.rooms.entry(descriptor.id.clone()).or_insert_with(|| {
            info!(room_id = %descriptor.id, room_name = %descriptor.name, "Room created");
            RoomEntry::new(Room::new(descriptor))
        })
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RoomEntry> {
        self.rooms.get_mut(id)
    }

    /// Drop a room. Its broadcast channel closes with it.
    pub fn remove(&mut self, id: &str) -> Option<Room> {
        let entry = self.rooms.remove(id)?;
        info!(room_id = %id, active_rooms = self.rooms.len(), "Room removed");
        Some(entry.room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoomEntry> {
        self.rooms.values_mut()
    }

    /// Public listing, sorted by room id
    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self.rooms.values().map(|e| e.room.summary()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn descriptor(id: &str, name: &str) -> RoomDescriptor {
        RoomDescriptor {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut registry = RoomRegistry::new();
        registry
            .get_or_create(&descriptor("r1", "First"))
            .room
            .admit(Uuid::new_v4(), "a");

        let entry = registry.get_or_create(&descriptor("r1", "Renamed"));
        assert_eq!(entry.room.name, "First");
        assert_eq!(entry.room.occupant_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removed_room_comes_back_fresh() {
        let mut registry = RoomRegistry::new();
        let entry = registry.get_or_create(&descriptor("r1", "First"));
        entry.room.admit(Uuid::new_v4(), "a");
        entry.room.score.home = 3;

        assert!(registry.remove("r1").is_some());
        assert!(registry.get_mut("r1").is_none());
        assert!(registry.remove("r1").is_none());

        let entry = registry.get_or_create(&descriptor("r1", "Second"));
        assert_eq!(entry.room.name, "Second");
        assert!(entry.room.is_empty());
        assert_eq!(entry.room.score.home, 0);
    }

    #[test]
    fn summaries_are_sorted_with_counts() {
        let mut registry = RoomRegistry::new();
        let b = registry.get_or_create(&descriptor("b", "Bravo"));
        b.room.admit(Uuid::new_v4(), "x");
        b.room.admit(Uuid::new_v4(), "y");
        registry
            .get_or_create(&descriptor("a", "Alpha"))
            .room
            .admit(Uuid::new_v4(), "z");

        let summaries = registry.summaries();
        assert_eq!(
            summaries,
            vec![
                RoomSummary {
                    id: "a".to_string(),
                    name: "Alpha".to_string(),
                    count: 1
                },
                RoomSummary {
                    id: "b".to_string(),
                    name: "Bravo".to_string(),
                    count: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn removing_a_room_closes_its_channel() {
        let mut registry = RoomRegistry::new();
        let mut rx = registry.get_or_create(&descriptor("r1", "First")).subscribe();
        registry.remove("r1");
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
