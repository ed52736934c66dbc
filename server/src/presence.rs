use std::collections::HashMap;
use system::{ConnectionId, Permission, RoomId};

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub permission: Permission,
}

/// Who is in which room, in join order.
///
/// Pure state: the gateway broadcasts rosters after each mutation.
#[derive(Default)]
pub struct PresenceTracker {
    rooms: HashMap<RoomId, Vec<Participant>>,
    connection_locations: HashMap<ConnectionId, RoomId>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `participant` to `room_id`. A connection already placed in a
    /// room is moved, keeping the one-room-per-connection invariant.
    pub fn add(&mut self, room_id: &RoomId, participant: Participant) {
        if let Some(previous) = self.remove(participant.connection_id) {
            log::warn!(
                "Connection {} moved from room {} to {} without leaving",
                participant.connection_id,
                previous,
                room_id
            );
        }
        self.connection_locations
            .insert(participant.connection_id, room_id.clone());
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(Vec::new)
            .push(participant);
    }

    /// Replaces a participant in place, keeping its position in the roster.
    /// Returns false when the connection is in no room.
    pub fn update(&mut self, participant: Participant) -> bool {
        let room_id = match self.connection_locations.get(&participant.connection_id) {
            Some(room_id) => room_id,
            None => return false,
        };
        let slot = self.rooms.get_mut(room_id).and_then(|participants| {
            participants
                .iter_mut()
                .find(|p| p.connection_id == participant.connection_id)
        });
        match slot {
            Some(slot) => {
                *slot = participant;
                true
            }
            None => false,
        }
    }

    /// Returns the room the connection was in. Unknown connections are a no-op.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<RoomId> {
        let room_id = self.connection_locations.remove(&connection_id)?;
        let now_empty = match self.rooms.get_mut(&room_id) {
            Some(participants) => {
                participants.retain(|p| p.connection_id != connection_id);
                participants.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove(&room_id);
        }
        Some(room_id)
    }

    pub fn list_names(&self, room_id: &RoomId) -> Vec<String> {
        self.participants(room_id)
            .iter()
            .map(|p| p.display_name.clone())
            .collect()
    }

    pub fn is_empty(&self, room_id: &RoomId) -> bool {
        self.participants(room_id).is_empty()
    }

    pub fn connections(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.participants(room_id)
            .iter()
            .map(|p| p.connection_id)
            .collect()
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&RoomId> {
        self.connection_locations.get(&connection_id)
    }

    pub fn participant(&self, connection_id: ConnectionId) -> Option<&Participant> {
        let room_id = self.room_of(connection_id)?;
        self.participants(room_id)
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    fn participants(&self, room_id: &RoomId) -> &[Participant] {
        self.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
