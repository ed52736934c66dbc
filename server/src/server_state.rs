use crate::canvas_store::CanvasStore;
use crate::presence::{Participant, PresenceTracker};
use std::collections::{HashMap, VecDeque};
use std::num::Wrapping;
use system::{ConnectionId, IdentifiableCommand, Permission, RoomId};
use thiserror::Error;

pub enum ConnectionState {
    Connected,
    /// Waiting for the room directory. Commands arriving meanwhile are held
    /// back so they run after the join, in order.
    /// A joined connection stays in its room until the new join resolves.
    Authenticating {
        pending: VecDeque<IdentifiableCommand>,
    },
    /// Room and permission live in the presence tracker.
    Joined,
}

#[derive(Debug, Error, PartialEq)]
pub enum ServerError {
    #[error("unknown connection {0}")]
    InvalidConnectionId(ConnectionId),
    #[error("command is not valid in the current connection state")]
    InvalidCommandForState,
}

/// Result of a connection leaving its room.
#[derive(Debug, PartialEq)]
pub struct Departure {
    pub room_id: RoomId,
    /// The room has nobody left; its snapshot was evicted.
    pub emptied: bool,
}

pub struct ServerState {
    connection_id_source: Wrapping<ConnectionId>,
    connection_states: HashMap<ConnectionId, ConnectionState>,
    pub presence: PresenceTracker,
    pub canvas: Box<dyn CanvasStore>,
}

impl ServerState {
    pub fn new(canvas: Box<dyn CanvasStore>) -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connection_states: HashMap::new(),
            presence: PresenceTracker::new(),
            canvas,
        }
    }

    pub fn create_connection(&mut self) -> ConnectionId {
        let connection_id = self.new_connection_id();
        self.connection_states
            .insert(connection_id, ConnectionState::Connected);
        connection_id
    }

    pub fn connection_state(&self, connection_id: ConnectionId) -> Option<&ConnectionState> {
        self.connection_states.get(&connection_id)
    }

    /// Room and permission of a joined connection.
    pub fn joined_room(&self, connection_id: ConnectionId) -> Option<(&RoomId, Permission)> {
        match self.connection_states.get(&connection_id) {
            Some(ConnectionState::Joined) => {
                let room_id = self.presence.room_of(connection_id)?;
                let participant = self.presence.participant(connection_id)?;
                Some((room_id, participant.permission))
            }
            _ => None,
        }
    }

    /// Holds `command` back if the connection is authenticating, otherwise hands it back.
    pub fn defer_if_authenticating(
        &mut self,
        connection_id: ConnectionId,
        command: IdentifiableCommand,
    ) -> Option<IdentifiableCommand> {
        match self.connection_states.get_mut(&connection_id) {
            Some(ConnectionState::Authenticating { pending }) => {
                pending.push_back(command);
                None
            }
            _ => Some(command),
        }
    }

    pub fn begin_authentication(&mut self, connection_id: ConnectionId) -> Result<(), ServerError> {
        let state = self
            .connection_states
            .get_mut(&connection_id)
            .ok_or(ServerError::InvalidConnectionId(connection_id))?;
        match state {
            ConnectionState::Connected | ConnectionState::Joined => {
                *state = ConnectionState::Authenticating {
                    pending: VecDeque::new(),
                };
                Ok(())
            }
            ConnectionState::Authenticating { .. } => Err(ServerError::InvalidCommandForState),
        }
    }

    /// Returns the connection to `Joined` if it is still in a room, `Connected`
    /// otherwise, yielding the commands held back meanwhile.
    pub fn finish_authentication(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<VecDeque<IdentifiableCommand>, ServerError> {
        let state = self
            .connection_states
            .get_mut(&connection_id)
            .ok_or(ServerError::InvalidConnectionId(connection_id))?;
        match std::mem::replace(state, ConnectionState::Connected) {
            ConnectionState::Authenticating { pending } => {
                if self.presence.room_of(connection_id).is_some() {
                    *state = ConnectionState::Joined;
                }
                Ok(pending)
            }
            previous => {
                *state = previous;
                Err(ServerError::InvalidCommandForState)
            }
        }
    }

    /// Places a `Connected` connection into `room_id`. A connection already
    /// joined to `room_id` keeps its place and takes the new name and permission.
    pub fn join_room(
        &mut self,
        room_id: &RoomId,
        participant: Participant,
    ) -> Result<(), ServerError> {
        let connection_id = participant.connection_id;
        let state = self
            .connection_states
            .get_mut(&connection_id)
            .ok_or(ServerError::InvalidConnectionId(connection_id))?;
        let rejoining = match state {
            ConnectionState::Connected => false,
            ConnectionState::Joined
                if self.presence.room_of(connection_id) == Some(room_id) =>
            {
                true
            }
            _ => return Err(ServerError::InvalidCommandForState),
        };
        *state = ConnectionState::Joined;
        log::info!(
            "Connection {} {} room {} as {:?}",
            connection_id,
            if rejoining { "rejoined" } else { "joined" },
            room_id,
            participant.display_name
        );
        if rejoining {
            self.presence.update(participant);
        } else {
            self.presence.add(room_id, participant);
        }
        Ok(())
    }

    /// Takes the connection out of its room, evicting the snapshot of a room
    /// left empty. Safe to call repeatedly.
    pub fn leave_room(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        if let Some(state) = self.connection_states.get_mut(&connection_id) {
            if let ConnectionState::Joined = state {
                *state = ConnectionState::Connected;
            }
        }
        let room_id = self.presence.remove(connection_id)?;
        log::info!("Connection {} left room {}", connection_id, room_id);
        let emptied = self.presence.is_empty(&room_id);
        if emptied {
            self.canvas.evict(&room_id);
            log::info!("Room {} is empty, canvas evicted", room_id);
        }
        Some(Departure { room_id, emptied })
    }

    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let departure = self.leave_room(connection_id);
        self.connection_states.remove(&connection_id);
        departure
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }
}
