use std::sync::Arc;
use tokio::sync::mpsc::{channel, Sender};

use system::{
    ChatMessage, ClientCommand, CommandId, ConnectionId, Drawing, IdentifiableCommand,
    IdentifiableEvent, JoinReply, JoinRoom, Permission, RoomId, RoomScoped, ServerEvent,
};

use super::connection::{ConnectionCommand, ConnectionEvent};
use crate::canvas_store::CanvasStore;
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::presence::Participant;
use crate::room_directory::{DirectoryError, Room, RoomDirectory};
use crate::server_state::ServerState;

pub type ServerTx = Sender<ConnectionCommand>;

/// Connection actors never wait on a full inbox. Commands arriving beyond
/// this are dropped at the actor; a dropped `join-room` is answered there
/// with a server error.
const SERVER_QUEUE_CAPACITY: usize = 1024;
const JOIN_QUEUE_CAPACITY: usize = 64;

/// Outcome of a room directory round trip started by a `join-room`.
#[derive(Debug)]
struct JoinResolution {
    from: ConnectionId,
    ack: Option<CommandId>,
    request: JoinRoom,
    outcome: Result<Room, DirectoryError>,
}

struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
    directory: Arc<RoomDirectory>,
    join_tx: Sender<JoinResolution>,
}

impl Server {
    fn new(
        directory: RoomDirectory,
        canvas: Box<dyn CanvasStore>,
        join_tx: Sender<JoinResolution>,
    ) -> Self {
        Self {
            server_state: ServerState::new(canvas),
            connections: ConnectionTxStorage::new(),
            directory: Arc::new(directory),
            join_tx,
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => {
                let connection_id = self.server_state.create_connection();
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(connection_id, ConnectionEvent::Connected { connection_id });
                log::info!("Connection {} opened", connection_id);
            }
            ConnectionCommand::Disconnect { from } => self.disconnect(from),
            ConnectionCommand::IdentifiableCommand { from, command } => {
                if self.server_state.connection_state(from).is_none() {
                    log::debug!(
                        "Dropping {} from closed connection {}",
                        command.command.event_name(),
                        from
                    );
                    return;
                }
                if let Some(command) = self.server_state.defer_if_authenticating(from, command) {
                    self.handle_command(from, command);
                }
            }
        }
    }

    fn handle_command(&mut self, from: ConnectionId, command: IdentifiableCommand) {
        let IdentifiableCommand { ack, command } = command;
        match command {
            ClientCommand::JoinRoom(request) => self.begin_join(from, ack, request),
            ClientCommand::LeaveRoom => {
                if self.leave_room(from).is_some() {
                    self.reply(from, ack, ServerEvent::LeftRoom);
                } else {
                    ignore(from, "leave-room", "not in a room");
                }
            }
            ClientCommand::Drawing(Drawing {
                room_id,
                snapshot_payload,
            }) => match self.membership(from, &room_id) {
                Some(permission) if permission.is_editable() => {
                    self.server_state
                        .canvas
                        .set(&room_id, snapshot_payload.clone());
                    self.broadcast(
                        &room_id,
                        ServerEvent::Drawing { snapshot_payload },
                        Some(from),
                    );
                }
                Some(_) => ignore(from, "drawing", "view-only participant"),
                None => ignore(from, "drawing", "not a member of the room"),
            },
            ClientCommand::ClearCanvas(RoomScoped { room_id }) => {
                match self.membership(from, &room_id) {
                    Some(permission) if permission.is_editable() => {
                        self.server_state.canvas.clear(&room_id);
                        self.broadcast(&room_id, ServerEvent::ClearCanvas, Some(from));
                    }
                    Some(_) => ignore(from, "clear-canvas", "view-only participant"),
                    None => ignore(from, "clear-canvas", "not a member of the room"),
                }
            }
            ClientCommand::RequestCanvas(RoomScoped { room_id }) => {
                if self.membership(from, &room_id).is_none() {
                    return ignore(from, "request-canvas", "not a member of the room");
                }
                // Nothing stored yet means nothing to sync.
                let snapshot = self.server_state.canvas.get(&room_id).cloned();
                if let Some(snapshot_payload) = snapshot {
                    self.reply(from, ack, ServerEvent::InitialCanvas { snapshot_payload });
                }
            }
            ClientCommand::ChatMessage(ChatMessage {
                room_id,
                sender,
                text,
            }) => {
                if self.membership(from, &room_id).is_none() {
                    return ignore(from, "chat-message", "not a member of the room");
                }
                if text.is_empty() {
                    return ignore(from, "chat-message", "empty text");
                }
                self.broadcast(
                    &room_id,
                    ServerEvent::ChatMessage { sender, text },
                    Some(from),
                );
            }
        }
    }

    fn begin_join(&mut self, from: ConnectionId, ack: Option<CommandId>, request: JoinRoom) {
        if let Err(e) = self.server_state.begin_authentication(from) {
            log::warn!("Connection {} cannot join: {}", from, e);
            return;
        }

        let directory = Arc::clone(&self.directory);
        let mut join_tx = self.join_tx.clone();
        tokio::spawn(async move {
            let outcome = directory
                .create_if_absent(&request.room_id, &request.credential)
                .await;
            let resolution = JoinResolution {
                from,
                ack,
                request,
                outcome,
            };
            if join_tx.send(resolution).await.is_err() {
                log::warn!("Server stopped before join of connection {} resolved", from);
            }
        });
    }

    fn handle_join_resolution(&mut self, resolution: JoinResolution) {
        let JoinResolution {
            from,
            ack,
            request,
            outcome,
        } = resolution;

        // The connection may have gone away while the directory was busy.
        let pending = match self.server_state.finish_authentication(from) {
            Ok(pending) => pending,
            Err(e) => {
                log::info!("Discarding join result for connection {}: {}", from, e);
                return;
            }
        };

        let room_id = request.room_id.clone();
        let reply = match outcome {
            Ok(room) if room.accepts(&request.credential) => {
                // Switching rooms: the current one is left only once the new
                // one has accepted the credential.
                let switching = self
                    .server_state
                    .presence
                    .room_of(from)
                    .map_or(false, |current| current != &room_id);
                if switching {
                    self.leave_room(from);
                }
                let participant = Participant {
                    connection_id: from,
                    display_name: request.normalized_display_name(),
                    permission: request.permission,
                };
                match self.server_state.join_room(&room_id, participant) {
                    Ok(()) => JoinReply::accepted(request.permission),
                    Err(e) => {
                        log::warn!(
                            "Connection {} could not be placed in room {}: {}",
                            from,
                            room_id,
                            e
                        );
                        JoinReply::denied("Server error")
                    }
                }
            }
            Ok(_) => {
                log::info!(
                    "Connection {} gave a wrong credential for room {}",
                    from,
                    room_id
                );
                JoinReply::denied("Incorrect password")
            }
            Err(e) => {
                log::warn!("Join of room {} failed: {} ({:?})", room_id, e, e);
                JoinReply::denied("Server error")
            }
        };

        let joined = reply.success;
        self.reply(from, ack, ServerEvent::JoinResult(reply));
        if joined {
            self.broadcast_roster(&room_id);
        }

        for command in pending {
            // A replayed join puts the connection back into authentication;
            // everything after it is held back again.
            if let Some(command) = self.server_state.defer_if_authenticating(from, command) {
                self.handle_command(from, command);
            }
        }
    }

    /// Permission of `from` if it is joined to `room_id`.
    fn membership(&self, from: ConnectionId, room_id: &RoomId) -> Option<Permission> {
        match self.server_state.joined_room(from) {
            Some((joined, permission)) if joined == room_id => Some(permission),
            _ => None,
        }
    }

    fn leave_room(&mut self, from: ConnectionId) -> Option<RoomId> {
        let departure = self.server_state.leave_room(from)?;
        if !departure.emptied {
            self.broadcast_roster(&departure.room_id);
        }
        Some(departure.room_id)
    }

    fn disconnect(&mut self, from: ConnectionId) {
        if let Some(departure) = self.server_state.disconnect(from) {
            if !departure.emptied {
                self.broadcast_roster(&departure.room_id);
            }
        }
        if self.connections.remove(from).is_some() {
            log::info!("Connection {} closed", from);
        }
    }

    fn broadcast_roster(&mut self, room_id: &RoomId) {
        let names = self.server_state.presence.list_names(room_id);
        self.broadcast(room_id, ServerEvent::RoomUsers(names), None);
    }

    fn broadcast(&mut self, room_id: &RoomId, event: ServerEvent, without: Option<ConnectionId>) {
        for connection_id in self.server_state.presence.connections(room_id) {
            if Some(connection_id) != without {
                let event = ConnectionEvent::IdentifiableEvent(IdentifiableEvent::by_system(
                    event.clone(),
                ));
                self.connections.send(connection_id, event);
            }
        }
    }

    fn reply(&mut self, to: ConnectionId, ack: Option<CommandId>, event: ServerEvent) {
        self.connections.send(
            to,
            ConnectionEvent::IdentifiableEvent(IdentifiableEvent::by_myself(ack, event)),
        );
    }
}

fn ignore(from: ConnectionId, event: &str, reason: &str) {
    log::debug!("Ignoring {} from connection {}: {}", event, from, reason);
}

/// Starts the gateway task owning all room state and returns its inbox.
/// The task ends once every `ServerTx` clone is dropped.
pub fn spawn_server(directory: RoomDirectory, canvas: Box<dyn CanvasStore>) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ConnectionCommand>(SERVER_QUEUE_CAPACITY);
    let (join_tx, mut join_rx) = channel::<JoinResolution>(JOIN_QUEUE_CAPACITY);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new(directory, canvas, join_tx));

        loop {
            tokio::select! {
                command = srv_rx.recv() => match command {
                    Some(command) => server.handle_connection_command(command),
                    None => break,
                },
                Some(resolution) = join_rx.recv() => server.handle_join_resolution(resolution),
            }
        }
        log::info!("Server stopped");
    });

    srv_tx
}
