#![allow(dead_code)]

use std::time::Duration;

use server::canvas_store::MemoryCanvasStore;
use server::connection::{ConnectionCommand, ConnectionEvent};
use server::room_directory::{MemoryRoomStore, RoomDirectory, RoomStore};
use server::server::{spawn_server, ServerTx};
use system::serde_json::Value;
use system::{
    ChatMessage, ClientCommand, CommandId, ConnectionId, Credential, Drawing, IdentifiableCommand,
    IdentifiableEvent, JoinReply, JoinRoom, Permission, RoomId, RoomScoped, ServerEvent,
};
use tokio::sync::mpsc::{channel, Receiver};
use tokio::time::timeout;

const EVENT_WAIT: Duration = Duration::from_secs(2);
const SILENCE_WAIT: Duration = Duration::from_millis(100);

pub fn start() -> ServerTx {
    start_with(MemoryRoomStore::new())
}

pub fn start_with(store: impl RoomStore + 'static) -> ServerTx {
    spawn_server(RoomDirectory::new(store), Box::new(MemoryCanvasStore::new()))
}

pub struct TestClient {
    pub connection_id: ConnectionId,
    srv_tx: ServerTx,
    rx: Receiver<ConnectionEvent>,
    next_ack: CommandId,
}

impl TestClient {
    pub async fn connect(srv_tx: &ServerTx) -> Self {
        let mut srv_tx = srv_tx.clone();
        let (tx, mut rx) = channel(64);
        srv_tx
            .send(ConnectionCommand::Connect { tx })
            .await
            .expect("server must be running");
        let connection_id = match timeout(EVENT_WAIT, rx.recv()).await {
            Ok(Some(ConnectionEvent::Connected { connection_id })) => connection_id,
            other => panic!("expected Connected, got {:?}", other),
        };
        Self {
            connection_id,
            srv_tx,
            rx,
            next_ack: 0,
        }
    }

    pub async fn send(&mut self, command: ClientCommand) -> CommandId {
        self.next_ack += 1;
        let ack = self.next_ack;
        self.srv_tx
            .send(ConnectionCommand::IdentifiableCommand {
                from: self.connection_id,
                command: IdentifiableCommand::with_ack(ack, command),
            })
            .await
            .expect("server must be running");
        ack
    }

    pub async fn send_join(
        &mut self,
        room_id: &str,
        credential: &str,
        name: &str,
        permission: Permission,
    ) -> CommandId {
        self.send(ClientCommand::JoinRoom(JoinRoom {
            room_id: RoomId::new(room_id),
            credential: Credential::new(credential),
            display_name: Some(name.to_owned()),
            permission,
        }))
        .await
    }

    /// Joins and returns the reply; on success the first roster is consumed too.
    pub async fn join(&mut self, room_id: &str, credential: &str, name: &str) -> JoinReply {
        self.join_as(room_id, credential, name, Permission::Edit).await
    }

    pub async fn join_as(
        &mut self,
        room_id: &str,
        credential: &str,
        name: &str,
        permission: Permission,
    ) -> JoinReply {
        let ack = self.send_join(room_id, credential, name, permission).await;
        let reply = self.join_reply(ack).await;
        if reply.success {
            self.roster().await;
        }
        reply
    }

    pub async fn join_reply(&mut self, ack: CommandId) -> JoinReply {
        match self.next_event().await {
            IdentifiableEvent {
                ack: Some(got),
                event: ServerEvent::JoinResult(reply),
            } if got == ack => reply,
            other => panic!("expected join-result #{}, got {:?}", ack, other),
        }
    }

    pub async fn draw(&mut self, room_id: &str, snapshot: Value) {
        self.send(ClientCommand::Drawing(Drawing {
            room_id: RoomId::new(room_id),
            snapshot_payload: snapshot.into(),
        }))
        .await;
    }

    pub async fn clear(&mut self, room_id: &str) {
        self.send(ClientCommand::ClearCanvas(RoomScoped {
            room_id: RoomId::new(room_id),
        }))
        .await;
    }

    pub async fn request_canvas(&mut self, room_id: &str) -> CommandId {
        self.send(ClientCommand::RequestCanvas(RoomScoped {
            room_id: RoomId::new(room_id),
        }))
        .await
    }

    pub async fn chat(&mut self, room_id: &str, text: &str) {
        self.send(ClientCommand::ChatMessage(ChatMessage {
            room_id: RoomId::new(room_id),
            sender: "tester".to_owned(),
            text: text.to_owned(),
        }))
        .await;
    }

    pub async fn disconnect(&mut self) {
        self.srv_tx
            .send(ConnectionCommand::Disconnect {
                from: self.connection_id,
            })
            .await
            .expect("server must be running");
    }

    pub async fn next_event(&mut self) -> IdentifiableEvent {
        match timeout(EVENT_WAIT, self.rx.recv()).await {
            Ok(Some(ConnectionEvent::IdentifiableEvent(event))) => event,
            other => panic!(
                "connection {}: expected an event, got {:?}",
                self.connection_id, other
            ),
        }
    }

    pub async fn roster(&mut self) -> Vec<String> {
        match self.next_event().await.event {
            ServerEvent::RoomUsers(names) => names,
            other => panic!("expected room-users, got {:?}", other),
        }
    }

    pub async fn assert_silent(&mut self) {
        if let Ok(event) = timeout(SILENCE_WAIT, self.rx.recv()).await {
            panic!("connection {}: unexpected {:?}", self.connection_id, event);
        }
    }
}
