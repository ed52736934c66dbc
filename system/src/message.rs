use crate::types::{normalize_display_name, CommandId, Credential, Permission, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized drawing state of a room. The server never looks inside it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasSnapshot(Value);

impl CanvasSnapshot {
    pub fn new(content: Value) -> Self {
        Self(content)
    }

    pub fn content(&self) -> &Value {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl std::fmt::Debug for CanvasSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSnapshot")
            .field("size", &self.0.to_string().len())
            .finish()
    }
}

impl From<Value> for CanvasSnapshot {
    fn from(content: Value) -> Self {
        Self(content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: RoomId,
    #[serde(alias = "password")]
    pub credential: Credential,
    #[serde(default, alias = "username", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub permission: Permission,
}

impl JoinRoom {
    pub fn normalized_display_name(&self) -> String {
        normalize_display_name(self.display_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawing {
    pub room_id: RoomId,
    #[serde(alias = "pathData")]
    pub snapshot_payload: CanvasSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomScoped {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: RoomId,
    #[serde(default)]
    pub sender: String,
    #[serde(alias = "message")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    JoinRoom(JoinRoom),
    LeaveRoom,
    Drawing(Drawing),
    ClearCanvas(RoomScoped),
    ChatMessage(ChatMessage),
    RequestCanvas(RoomScoped),
}

impl ClientCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientCommand::JoinRoom(_) => "join-room",
            ClientCommand::LeaveRoom => "leave-room",
            ClientCommand::Drawing(_) => "drawing",
            ClientCommand::ClearCanvas(_) => "clear-canvas",
            ClientCommand::ChatMessage(_) => "chat-message",
            ClientCommand::RequestCanvas(_) => "request-canvas",
        }
    }

    /// Room the command is addressed to, if it carries one.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            ClientCommand::JoinRoom(join) => Some(&join.room_id),
            ClientCommand::LeaveRoom => None,
            ClientCommand::Drawing(drawing) => Some(&drawing.room_id),
            ClientCommand::ClearCanvas(scoped) | ClientCommand::RequestCanvas(scoped) => {
                Some(&scoped.room_id)
            }
            ClientCommand::ChatMessage(chat) => Some(&chat.room_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiableCommand {
    pub ack: Option<CommandId>,
    pub command: ClientCommand,
}

impl IdentifiableCommand {
    pub fn new(command: ClientCommand) -> Self {
        Self { ack: None, command }
    }

    pub fn with_ack(ack: CommandId, command: ClientCommand) -> Self {
        Self {
            ack: Some(ack),
            command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_editable: Option<bool>,
}

impl JoinReply {
    pub fn accepted(permission: Permission) -> Self {
        Self {
            success: true,
            message: None,
            is_editable: Some(permission.is_editable()),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            is_editable: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    JoinResult(JoinReply),
    LeftRoom,
    RoomUsers(Vec<String>),
    Drawing { snapshot_payload: CanvasSnapshot },
    ClearCanvas,
    ChatMessage { sender: String, text: String },
    InitialCanvas { snapshot_payload: CanvasSnapshot },
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::JoinResult(_) => "join-result",
            ServerEvent::LeftRoom => "left-room",
            ServerEvent::RoomUsers(_) => "room-users",
            ServerEvent::Drawing { .. } => "drawing",
            ServerEvent::ClearCanvas => "clear-canvas",
            ServerEvent::ChatMessage { .. } => "chat-message",
            ServerEvent::InitialCanvas { .. } => "initial-canvas",
        }
    }
}

/// An event delivered to one connection. `ack` echoes the id of the command
/// it answers; broadcasts carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiableEvent {
    pub ack: Option<CommandId>,
    pub event: ServerEvent,
}

impl IdentifiableEvent {
    pub fn by_myself(ack: Option<CommandId>, event: ServerEvent) -> Self {
        Self { ack, event }
    }

    pub fn by_system(event: ServerEvent) -> Self {
        Self { ack: None, event }
    }
}
