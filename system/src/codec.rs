//! JSON frame codec.
//!
//! Every websocket frame is an object `{"event": ..., "ack": ..., "payload": ...}`.
//! `ack` is optional and only meaningful on commands that get a direct reply.

use crate::message::{
    ChatMessage, ClientCommand, Drawing, IdentifiableCommand, IdentifiableEvent, JoinReply,
    JoinRoom, RoomScoped, ServerEvent,
};
use crate::types::{CommandId, RoomId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ack: Option<CommandId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    payload: Value,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("`{event}` is missing `{field}`")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

pub fn decode_command(bytes: &[u8]) -> Result<IdentifiableCommand, DecodeError> {
    let frame: Frame = serde_json::from_slice(bytes)?;
    let command = match frame.event.as_str() {
        "join-room" => ClientCommand::JoinRoom(payload::<JoinRoom>(frame.payload)?),
        "leave-room" => ClientCommand::LeaveRoom,
        "drawing" => {
            let drawing = payload::<Drawing>(frame.payload)?;
            if drawing.snapshot_payload.is_null() {
                return Err(DecodeError::MissingField {
                    event: "drawing",
                    field: "snapshotPayload",
                });
            }
            ClientCommand::Drawing(drawing)
        }
        "clear-canvas" => ClientCommand::ClearCanvas(payload::<RoomScoped>(frame.payload)?),
        "chat-message" => ClientCommand::ChatMessage(payload::<ChatMessage>(frame.payload)?),
        "request-canvas" => ClientCommand::RequestCanvas(payload::<RoomScoped>(frame.payload)?),
        _ => return Err(DecodeError::UnknownEvent(frame.event)),
    };
    if command.room_id().map_or(false, RoomId::is_empty) {
        return Err(DecodeError::MissingField {
            event: command.event_name(),
            field: "roomId",
        });
    }
    Ok(IdentifiableCommand {
        ack: frame.ack,
        command,
    })
}

pub fn encode_command(command: &IdentifiableCommand) -> Result<String, serde_json::Error> {
    let payload = match &command.command {
        ClientCommand::JoinRoom(join) => serde_json::to_value(join)?,
        ClientCommand::LeaveRoom => Value::Null,
        ClientCommand::Drawing(drawing) => serde_json::to_value(drawing)?,
        ClientCommand::ClearCanvas(scoped) | ClientCommand::RequestCanvas(scoped) => {
            serde_json::to_value(scoped)?
        }
        ClientCommand::ChatMessage(chat) => serde_json::to_value(chat)?,
    };
    serde_json::to_string(&Frame {
        event: command.command.event_name().to_owned(),
        ack: command.ack,
        payload,
    })
}

pub fn encode_event(event: &IdentifiableEvent) -> Result<String, serde_json::Error> {
    let payload = match &event.event {
        ServerEvent::JoinResult(reply) => serde_json::to_value(reply)?,
        ServerEvent::LeftRoom | ServerEvent::ClearCanvas => Value::Null,
        ServerEvent::RoomUsers(names) => serde_json::to_value(names)?,
        ServerEvent::Drawing { snapshot_payload }
        | ServerEvent::InitialCanvas { snapshot_payload } => {
            json!({ "snapshotPayload": snapshot_payload })
        }
        ServerEvent::ChatMessage { sender, text } => json!({ "sender": sender, "text": text }),
    };
    serde_json::to_string(&Frame {
        event: event.event.event_name().to_owned(),
        ack: event.ack,
        payload,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotPayload {
    snapshot_payload: crate::message::CanvasSnapshot,
}

#[derive(Deserialize)]
struct ChatPayload {
    #[serde(default)]
    sender: String,
    text: String,
}

pub fn decode_event(bytes: &[u8]) -> Result<IdentifiableEvent, DecodeError> {
    let frame: Frame = serde_json::from_slice(bytes)?;
    let event = match frame.event.as_str() {
        "join-result" => ServerEvent::JoinResult(payload::<JoinReply>(frame.payload)?),
        "left-room" => ServerEvent::LeftRoom,
        "room-users" => ServerEvent::RoomUsers(payload::<Vec<String>>(frame.payload)?),
        "drawing" => ServerEvent::Drawing {
            snapshot_payload: payload::<SnapshotPayload>(frame.payload)?.snapshot_payload,
        },
        "clear-canvas" => ServerEvent::ClearCanvas,
        "chat-message" => {
            let chat = payload::<ChatPayload>(frame.payload)?;
            ServerEvent::ChatMessage {
                sender: chat.sender,
                text: chat.text,
            }
        }
        "initial-canvas" => ServerEvent::InitialCanvas {
            snapshot_payload: payload::<SnapshotPayload>(frame.payload)?.snapshot_payload,
        },
        _ => return Err(DecodeError::UnknownEvent(frame.event)),
    };
    Ok(IdentifiableEvent {
        ack: frame.ack,
        event,
    })
}

fn payload<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Permission;

    #[test]
    fn it_reads_frames_sent_by_the_browser_client() {
        let frame = br#"{"event":"join-room","ack":3,"payload":{"roomId":"r1","password":"pw","username":"alice","permission":"view"}}"#;
        let command = decode_command(frame).expect("");
        assert_eq!(command.ack, Some(3));
        match command.command {
            ClientCommand::JoinRoom(join) => {
                assert_eq!(join.room_id.as_str(), "r1");
                assert_eq!(join.credential.as_str(), "pw");
                assert_eq!(join.normalized_display_name(), "alice");
                assert_eq!(join.permission, Permission::View);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn it_defaults_permission_and_name() {
        let frame = br#"{"event":"join-room","payload":{"roomId":"r1","credential":"pw"}}"#;
        match decode_command(frame).expect("").command {
            ClientCommand::JoinRoom(join) => {
                assert_eq!(join.permission, Permission::Edit);
                assert_eq!(join.normalized_display_name(), "Anonymous");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn it_rejects_drawing_without_room() {
        let frame = br#"{"event":"drawing","payload":{"snapshotPayload":[1,2,3]}}"#;
        assert!(matches!(decode_command(frame), Err(DecodeError::Malformed(_))));

        let frame = br#"{"event":"drawing","payload":{"roomId":"","pathData":[1]}}"#;
        assert!(matches!(
            decode_command(frame),
            Err(DecodeError::MissingField { field: "roomId", .. })
        ));
    }

    #[test]
    fn it_rejects_unknown_events() {
        let frame = br#"{"event":"shutdown"}"#;
        assert!(matches!(
            decode_command(frame),
            Err(DecodeError::UnknownEvent(ref name)) if name == "shutdown"
        ));
    }

    #[test]
    fn it_omits_absent_reply_fields() {
        let event = IdentifiableEvent::by_myself(
            Some(9),
            ServerEvent::JoinResult(JoinReply::denied("Incorrect password")),
        );
        let text = encode_event(&event).expect("");
        let value: Value = serde_json::from_str(&text).expect("");
        assert_eq!(
            value,
            json!({
                "event": "join-result",
                "ack": 9,
                "payload": { "success": false, "message": "Incorrect password" }
            })
        );
    }
}
