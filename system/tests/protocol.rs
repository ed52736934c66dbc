use system::serde_json::{self, json, Value};
use system::{
    decode_command, decode_event, encode_command, encode_event, CanvasSnapshot, ClientCommand,
    Drawing, IdentifiableCommand, IdentifiableEvent, RoomId, ServerEvent,
};

#[test]
fn it_should_carry_drawing_from_client_encoder_to_server_decoder() {
    let snapshot = CanvasSnapshot::new(json!({
        "objects": [{ "type": "path", "path": [["M", 1, 2]] }]
    }));
    let command = IdentifiableCommand::new(ClientCommand::Drawing(Drawing {
        room_id: RoomId::new("r1"),
        snapshot_payload: snapshot.clone(),
    }));

    let text = encode_command(&command).expect("");
    let value: Value = serde_json::from_str(&text).expect("");
    assert_eq!(value["event"], "drawing");
    assert_eq!(value["payload"]["roomId"], "r1");
    assert!(value.get("ack").is_none());

    let decoded = decode_command(text.as_bytes()).expect("");
    assert_eq!(decoded, command);
}

#[test]
fn it_should_send_roster_as_plain_name_array() {
    let event = IdentifiableEvent::by_system(ServerEvent::RoomUsers(vec![
        "alice".to_owned(),
        "bob".to_owned(),
    ]));
    let text = encode_event(&event).expect("");
    assert_eq!(
        serde_json::from_str::<Value>(&text).expect(""),
        json!({ "event": "room-users", "payload": ["alice", "bob"] })
    );
    assert_eq!(decode_event(text.as_bytes()).expect(""), event);
}

#[test]
fn it_should_accept_chat_from_browser_client() {
    let frame = json!({
        "event": "chat-message",
        "payload": { "roomId": "r1", "sender": "alice", "message": "hi" }
    })
    .to_string();
    match decode_command(frame.as_bytes()).expect("").command {
        ClientCommand::ChatMessage(chat) => {
            assert_eq!(chat.sender, "alice");
            assert_eq!(chat.text, "hi");
        }
        other => panic!("unexpected command {:?}", other),
    }
}
