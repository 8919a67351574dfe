use medidesk_domain::{Identity, Role, UserId};
use medidesk_protocol::{
	ClientEvent, DEFAULT_MAX_FRAME_SIZE, Envelope, FramingError, RegisterPayload, ServerEvent, decode_frame,
	decode_server_event, encode_client_event, encode_frame, encode_frame_default,
};
use proptest::prelude::*;

fn operator(id: &str) -> Identity {
	Identity::operator(UserId::new(id).expect("user id"))
}

#[test]
fn register_frame_matches_wire_shape() {
	let frame = encode_client_event(
		&ClientEvent::Register(RegisterPayload::from(&operator("a1"))),
		DEFAULT_MAX_FRAME_SIZE,
	)
	.expect("encode");

	let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
	assert_eq!(
		value,
		serde_json::json!({"event": "register", "data": {"userId": "a1", "role": "admin"}})
	);
}

#[test]
fn encode_frame_default_matches_explicit_default_limit() {
	let envelope = Envelope::new("register", serde_json::json!({"userId": "a1"})).expect("envelope");
	let a = encode_frame_default(&envelope).expect("encode_frame_default");
	let b = encode_frame(&envelope, DEFAULT_MAX_FRAME_SIZE).expect("encode_frame");
	assert_eq!(a, b);
}

#[test]
fn decodes_receive_message_event() {
	let frame = r#"{"event":"receiveMessage","data":{"_id":"m1","sender":"user","content":"hi","timestamp":"2025-03-10T09:00:00Z","chatId":"u7"}}"#;
	match decode_server_event(frame, DEFAULT_MAX_FRAME_SIZE).expect("decode") {
		ServerEvent::ReceiveMessage(payload) => {
			assert_eq!(payload.chat_id.as_str(), "u7");
			assert_eq!(payload.message.sender_role, Role::Counterpart);
			assert_eq!(payload.message.content, "hi");
		}
		other => panic!("unexpected event: {other:?}"),
	}
}

#[test]
fn decodes_error_event() {
	let frame = r#"{"event":"error","data":{"message":"not registered"}}"#;
	match decode_server_event(frame, DEFAULT_MAX_FRAME_SIZE).expect("decode") {
		ServerEvent::Error(payload) => assert_eq!(payload.message, "not registered"),
		other => panic!("unexpected event: {other:?}"),
	}
}

#[test]
fn unknown_events_are_not_errors() {
	let event = decode_server_event(r#"{"event":"typing","data":{}}"#, DEFAULT_MAX_FRAME_SIZE).expect("decode");
	assert_eq!(
		event,
		ServerEvent::Unknown {
			event: "typing".to_string()
		}
	);
	assert_eq!(event.name(), "typing");
}

#[test]
fn malformed_receive_message_is_a_json_error() {
	let err = decode_server_event(r#"{"event":"receiveMessage","data":{"content":"x"}}"#, DEFAULT_MAX_FRAME_SIZE)
		.unwrap_err();
	assert!(matches!(err, FramingError::Json(_)));
}

#[test]
fn decode_respects_custom_limit() {
	let frame = r#"{"event":"error","data":{"message":"too long for this limit"}}"#;
	match decode_frame(frame, 16).unwrap_err() {
		FramingError::FrameTooLarge { len, max } => {
			assert_eq!(len, frame.len());
			assert_eq!(max, 16);
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

proptest! {
	#[test]
	fn decode_never_panics_on_arbitrary_text(src in ".{0,256}") {
		let _ = decode_server_event(&src, DEFAULT_MAX_FRAME_SIZE);
	}

	#[test]
	fn inbound_content_survives_the_wire(content in "[^\u{0}]{0,128}", chat in "[a-z0-9]{1,24}") {
		let frame = serde_json::json!({
			"event": "receiveMessage",
			"data": {"_id": "m1", "sender": "user", "content": content, "chatId": chat},
		})
		.to_string();
		match decode_server_event(&frame, DEFAULT_MAX_FRAME_SIZE) {
			Ok(ServerEvent::ReceiveMessage(p)) => {
				prop_assert_eq!(p.message.content, content);
				prop_assert_eq!(p.chat_id.as_str(), chat.as_str());
			}
			other => prop_assert!(false, "unexpected decode result: {:?}", other),
		}
	}
}
