use serde_json::{Value, json};

use super::*;
use crate::message::{ERROR_FIELD, ID_FIELD, MESSAGE_FIELD};

fn all_kinds() -> Vec<Message> {
	vec![
		Message::handshake(),
		Message::bare(Kind::Pong),
		Message::capture_request(None),
		Message::capture_request(Some("abc")),
		Message::screenshot("data:image/png;base64,iVBORw0KGgo=", Some("abc")),
		Message::capture_error("Screenshot API not available", None),
		Message::bare(Kind::Error).with(MESSAGE_FIELD, "Invalid JSON"),
		Message::bare(Kind::ScreenshotResult).with(ERROR_FIELD, "tab closed"),
		Message::new(Kind::Heartbeat),
		Message::bare(Kind::ServerHeartbeat).with("connected_clients", 3),
		Message::bare(Kind::EchoResponse).with("original_message", "hi"),
		Message::new(Kind::Broadcast).with(MESSAGE_FIELD, "hello all"),
		Message::bare(Kind::ServerMessage).with("data", json!({"type": "pong"})),
		Message::new(Kind::Other("custom_event".into())).with("nested", json!({"a": [1, 2]})),
	]
}

#[test]
fn round_trip_type_variant() {
	let codec = Codec::new(Discriminator::Type);
	for msg in all_kinds() {
		let decoded = codec.decode(codec.encode(&msg).as_bytes()).unwrap();
		assert_eq!(decoded, msg, "round trip failed for {}", msg.kind);
	}
}

#[test]
fn round_trip_action_variant() {
	let codec = Codec::new(Discriminator::Action);
	for msg in all_kinds() {
		let decoded = codec.decode(codec.encode(&msg).as_bytes()).unwrap();
		assert_eq!(decoded, msg, "round trip failed for {}", msg.kind);
	}
}

#[test]
fn handshake_wire_shape() {
	let codec = Codec::default();
	let frame: Value = serde_json::from_str(&codec.encode(&Message::handshake())).unwrap();
	assert_eq!(frame["type"], "ping");
	assert_eq!(frame["message"], "Client connected");
	assert!(frame["timestamp"].is_i64());
}

#[test]
fn action_variant_result_shapes() {
	let codec = Codec::new(Discriminator::Action);

	let ok: Value =
		serde_json::from_str(&codec.encode(&Message::screenshot("data:x", None))).unwrap();
	assert_eq!(ok["action"], "screenshot");
	assert_eq!(ok["dataUrl"], "data:x");
	assert!(ok.get("type").is_none());

	let err: Value =
		serde_json::from_str(&codec.encode(&Message::capture_error("boom", None))).unwrap();
	assert_eq!(err["action"], "screenshot");
	assert_eq!(err["error"], "boom");
}

#[test]
fn type_variant_result_shapes() {
	let codec = Codec::new(Discriminator::Type);
	let ok: Value =
		serde_json::from_str(&codec.encode(&Message::screenshot("data:x", None))).unwrap();
	assert_eq!(ok["type"], "screenshot_result");

	let err: Value =
		serde_json::from_str(&codec.encode(&Message::capture_error("boom", None))).unwrap();
	assert_eq!(err["type"], "error");
}

#[test]
fn decodes_either_discriminator() {
	let codec = Codec::new(Discriminator::Type);
	let msg = codec.decode(br#"{"action":"capture","id":"r1"}"#).unwrap();
	assert_eq!(msg.kind, Kind::Capture);
	assert_eq!(msg.id().as_deref(), Some("r1"));
	assert!(msg.timestamp.is_none());
}

#[test]
fn configured_discriminator_wins() {
	let codec = Codec::new(Discriminator::Action);
	let msg = codec
		.decode(br#"{"action":"capture","type":"broadcast"}"#)
		.unwrap();
	assert_eq!(msg.kind, Kind::Capture);
	assert_eq!(msg.payload.get("type"), Some(&json!("broadcast")));
}

#[test]
fn screenshot_with_only_error_is_error_kind() {
	let codec = Codec::default();
	let msg = codec
		.decode(br#"{"action":"screenshot","error":"denied"}"#)
		.unwrap();
	assert_eq!(msg.kind, Kind::Error);
	assert_eq!(msg.error_text(), Some("denied"));
}

#[test]
fn non_integer_timestamp_stays_in_payload() {
	let codec = Codec::default();
	let msg = codec
		.decode(br#"{"type":"server_heartbeat","timestamp":1700000000.25}"#)
		.unwrap();
	assert!(msg.timestamp.is_none());
	assert!(msg.payload.contains_key("timestamp"));
}

#[test]
fn malformed_frames_are_rejected() {
	let codec = Codec::default();
	assert!(matches!(
		codec.decode(b"{not json"),
		Err(DecodeError::Malformed(_))
	));
	assert!(matches!(
		codec.decode(&[0xff, 0xfe, 0x00]),
		Err(DecodeError::Malformed(_))
	));
	assert!(matches!(
		codec.decode(b"[1,2,3]"),
		Err(DecodeError::NotAnObject("an array"))
	));
	assert!(matches!(
		codec.decode(br#"{"message":"hi"}"#),
		Err(DecodeError::MissingDiscriminator)
	));
	assert!(matches!(
		codec.decode(br#"{"type":7}"#),
		Err(DecodeError::InvalidDiscriminator { field: "type" })
	));
}

#[test]
fn decode_keeps_id_field_verbatim() {
	let codec = Codec::default();
	let msg = codec.decode(br#"{"type":"capture","id":12}"#).unwrap();
	assert_eq!(msg.payload.get(ID_FIELD), Some(&json!(12)));
	assert_eq!(msg.id().as_deref(), Some("12"));
}

#[test]
fn plain_error_keeps_its_tag_under_action() {
	let codec = Codec::new(Discriminator::Action);
	let msg = Message::bare(Kind::Error).with(MESSAGE_FIELD, "Invalid JSON");
	let frame: Value = serde_json::from_str(&codec.encode(&msg)).unwrap();
	assert_eq!(frame["action"], "error");
	assert_eq!(codec.decode(codec.encode(&msg).as_bytes()).unwrap().kind, Kind::Error);
}

#[test]
fn only_bare_screenshot_tag_becomes_error() {
	let codec = Codec::default();
	let msg = codec
		.decode(br#"{"type":"screenshot_result","error":"tab closed"}"#)
		.unwrap();
	assert_eq!(msg.kind, Kind::ScreenshotResult);
	assert_eq!(msg.error_text(), Some("tab closed"));
}
