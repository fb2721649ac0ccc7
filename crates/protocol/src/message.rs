//! The in-process message envelope exchanged over the capture link.
//!
//! A [`Message`] is a [`Kind`] tag plus a flat JSON object of the remaining
//! fields. The wire discriminator (`type` or `action`) is not part of the
//! message: it is chosen by the [`Codec`](crate::Codec) at encode time and
//! normalized away at decode time.

use std::fmt;

use serde_json::{Map, Value};

/// Flat object holding every field of a message except the discriminator
/// and the timestamp.
pub type Payload = Map<String, Value>;

/// Field carrying the encoded image in a capture result.
pub const DATA_URL_FIELD: &str = "dataUrl";
/// Field carrying a human-readable failure in an error result.
pub const ERROR_FIELD: &str = "error";
/// Field correlating a capture result with its request.
pub const ID_FIELD: &str = "id";
/// Free-form text field used by handshakes and server pushes.
pub const MESSAGE_FIELD: &str = "message";
/// Field holding the inner message of a `server_message` envelope.
pub const DATA_FIELD: &str = "data";

/// Canonical message kinds.
///
/// Wire spellings that differ between protocol variants collapse into one
/// variant here; see [`Kind::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
	/// Client handshake, sent once right after the connection opens.
	Ping,
	Pong,
	/// Server asks for a capture of the visible surface.
	Capture,
	/// Client answers a capture with an encoded image.
	ScreenshotResult,
	/// Client answers a capture with a failure.
	Error,
	Heartbeat,
	ServerHeartbeat,
	EchoResponse,
	Broadcast,
	/// Envelope wrapping another message under `data`.
	ServerMessage,
	/// Any tag this client does not interpret.
	Other(String),
}

impl Kind {
	/// Maps a wire tag to its canonical kind.
	///
	/// `screenshot` is ambiguous between success and failure in the `action`
	/// variant; the codec resolves it by looking at the payload.
	pub fn parse(tag: &str) -> Self {
		match tag {
			"ping" => Self::Ping,
			"pong" => Self::Pong,
			"capture" => Self::Capture,
			"screenshot" | "screenshot_result" | "screenshotResult" => Self::ScreenshotResult,
			"error" => Self::Error,
			"heartbeat" => Self::Heartbeat,
			"server_heartbeat" => Self::ServerHeartbeat,
			"echo_response" => Self::EchoResponse,
			"broadcast" => Self::Broadcast,
			"server_message" => Self::ServerMessage,
			other => Self::Other(other.to_string()),
		}
	}

	/// Canonical name, independent of the protocol variant.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Ping => "ping",
			Self::Pong => "pong",
			Self::Capture => "capture",
			Self::ScreenshotResult => "screenshotResult",
			Self::Error => "error",
			Self::Heartbeat => "heartbeat",
			Self::ServerHeartbeat => "server_heartbeat",
			Self::EchoResponse => "echo_response",
			Self::Broadcast => "broadcast",
			Self::ServerMessage => "server_message",
			Self::Other(tag) => tag,
		}
	}

	/// Returns `true` for informational pushes that go straight to the UI.
	pub fn is_informational(&self) -> bool {
		matches!(
			self,
			Self::Pong | Self::EchoResponse | Self::Broadcast | Self::ServerHeartbeat | Self::Heartbeat
		)
	}
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Typed envelope exchanged over the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	pub kind: Kind,
	pub payload: Payload,
	/// Unix milliseconds assigned by the producer, if any.
	pub timestamp: Option<i64>,
}

impl Message {
	/// Creates a message of `kind` stamped with the current time.
	pub fn new(kind: Kind) -> Self {
		Self {
			kind,
			payload: Payload::new(),
			timestamp: Some(now_millis()),
		}
	}

	/// Creates a message with no timestamp.
	pub fn bare(kind: Kind) -> Self {
		Self {
			kind,
			payload: Payload::new(),
			timestamp: None,
		}
	}

	pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
		self.payload.insert(key.to_string(), value.into());
		self
	}

	/// The handshake sent immediately after the transport opens.
	pub fn handshake() -> Self {
		Self::new(Kind::Ping).with(MESSAGE_FIELD, "Client connected")
	}

	/// A server-side capture trigger, optionally correlated.
	pub fn capture_request(id: Option<&str>) -> Self {
		let msg = Self::bare(Kind::Capture);
		match id {
			Some(id) => msg.with(ID_FIELD, id),
			None => msg,
		}
	}

	/// Successful capture result carrying a data URI.
	pub fn screenshot(data_url: impl Into<String>, id: Option<&str>) -> Self {
		let msg = Self::new(Kind::ScreenshotResult).with(DATA_URL_FIELD, data_url.into());
		match id {
			Some(id) => msg.with(ID_FIELD, id),
			None => msg,
		}
	}

	/// Failed capture result carrying a human-readable reason.
	pub fn capture_error(reason: impl Into<String>, id: Option<&str>) -> Self {
		let msg = Self::new(Kind::Error).with(ERROR_FIELD, reason.into());
		match id {
			Some(id) => msg.with(ID_FIELD, id),
			None => msg,
		}
	}

	/// Builds a message from an arbitrary JSON object supplied by a local
	/// command, using `kind_hint` when the object has no `type`/`action` tag.
	pub fn from_value(value: Value, kind_hint: Kind) -> Self {
		let mut payload = match value {
			Value::Object(map) => map,
			other => {
				let mut map = Payload::new();
				map.insert(MESSAGE_FIELD.to_string(), other);
				map
			}
		};
		let kind = ["type", "action"]
			.iter()
			.find_map(|key| match payload.get(*key) {
				Some(Value::String(tag)) => Some(Kind::parse(tag)),
				_ => None,
			})
			.unwrap_or(kind_hint);
		payload.remove("type");
		payload.remove("action");
		let timestamp = match payload.get("timestamp").and_then(Value::as_i64) {
			Some(ts) => {
				payload.remove("timestamp");
				Some(ts)
			}
			None => None,
		};
		Self {
			kind,
			payload,
			timestamp,
		}
	}

	/// Correlation id, if the message carries a string or numeric one.
	pub fn id(&self) -> Option<String> {
		match self.payload.get(ID_FIELD)? {
			Value::String(s) => Some(s.clone()),
			Value::Number(n) => Some(n.to_string()),
			_ => None,
		}
	}

	pub fn text(&self) -> Option<&str> {
		self.payload.get(MESSAGE_FIELD).and_then(Value::as_str)
	}

	pub fn error_text(&self) -> Option<&str> {
		self.payload.get(ERROR_FIELD).and_then(Value::as_str)
	}

	pub fn data_url(&self) -> Option<&str> {
		self.payload.get(DATA_URL_FIELD).and_then(Value::as_str)
	}

	/// Short human-readable rendering used for stored records.
	pub fn summary(&self) -> String {
		if let Some(text) = self.text().or_else(|| self.error_text()) {
			return text.to_string();
		}
		let mut value = Value::Object(self.payload.clone());
		if let Value::Object(map) = &mut value {
			map.insert("type".to_string(), Value::String(self.kind.to_string()));
		}
		value.to_string()
	}
}

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn parse_normalizes_screenshot_spellings() {
		for tag in ["screenshot", "screenshot_result", "screenshotResult"] {
			assert_eq!(Kind::parse(tag), Kind::ScreenshotResult);
		}
		assert_eq!(Kind::parse("weird"), Kind::Other("weird".into()));
	}

	#[test]
	fn handshake_is_stamped_ping() {
		let msg = Message::handshake();
		assert_eq!(msg.kind, Kind::Ping);
		assert!(msg.timestamp.is_some());
		assert_eq!(msg.text(), Some("Client connected"));
	}

	#[test]
	fn capture_results_echo_id() {
		let ok = Message::screenshot("data:image/png;base64,AAAA", Some("req-1"));
		assert_eq!(ok.id().as_deref(), Some("req-1"));
		assert_eq!(ok.data_url(), Some("data:image/png;base64,AAAA"));

		let err = Message::capture_error("no provider", None);
		assert_eq!(err.kind, Kind::Error);
		assert!(err.id().is_none());
		assert_eq!(err.error_text(), Some("no provider"));
	}

	#[test]
	fn from_value_uses_embedded_tag() {
		let msg = Message::from_value(
			json!({"type": "echo", "message": "hi", "timestamp": 5}),
			Kind::Other("custom".into()),
		);
		assert_eq!(msg.kind, Kind::Other("echo".into()));
		assert_eq!(msg.timestamp, Some(5));
		assert_eq!(msg.text(), Some("hi"));
		assert!(!msg.payload.contains_key("type"));
	}

	#[test]
	fn from_value_wraps_scalars() {
		let msg = Message::from_value(json!("hello"), Kind::Other("text".into()));
		assert_eq!(msg.kind, Kind::Other("text".into()));
		assert_eq!(msg.text(), Some("hello"));
	}

	#[test]
	fn numeric_ids_are_stringified() {
		let msg = Message::bare(Kind::Capture).with(ID_FIELD, 42);
		assert_eq!(msg.id().as_deref(), Some("42"));
	}
}
