//! JSON text codec for [`Message`].
//!
//! Two protocol variants are in the wild: one tags messages with `type`,
//! the other with `action`. A [`Codec`] writes the variant it was built for
//! and reads both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::{DATA_URL_FIELD, ERROR_FIELD, Kind, Message};

const TIMESTAMP_FIELD: &str = "timestamp";

/// Which field carries the message kind on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discriminator {
	#[default]
	Type,
	Action,
}

impl Discriminator {
	pub fn field(self) -> &'static str {
		match self {
			Self::Type => "type",
			Self::Action => "action",
		}
	}

	fn other(self) -> Self {
		match self {
			Self::Type => Self::Action,
			Self::Action => Self::Type,
		}
	}
}

/// Reasons an inbound frame could not be turned into a [`Message`].
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("malformed frame: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("expected a JSON object, got {0}")]
	NotAnObject(&'static str),

	#[error("frame has neither a `type` nor an `action` field")]
	MissingDiscriminator,

	#[error("discriminator `{field}` is not a string")]
	InvalidDiscriminator { field: &'static str },
}

/// Encodes and decodes messages for one protocol variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
	discriminator: Discriminator,
}

impl Codec {
	pub fn new(discriminator: Discriminator) -> Self {
		Self { discriminator }
	}

	pub fn discriminator(&self) -> Discriminator {
		self.discriminator
	}

	/// Renders `message` as a single UTF-8 JSON text frame.
	pub fn encode(&self, message: &Message) -> String {
		self.to_value(message).to_string()
	}

	/// The JSON object `encode` would emit, for relaying to UI surfaces.
	pub fn to_value(&self, message: &Message) -> Value {
		let mut object = message.payload.clone();
		if let Some(ts) = message.timestamp {
			object.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
		}
		object.insert(
			self.discriminator.field().to_string(),
			Value::String(self.wire_name(message).to_string()),
		);
		Value::Object(object)
	}

	/// Parses one inbound frame.
	pub fn decode(&self, frame: &[u8]) -> Result<Message, DecodeError> {
		let value: Value = serde_json::from_slice(frame)?;
		let mut object = match value {
			Value::Object(map) => map,
			other => return Err(DecodeError::NotAnObject(json_type_name(&other))),
		};

		let field = [self.discriminator, self.discriminator.other()]
			.into_iter()
			.map(Discriminator::field)
			.find(|field| object.contains_key(*field))
			.ok_or(DecodeError::MissingDiscriminator)?;

		let tag = match object.remove(field) {
			Some(Value::String(tag)) => tag,
			_ => return Err(DecodeError::InvalidDiscriminator { field }),
		};

		let timestamp = match object.get(TIMESTAMP_FIELD).and_then(Value::as_i64) {
			Some(ts) => {
				object.remove(TIMESTAMP_FIELD);
				Some(ts)
			}
			None => None,
		};

		let kind = resolve_kind(&tag, &object);
		Ok(Message {
			kind,
			payload: object,
			timestamp,
		})
	}

	/// Under `action` both capture outcomes travel as `screenshot` and the
	/// payload tells them apart, so only shapes that decode back unchanged
	/// use that tag.
	fn wire_name<'a>(&self, message: &'a Message) -> &'a str {
		let failure = is_capture_failure(&message.payload);
		match (self.discriminator, &message.kind) {
			(Discriminator::Action, Kind::Error) if failure => "screenshot",
			(Discriminator::Action, Kind::ScreenshotResult) if !failure => "screenshot",
			(_, Kind::ScreenshotResult) => "screenshot_result",
			(_, kind) => kind.as_str(),
		}
	}
}

/// A bare `screenshot` frame that only carries an `error` is a failure result.
fn resolve_kind(tag: &str, payload: &Map<String, Value>) -> Kind {
	if tag == "screenshot" && is_capture_failure(payload) {
		return Kind::Error;
	}
	Kind::parse(tag)
}

fn is_capture_failure(payload: &Map<String, Value>) -> bool {
	payload.contains_key(ERROR_FIELD) && !payload.contains_key(DATA_URL_FIELD)
}

fn json_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests;
