//! Dispatch of inbound messages, status events and local commands.
//!
//! | inbound kind | action |
//! |---|---|
//! | `capture` | capture off the event loop, answer with one result |
//! | informational pushes | forward to UI sinks; `broadcast` also notifies |
//! | `server_message` | unwrap `data` and route the inner message |
//! | anything else | log, forward raw to UI sinks |

use std::sync::Arc;

use serde_json::Value;
use snaplink_protocol::message::{DATA_FIELD, ID_FIELD};
use snaplink_protocol::{
	CommandReply, ConnectionState, Direction, Kind, LocalCommand, Message, StatusEvent, UiEvent,
};
use snaplink_runtime::{SessionEvent, SessionHandle};
use tracing::{debug, info, warn};

use crate::capture::CaptureAdapter;
use crate::sink::UiSink;
use crate::store::RecordBook;

/// Kind used for `send_to_server` payloads that carry no tag of their own.
const UNTAGGED_KIND: &str = "message";

pub struct Router {
	session: SessionHandle,
	capture: CaptureAdapter,
	sinks: Vec<Arc<dyn UiSink>>,
	records: RecordBook,
}

impl Router {
	pub fn new(
		session: SessionHandle,
		capture: CaptureAdapter,
		sinks: Vec<Arc<dyn UiSink>>,
		records: RecordBook,
	) -> Self {
		Self {
			session,
			capture,
			sinks,
			records,
		}
	}

	pub fn records(&self) -> &RecordBook {
		&self.records
	}

	pub fn on_event(&self, event: SessionEvent) {
		match event {
			SessionEvent::Status(status) => self.on_status(&status),
			SessionEvent::Inbound(message) => self.route(message),
		}
	}

	fn on_status(&self, status: &StatusEvent) {
		let event = UiEvent::from(status);
		self.records
			.record(Direction::Received, "status", status.message.clone());
		self.records.set_latest(&event);
		self.broadcast(&event);
	}

	pub fn route(&self, message: Message) {
		match &message.kind {
			Kind::Capture => {
				self.records
					.record(Direction::Received, message.kind.as_str(), message.summary());
				self.answer_capture(message.payload.get(ID_FIELD).cloned());
			}
			Kind::ServerMessage => match message.payload.get(DATA_FIELD) {
				Some(inner) if inner.is_object() => {
					let inner = Message::from_value(inner.clone(), Kind::Other(UNTAGGED_KIND.into()));
					self.route(inner);
				}
				_ => {
					debug!(target = "snaplink.router", "server_message without object data");
					self.forward(&message);
				}
			},
			kind if kind.is_informational() => {
				self.forward(&message);
				if *kind == Kind::Broadcast {
					self.broadcast(&UiEvent::Notification {
						title: "Broadcast".into(),
						body: message.text().unwrap_or_default().to_string(),
					});
				}
			}
			kind => {
				info!(target = "snaplink.router", kind = %kind, "unhandled message kind");
				self.forward(&message);
			}
		}
	}

	/// Relays `message` to every UI sink and the record log.
	fn forward(&self, message: &Message) {
		let event = UiEvent::ServerMessage {
			data: self.session.codec().to_value(message),
		};
		self.records
			.record(Direction::Received, message.kind.as_str(), message.summary());
		self.records.set_latest(&event);
		self.broadcast(&event);
	}

	fn broadcast(&self, event: &UiEvent) {
		for sink in &self.sinks {
			sink.deliver(event);
		}
	}

	/// Captures on a separate task and sends exactly one result, echoing `id`.
	fn answer_capture(&self, id: Option<Value>) {
		let capture = self.capture.clone();
		let session = self.session.clone();
		tokio::spawn(async move {
			let mut reply = match capture.capture_visible_surface().await {
				Ok(image) => {
					debug!(target = "snaplink.router", bytes = image.bytes.len(), "capture complete");
					Message::screenshot(image.to_data_url(), None)
				}
				Err(err) => {
					warn!(target = "snaplink.router", error = %err, "capture failed");
					Message::capture_error(err.to_string(), None)
				}
			};
			if let Some(id) = id {
				reply.payload.insert(ID_FIELD.to_string(), id);
			}
			if let Err(err) = session.send(&reply) {
				warn!(target = "snaplink.router", error = %err, "capture result not sent");
			}
		});
	}

	pub async fn command(&self, command: LocalCommand) -> CommandReply {
		match command {
			LocalCommand::SendToServer { data } => {
				if self.session.status().state != ConnectionState::Open {
					return CommandReply::error("Not connected");
				}
				let message = Message::from_value(data, Kind::Other(UNTAGGED_KIND.into()));
				match self.session.send(&message) {
					Ok(()) => {
						self.records
							.record(Direction::Sent, message.kind.as_str(), message.summary());
						CommandReply::ok()
					}
					Err(err) => CommandReply::error(err.to_string()),
				}
			}
			LocalCommand::GetConnectionStatus => {
				let snapshot = self.session.status();
				CommandReply::Status {
					status: snapshot.state.link_status(),
					attempt_count: snapshot.attempt_count,
				}
			}
			LocalCommand::Reconnect => reply_from(self.session.reconnect()),
			LocalCommand::Disconnect => reply_from(self.session.shutdown()),
			LocalCommand::CaptureTab => match self.capture.capture_visible_surface().await {
				Ok(image) => CommandReply::Capture {
					data_url: image.to_data_url(),
				},
				Err(err) => CommandReply::error(err.to_string()),
			},
		}
	}

	/// Parses and runs a raw command object; unknown shapes get an error reply.
	pub async fn command_value(&self, value: Value) -> CommandReply {
		match serde_json::from_value::<LocalCommand>(value) {
			Ok(command) => self.command(command).await,
			Err(err) => {
				debug!(target = "snaplink.router", error = %err, "unrecognized command");
				CommandReply::error("Unknown message type")
			}
		}
	}
}

fn reply_from(result: snaplink_runtime::Result<()>) -> CommandReply {
	match result {
		Ok(()) => CommandReply::ok(),
		Err(err) => CommandReply::error(err.to_string()),
	}
}
