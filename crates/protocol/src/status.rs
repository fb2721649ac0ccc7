//! Connection status as seen by UI surfaces and the persisted state.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of the single logical connection.
///
/// ```text
///  Idle ──► Connecting ──► Open ──► Closing ──► Closed
///             ▲   │          │                    ▲
///             │   ▼          ▼                    │
///             └─ Reconnecting ◄───────────────────┘ (ceiling reached)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
	#[default]
	Idle,
	Connecting,
	Open,
	Closing,
	Closed,
	Reconnecting,
}

impl ConnectionState {
	/// Coarse status reported to UI surfaces.
	pub fn link_status(self) -> LinkStatus {
		match self {
			Self::Connecting => LinkStatus::Connecting,
			Self::Open => LinkStatus::Connected,
			Self::Closing => LinkStatus::Closing,
			Self::Idle | Self::Closed | Self::Reconnecting => LinkStatus::Disconnected,
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Idle => "Idle",
			Self::Connecting => "Connecting",
			Self::Open => "Open",
			Self::Closing => "Closing",
			Self::Closed => "Closed",
			Self::Reconnecting => "Reconnecting",
		};
		f.write_str(name)
	}
}

/// Status vocabulary shared with UI surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
	Connecting,
	Connected,
	Closing,
	Disconnected,
	Error,
}

impl fmt::Display for LinkStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Connecting => "connecting",
			Self::Connected => "connected",
			Self::Closing => "closing",
			Self::Disconnected => "disconnected",
			Self::Error => "error",
		};
		f.write_str(name)
	}
}

/// One externally observable status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
	pub status: LinkStatus,
	pub message: String,
	pub attempt_count: u32,
	/// Close code reported by the transport, for `disconnected` events.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<u16>,
}

impl StatusEvent {
	pub fn new(status: LinkStatus, message: impl Into<String>, attempt_count: u32) -> Self {
		Self {
			status,
			message: message.into(),
			attempt_count,
			code: None,
		}
	}

	pub fn with_code(mut self, code: u16) -> Self {
		self.code = Some(code);
		self
	}
}

/// Notification delivered to UI sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
	ConnectionStatus {
		status: LinkStatus,
		message: String,
		#[serde(rename = "attemptCount")]
		attempt_count: u32,
	},
	/// An inbound message relayed verbatim.
	ServerMessage { data: Value },
	/// Something worth surfacing prominently, such as a broadcast.
	Notification { title: String, body: String },
}

impl From<&StatusEvent> for UiEvent {
	fn from(event: &StatusEvent) -> Self {
		UiEvent::ConnectionStatus {
			status: event.status,
			message: event.message.clone(),
			attempt_count: event.attempt_count,
		}
	}
}
