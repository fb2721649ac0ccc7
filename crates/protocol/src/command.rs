//! Process-local command surface used by UI surfaces and timers.
//!
//! These never travel over the capture link; they are how other parts of
//! the program talk to the supervisor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::LinkStatus;

/// A request from a UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocalCommand {
	/// Forward `data` to the remote endpoint.
	SendToServer { data: Value },
	GetConnectionStatus,
	/// Reset the attempt counter and dial again.
	Reconnect,
	/// Shut the connection down and stop reconnecting.
	Disconnect,
	/// Capture locally and hand the image back to the caller.
	CaptureTab,
}

/// Reply to a [`LocalCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandReply {
	Status {
		status: LinkStatus,
		#[serde(rename = "attemptCount")]
		attempt_count: u32,
	},
	Capture {
		#[serde(rename = "dataUrl")]
		data_url: String,
	},
	Ack { success: bool },
	Error { error: String },
}

impl CommandReply {
	pub fn ok() -> Self {
		Self::Ack { success: true }
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self::Error {
			error: message.into(),
		}
	}
}
