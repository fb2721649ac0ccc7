//! Persisted records and polling wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store key holding the most recent UI event.
pub const LATEST_MESSAGE_KEY: &str = "latestMessage";
/// Store key holding the bounded list of [`StoredRecord`]s.
pub const MESSAGE_LOG_KEY: &str = "messageLog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	Sent,
	Received,
}

/// One UI-visible message kept in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
	pub direction: Direction,
	/// Message kind, or `status` for connection status changes.
	#[serde(rename = "type")]
	pub kind: String,
	pub content: String,
	/// Unix milliseconds.
	pub timestamp: i64,
}

/// `GET /check-status` response of the polling fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckStatusResponse {
	#[serde(default)]
	pub request: Option<PendingCapture>,
}

/// A capture the polling endpoint wants fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCapture {
	/// Echoed back verbatim, whatever JSON type the server chose.
	pub id: Value,
}

/// `POST /upload-screenshot` body of the polling fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadScreenshot {
	pub id: Value,
	#[serde(rename = "screenshotData")]
	pub screenshot_data: String,
}
