//! Error types for the snaplink client.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::store::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Runtime(#[from] snaplink_runtime::Error),

	#[error(transparent)]
	Capture(#[from] CaptureError),

	#[error(transparent)]
	Storage(#[from] StorageError),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
