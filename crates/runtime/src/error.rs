//! Error types for the session runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Dialing the endpoint failed before the transport opened.
	#[error("Failed to connect to {endpoint}: {message}")]
	ConnectionFailed { endpoint: String, message: String },

	/// Writing to an open transport failed.
	#[error("Transport error: {0}")]
	TransportError(String),

	#[error("WebSocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	/// The session driver has exited and no longer accepts commands.
	#[error("Session closed")]
	ChannelClosed,
}
