//! UI event sinks.

use snaplink_protocol::UiEvent;
use tokio::sync::mpsc;

/// Receives status and content notifications. Delivery is best-effort and
/// must not block the caller.
pub trait UiSink: Send + Sync {
	fn deliver(&self, event: &UiEvent);
}

/// Forwards events into a channel; a closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
	tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}
}

impl UiSink for ChannelSink {
	fn deliver(&self, event: &UiEvent) {
		let _ = self.tx.send(event.clone());
	}
}
