//! JSON-lines command surface: commands in on stdin, replies and UI events
//! out on stdout.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use snaplink::{Router, UiSink};
use snaplink_protocol::{CommandReply, UiEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Serializes one value per line into a shared writer.
pub struct JsonLines<W> {
	out: Arc<Mutex<W>>,
}

impl<W> Clone for JsonLines<W> {
	fn clone(&self) -> Self {
		Self {
			out: Arc::clone(&self.out),
		}
	}
}

impl<W: Write + Send> JsonLines<W> {
	pub fn new(out: W) -> Self {
		Self {
			out: Arc::new(Mutex::new(out)),
		}
	}

	pub fn write<T: Serialize>(&self, value: &T) {
		let line = match serde_json::to_string(value) {
			Ok(line) => line,
			Err(err) => {
				warn!(target = "snaplink.surface", error = %err, "failed to encode output line");
				return;
			}
		};
		let mut out = self.out.lock();
		if let Err(err) = writeln!(out, "{line}").and_then(|_| out.flush()) {
			debug!(target = "snaplink.surface", error = %err, "output closed");
		}
	}

	/// Runs `f` on the underlying writer.
	pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
		f(&mut self.out.lock())
	}
}

impl<W: Write + Send> UiSink for JsonLines<W> {
	fn deliver(&self, event: &UiEvent) {
		self.write(event);
	}
}

/// Answers each command line on `input` until EOF. Blank lines are skipped.
pub async fn serve<R, W>(input: R, router: &Router, out: &JsonLines<W>) -> std::io::Result<()>
where
	R: AsyncBufRead + Unpin,
	W: Write + Send,
{
	let mut lines = input.lines();
	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let reply = match serde_json::from_str::<Value>(line) {
			Ok(value) => router.command_value(value).await,
			Err(err) => CommandReply::error(format!("Invalid JSON: {err}")),
		};
		out.write(&reply);
	}
	debug!(target = "snaplink.surface", "command input closed");
	Ok(())
}
