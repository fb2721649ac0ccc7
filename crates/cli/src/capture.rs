//! Capture through an external screenshot program.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use snaplink::{CaptureAdapter, CaptureError, CaptureFuture, CaptureProvider, Image};
use tokio::process::Command;
use tracing::debug;

/// Runs `program args...` and takes its stdout as a PNG.
#[derive(Debug, Clone)]
pub struct CommandCapture {
	program: String,
	args: Vec<String>,
}

impl CommandCapture {
	/// `None` for an empty argv.
	pub fn from_argv(argv: &[String]) -> Option<Self> {
		let (program, args) = argv.split_first()?;
		Some(Self {
			program: program.clone(),
			args: args.to_vec(),
		})
	}
}

impl CaptureProvider for CommandCapture {
	fn capture(&self) -> CaptureFuture<'_> {
		Box::pin(async move {
			debug!(target = "snaplink.capture", program = %self.program, "running capture command");
			let output = Command::new(&self.program)
				.args(&self.args)
				.stdin(Stdio::null())
				.stdout(Stdio::piped())
				.stderr(Stdio::piped())
				.kill_on_drop(true)
				.output()
				.await
				.map_err(|err| match err.kind() {
					ErrorKind::NotFound | ErrorKind::PermissionDenied => {
						CaptureError::Unavailable(format!("{}: {}", self.program, err))
					}
					_ => CaptureError::Platform(format!("failed to run {}: {}", self.program, err)),
				})?;

			if !output.status.success() {
				let stderr = String::from_utf8_lossy(&output.stderr);
				let detail = match stderr.trim() {
					"" => output.status.to_string(),
					trimmed => trimmed.to_string(),
				};
				return Err(CaptureError::Platform(format!("{} failed: {}", self.program, detail)));
			}

			Ok(Image::png(output.stdout))
		})
	}
}

/// Adapter for the configured command, or one that always reports unavailable.
pub fn adapter(argv: Option<&[String]>) -> CaptureAdapter {
	match argv.and_then(CommandCapture::from_argv) {
		Some(provider) => CaptureAdapter::new(Arc::new(provider)),
		None => CaptureAdapter::unavailable(),
	}
}
