//! HTTP polling fallback.
//!
//! Asks `GET {base}/check-status` whether a capture is wanted and answers
//! with `POST {base}/upload-screenshot`. Nothing here retries: a failed
//! round is logged and the next tick tries again.

use std::time::Duration;

use serde_json::Value;
use snaplink_protocol::{CheckStatusResponse, UploadScreenshot};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::capture::CaptureAdapter;
use crate::config::PollConfig;
use crate::error::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What one polling round did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
	/// No capture was pending.
	Idle,
	Uploaded { id: Value },
	/// The capture failed; the request is dropped.
	CaptureFailed { id: Value, error: String },
}

pub struct Poller {
	client: reqwest::Client,
	base_url: String,
	interval: Duration,
	capture: CaptureAdapter,
}

impl Poller {
	pub fn new(config: PollConfig, capture: CaptureAdapter) -> Result<Self> {
		config.validate()?;
		let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		Ok(Self {
			client,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			interval: config.interval(),
			capture,
		})
	}

	pub async fn poll_once(&self) -> Result<PollOutcome> {
		let status: CheckStatusResponse = self
			.client
			.get(format!("{}/check-status", self.base_url))
			.send()
			.await?
			.error_for_status()?
			.json()
			.await?;

		let Some(pending) = status.request else {
			return Ok(PollOutcome::Idle);
		};
		info!(target = "snaplink.poll", id = %pending.id, "capture requested");

		let image = match self.capture.capture_visible_surface().await {
			Ok(image) => image,
			Err(err) => {
				warn!(target = "snaplink.poll", id = %pending.id, error = %err, "capture failed");
				return Ok(PollOutcome::CaptureFailed {
					id: pending.id,
					error: err.to_string(),
				});
			}
		};

		let body = UploadScreenshot {
			id: pending.id,
			screenshot_data: image.to_data_url(),
		};
		let response = self
			.client
			.post(format!("{}/upload-screenshot", self.base_url))
			.json(&body)
			.send()
			.await?;
		debug!(
			target = "snaplink.poll",
			id = %body.id,
			status = %response.status(),
			"screenshot uploaded"
		);
		Ok(PollOutcome::Uploaded { id: body.id })
	}

	/// Polls until `shutdown` flips to `true` or its sender is dropped.
	pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
		info!(
			target = "snaplink.poll",
			base_url = %self.base_url,
			interval_ms = self.interval.as_millis() as u64,
			"polling started"
		);
		let mut ticker = interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if let Err(err) = self.poll_once().await {
						warn!(target = "snaplink.poll", error = %err, "poll failed");
					}
				}
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						break;
					}
				}
			}
		}
		info!(target = "snaplink.poll", "polling stopped");
	}
}
