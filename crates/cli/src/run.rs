//! Process lifecycle: start the link (or poller), serve commands, stop on
//! Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use snaplink::{CaptureAdapter, ClientConfig, PollConfig, Poller, Supervisor};
use snaplink_runtime::WebSocketConnector;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::capture;
use crate::surface::{self, JsonLines};

pub async fn execute(config: ClientConfig) -> Result<()> {
	let capture = capture::adapter(config.capture_command.as_deref());
	if !capture.is_available() {
		warn!(
			target = "snaplink.capture",
			"no capture command configured, capture requests will be answered with an error"
		);
	}

	match config.poll.clone() {
		Some(poll) => poll_until_interrupted(poll, capture).await,
		None => link_until_interrupted(config, capture).await,
	}
}

async fn link_until_interrupted(config: ClientConfig, capture: CaptureAdapter) -> Result<()> {
	let out = JsonLines::new(std::io::stdout());
	let client = Supervisor::builder(config)
		.capture(capture)
		.sink(Arc::new(out.clone()))
		.start(WebSocketConnector)
		.context("Failed to start client")?;

	let router = Arc::clone(client.router());
	let commands = tokio::spawn(async move {
		let stdin = BufReader::new(tokio::io::stdin());
		if let Err(err) = surface::serve(stdin, &router, &out).await {
			warn!(target = "snaplink.surface", error = %err, "stdin read failed");
		}
	});

	tokio::signal::ctrl_c()
		.await
		.context("Failed to listen for Ctrl+C")?;
	info!(target = "snaplink.session", "received Ctrl+C, shutting down");

	commands.abort();
	client.shutdown().await?;
	Ok(())
}

async fn poll_until_interrupted(poll: PollConfig, capture: CaptureAdapter) -> Result<()> {
	let poller = Poller::new(poll, capture).context("Failed to create HTTP client")?;
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let task = tokio::spawn(poller.run(shutdown_rx));

	tokio::signal::ctrl_c()
		.await
		.context("Failed to listen for Ctrl+C")?;
	info!(target = "snaplink.poll", "received Ctrl+C, shutting down");

	let _ = shutdown_tx.send(true);
	task.await.context("Poller task failed")?;
	Ok(())
}
