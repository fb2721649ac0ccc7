//! Process-level wiring: one session, one router, the event pump and the
//! liveness timer, started together and torn down in order.

use std::sync::Arc;

use serde_json::Value;
use snaplink_protocol::{CommandReply, LocalCommand};
use snaplink_runtime::{ConnectionSnapshot, Connector, Session, SessionHandle};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::capture::CaptureAdapter;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::router::Router;
use crate::sink::UiSink;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore, RecordBook};

pub struct SupervisorBuilder {
	config: ClientConfig,
	capture: CaptureAdapter,
	sinks: Vec<Arc<dyn UiSink>>,
	store: Option<Arc<dyn KeyValueStore>>,
}

impl SupervisorBuilder {
	pub fn capture(mut self, capture: CaptureAdapter) -> Self {
		self.capture = capture;
		self
	}

	pub fn sink(mut self, sink: Arc<dyn UiSink>) -> Self {
		self.sinks.push(sink);
		self
	}

	/// Overrides the store chosen from `store_path`.
	pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Validates the config, spawns every task and issues the first connect.
	pub fn start(self, connector: impl Connector) -> Result<Supervisor> {
		self.config.validate()?;

		let store: Arc<dyn KeyValueStore> = match (self.store, &self.config.store_path) {
			(Some(store), _) => store,
			(None, Some(path)) => Arc::new(JsonFileStore::open(path)),
			(None, None) => Arc::new(MemoryStore::new()),
		};
		let records = RecordBook::new(store, self.config.record_limit);

		let Session {
			handle,
			mut events,
			driver,
		} = Session::spawn(self.config.session(), connector);
		let router = Arc::new(Router::new(
			handle.clone(),
			self.capture,
			self.sinks,
			records,
		));

		info!(
			target = "snaplink.session",
			endpoint = %self.config.endpoint,
			"starting session"
		);
		handle.connect()?;

		let pump = {
			let router = Arc::clone(&router);
			tokio::spawn(async move {
				while let Some(event) = events.recv().await {
					router.on_event(event);
				}
				debug!(target = "snaplink.session", "event stream ended");
			})
		};

		let liveness = self.config.liveness_interval().map(|period| {
			let handle = handle.clone();
			tokio::spawn(async move {
				let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
				ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
				loop {
					ticker.tick().await;
					if handle.rearm().is_err() {
						break;
					}
				}
			})
		});

		Ok(Supervisor {
			handle,
			router,
			pump,
			driver,
			liveness,
		})
	}
}

/// Owns the running client. Dropping it without [`Supervisor::shutdown`]
/// leaves the tasks running until the runtime stops.
pub struct Supervisor {
	handle: SessionHandle,
	router: Arc<Router>,
	pump: JoinHandle<()>,
	driver: JoinHandle<()>,
	liveness: Option<JoinHandle<()>>,
}

impl Supervisor {
	pub fn builder(config: ClientConfig) -> SupervisorBuilder {
		SupervisorBuilder {
			config,
			capture: CaptureAdapter::unavailable(),
			sinks: Vec::new(),
			store: None,
		}
	}

	pub fn handle(&self) -> &SessionHandle {
		&self.handle
	}

	pub fn router(&self) -> &Arc<Router> {
		&self.router
	}

	pub fn status(&self) -> ConnectionSnapshot {
		self.handle.status()
	}

	pub async fn command(&self, command: LocalCommand) -> CommandReply {
		self.router.command(command).await
	}

	pub async fn command_value(&self, value: Value) -> CommandReply {
		self.router.command_value(value).await
	}

	/// Stops liveness, closes the connection, then waits for the driver and
	/// pump to drain. Safe to call in any connection state.
	pub async fn shutdown(self) -> Result<()> {
		if let Some(liveness) = &self.liveness {
			liveness.abort();
		}
		self.handle.shutdown()?;
		if let Err(err) = self.handle.closed().await {
			warn!(target = "snaplink.session", error = %err, "session ended before closing");
		}
		// the driver may already be gone
		let _ = self.handle.terminate();

		if let Err(err) = self.driver.await {
			warn!(target = "snaplink.session", error = %err, "session driver panicked");
		}
		if let Err(err) = self.pump.await {
			warn!(target = "snaplink.session", error = %err, "event pump panicked");
		}
		self.router.records().flush().await;
		info!(target = "snaplink.session", "shutdown complete");
		Ok(())
	}
}
