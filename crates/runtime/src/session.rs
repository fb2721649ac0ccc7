//! Async driver for one logical connection.
//!
//! A single task owns the [`ConnectionMachine`], the live transport and the
//! timers. Commands from [`SessionHandle`]s, dial results, transport events
//! and timer expirations all arrive on channels and are applied one at a
//! time, so transitions never interleave. Reader, writer, dial and timer
//! tasks only post events back into the driver.

use std::sync::Arc;
use std::time::Duration;

use snaplink_protocol::{Codec, ConnectionState, LinkStatus, Message, StatusEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::machine::{
	ABNORMAL_CLOSURE, ConnectionMachine, ConnectionSnapshot, Effect, Input, TransportEvent,
};
use crate::policy::ReconnectPolicy;
use crate::transport::{Connector, Inbound, Outbound, TransportParts};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8765";
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct SessionConfig {
	pub endpoint: String,
	pub codec: Codec,
	pub policy: ReconnectPolicy,
	/// How long `Closing` waits for the peer's close before giving up.
	pub close_timeout: Duration,
}

impl SessionConfig {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			..Self::default()
		}
	}
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			codec: Codec::default(),
			policy: ReconnectPolicy::default(),
			close_timeout: DEFAULT_CLOSE_TIMEOUT,
		}
	}
}

/// Output of the driver, in transition order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	Status(StatusEvent),
	Inbound(Message),
}

/// A running session: its handle, its event stream and the driver task.
pub struct Session {
	pub handle: SessionHandle,
	pub events: mpsc::UnboundedReceiver<SessionEvent>,
	pub driver: JoinHandle<()>,
}

impl Session {
	/// Starts the driver task in `Idle`. Nothing is dialed until
	/// [`SessionHandle::connect`] is called.
	pub fn spawn(config: SessionConfig, connector: impl Connector) -> Self {
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (internal_tx, internal_rx) = mpsc::unbounded_channel();
		let (event_tx, event_rx) = mpsc::unbounded_channel();

		let machine = ConnectionMachine::new(config.endpoint, config.policy);
		let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

		let driver = Driver {
			machine,
			codec: config.codec,
			close_timeout: config.close_timeout,
			connector: Arc::new(connector),
			link: None,
			reconnect_timer: None,
			close_timer: None,
			internal: internal_tx,
			events: event_tx,
			snapshot: snapshot_tx,
		};
		let driver = tokio::spawn(driver.run(command_rx, internal_rx));

		Self {
			handle: SessionHandle {
				commands: command_tx,
				snapshot: snapshot_rx,
				codec: config.codec,
			},
			events: event_rx,
			driver,
		}
	}
}

enum Command {
	Input(Input),
	Terminate,
}

enum Internal {
	Dialed {
		generation: u64,
		result: Result<TransportParts>,
	},
	Transport {
		generation: u64,
		event: TransportEvent,
	},
	TimerElapsed {
		generation: u64,
	},
	CloseTimeout {
		generation: u64,
	},
}

/// Cheap, cloneable access to a running session.
#[derive(Clone)]
pub struct SessionHandle {
	commands: mpsc::UnboundedSender<Command>,
	snapshot: watch::Receiver<ConnectionSnapshot>,
	codec: Codec,
}

impl SessionHandle {
	pub fn connect(&self) -> Result<()> {
		self.input(Input::Connect)
	}

	/// Re-enables auto reconnect, resets the attempt counter and connects.
	pub fn reconnect(&self) -> Result<()> {
		self.input(Input::Reconnect)
	}

	/// Liveness nudge; only dials if the link is down and retries remain.
	pub fn rearm(&self) -> Result<()> {
		self.input(Input::Rearm)
	}

	/// Stops auto reconnect and closes the transport. Idempotent.
	pub fn shutdown(&self) -> Result<()> {
		self.input(Input::Shutdown)
	}

	/// Encodes and sends `message`; dropped with a warning unless `Open`.
	pub fn send(&self, message: &Message) -> Result<()> {
		self.input(Input::Send(self.codec.encode(message)))
	}

	pub fn status(&self) -> ConnectionSnapshot {
		*self.snapshot.borrow()
	}

	pub fn codec(&self) -> Codec {
		self.codec
	}

	/// Resolves once the connection reaches `Closed`.
	pub async fn closed(&self) -> Result<()> {
		let mut snapshot = self.snapshot.clone();
		snapshot
			.wait_for(|snapshot| snapshot.state == ConnectionState::Closed)
			.await
			.map(|_| ())
			.map_err(|_| Error::ChannelClosed)
	}

	/// Stops the driver task outright, releasing the transport and timers.
	pub fn terminate(&self) -> Result<()> {
		self.commands
			.send(Command::Terminate)
			.map_err(|_| Error::ChannelClosed)
	}

	fn input(&self, input: Input) -> Result<()> {
		self.commands
			.send(Command::Input(input))
			.map_err(|_| Error::ChannelClosed)
	}
}

struct Link {
	generation: u64,
	outbound: mpsc::UnboundedSender<Outbound>,
	reader: JoinHandle<()>,
	writer: JoinHandle<()>,
}

impl Link {
	fn release(self) {
		self.reader.abort();
		self.writer.abort();
	}
}

struct Driver {
	machine: ConnectionMachine,
	codec: Codec,
	close_timeout: Duration,
	connector: Arc<dyn Connector>,
	link: Option<Link>,
	reconnect_timer: Option<JoinHandle<()>>,
	close_timer: Option<JoinHandle<()>>,
	internal: mpsc::UnboundedSender<Internal>,
	events: mpsc::UnboundedSender<SessionEvent>,
	snapshot: watch::Sender<ConnectionSnapshot>,
}

impl Driver {
	async fn run(
		mut self,
		mut commands: mpsc::UnboundedReceiver<Command>,
		mut internal: mpsc::UnboundedReceiver<Internal>,
	) {
		loop {
			tokio::select! {
				command = commands.recv() => match command {
					Some(Command::Input(input)) => self.apply(input),
					Some(Command::Terminate) | None => break,
				},
				Some(event) = internal.recv() => self.on_internal(event),
			}
		}

		debug!(target = "snaplink.session", "session driver stopped");
		if let Some(link) = self.link.take() {
			link.release();
		}
		abort(&mut self.reconnect_timer);
		abort(&mut self.close_timer);
	}

	fn on_internal(&mut self, event: Internal) {
		match event {
			Internal::Dialed { generation, result } => match result {
				Ok(parts) => {
					let current = generation == self.machine.generation()
						&& self.machine.state() == ConnectionState::Connecting;
					if !current {
						debug!(
							target = "snaplink.session",
							generation, "discarding superseded transport"
						);
						return;
					}
					self.install(generation, parts);
					self.apply(Input::Transport {
						generation,
						event: TransportEvent::Opened,
					});
				}
				Err(err) => self.apply(Input::Transport {
					generation,
					event: TransportEvent::Failed(err.to_string()),
				}),
			},
			Internal::Transport { generation, event } => {
				self.apply(Input::Transport { generation, event })
			}
			Internal::TimerElapsed { generation } => self.apply(Input::TimerElapsed { generation }),
			Internal::CloseTimeout { generation } => self.apply(Input::CloseTimeout { generation }),
		}
	}

	fn apply(&mut self, input: Input) {
		let effects = self.machine.handle(input);
		self.snapshot.send_replace(self.machine.snapshot());
		for effect in effects {
			self.execute(effect);
		}
	}

	fn execute(&mut self, effect: Effect) {
		match effect {
			Effect::Dial { generation } => {
				abort(&mut self.reconnect_timer);
				self.dial(generation);
			}
			Effect::Handshake => {
				let frame = self.codec.encode(&Message::handshake());
				self.transmit(Outbound::Text(frame));
			}
			Effect::Transmit(frame) => self.transmit(Outbound::Text(frame)),
			Effect::CloseTransport { code, reason } => {
				self.transmit(Outbound::Close { code, reason })
			}
			Effect::ArmCloseTimeout { generation } => {
				abort(&mut self.close_timer);
				let internal = self.internal.clone();
				let timeout = self.close_timeout;
				self.close_timer = Some(tokio::spawn(async move {
					tokio::time::sleep(timeout).await;
					let _ = internal.send(Internal::CloseTimeout { generation });
				}));
			}
			Effect::ScheduleReconnect { generation, delay } => {
				abort(&mut self.reconnect_timer);
				info!(
					target = "snaplink.session",
					attempt = self.machine.attempt_count(),
					delay_ms = delay.as_millis() as u64,
					"scheduling reconnect"
				);
				let internal = self.internal.clone();
				self.reconnect_timer = Some(tokio::spawn(async move {
					tokio::time::sleep(delay).await;
					let _ = internal.send(Internal::TimerElapsed { generation });
				}));
			}
			Effect::Release { generation } => {
				if self.link.as_ref().is_some_and(|link| link.generation == generation) {
					if let Some(link) = self.link.take() {
						link.release();
					}
					abort(&mut self.close_timer);
				}
			}
			Effect::Status(event) => {
				match event.status {
					LinkStatus::Error => warn!(
						target = "snaplink.session",
						attempt = event.attempt_count,
						"{}",
						event.message
					),
					_ => info!(
						target = "snaplink.session",
						status = %event.status,
						attempt = event.attempt_count,
						"{}",
						event.message
					),
				}
				let _ = self.events.send(SessionEvent::Status(event));
			}
			Effect::Deliver(bytes) => match self.codec.decode(&bytes) {
				Ok(message) => {
					debug!(target = "snaplink.session", kind = %message.kind, "received");
					let _ = self.events.send(SessionEvent::Inbound(message));
				}
				Err(err) => {
					warn!(target = "snaplink.session", error = %err, "dropping undecodable frame");
				}
			},
			Effect::Dropped(frame) => {
				warn!(
					target = "snaplink.session",
					bytes = frame.len(),
					"not connected, message dropped"
				);
			}
		}
	}

	fn dial(&self, generation: u64) {
		let connector = Arc::clone(&self.connector);
		let endpoint = self.machine.endpoint().to_string();
		let internal = self.internal.clone();
		tokio::spawn(async move {
			let result = connector.connect(&endpoint).await;
			let _ = internal.send(Internal::Dialed { generation, result });
		});
	}

	fn install(&mut self, generation: u64, parts: TransportParts) {
		if let Some(stale) = self.link.take() {
			warn!(
				target = "snaplink.session",
				generation = stale.generation,
				"releasing leftover transport"
			);
			stale.release();
		}

		let TransportParts {
			mut sender,
			mut receiver,
		} = parts;
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

		let internal = self.internal.clone();
		let writer = tokio::spawn(async move {
			while let Some(frame) = outbound_rx.recv().await {
				let closing = matches!(frame, Outbound::Close { .. });
				if let Err(err) = sender.send(frame).await {
					let _ = internal.send(Internal::Transport {
						generation,
						event: TransportEvent::Error(err.to_string()),
					});
					break;
				}
				if closing {
					break;
				}
			}
		});

		let internal = self.internal.clone();
		let reader = tokio::spawn(async move {
			while let Some(item) = receiver.recv().await {
				let event = match item {
					Inbound::Frame(bytes) => TransportEvent::Frame(bytes),
					Inbound::Error(message) => TransportEvent::Error(message),
					Inbound::Closed { code, reason } => {
						let _ = internal.send(Internal::Transport {
							generation,
							event: TransportEvent::Closed { code, reason },
						});
						return;
					}
				};
				if internal.send(Internal::Transport { generation, event }).is_err() {
					return;
				}
			}
			let _ = internal.send(Internal::Transport {
				generation,
				event: TransportEvent::Closed {
					code: ABNORMAL_CLOSURE,
					reason: "connection lost".into(),
				},
			});
		});

		self.link = Some(Link {
			generation,
			outbound,
			reader,
			writer,
		});
	}

	fn transmit(&self, frame: Outbound) {
		match &self.link {
			Some(link) => {
				if link.outbound.send(frame).is_err() {
					debug!(target = "snaplink.session", "writer already gone");
				}
			}
			None => debug!(target = "snaplink.session", "no transport for outbound frame"),
		}
	}
}

fn abort(timer: &mut Option<JoinHandle<()>>) {
	if let Some(handle) = timer.take() {
		handle.abort();
	}
}
