//! Sans-IO connection state machine.
//!
//! [`ConnectionMachine::handle`] is the single transition function. It never
//! touches a socket or a clock; it returns [`Effect`]s that the session driver
//! carries out, and the driver feeds results back in as [`Input`]s.
//!
//! Every dial and every shutdown bumps a generation counter. Timers, dial
//! results and transport events carry the generation they were created for
//! and are ignored once stale, so a superseded timer cannot dial and a
//! superseded dial cannot install a second transport.

use std::time::Duration;

use snaplink_protocol::{ConnectionState, LinkStatus, StatusEvent};

use crate::policy::ReconnectPolicy;

/// Close code used when the transport ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code sent on an orderly shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// What a transport reports back to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	Opened,
	/// The dial never produced an open transport.
	Failed(String),
	Closed { code: u16, reason: String },
	/// A non-fatal transport error; a close usually follows.
	Error(String),
	Frame(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
	Connect,
	/// Operator reconnect: re-enable auto reconnect, reset attempts, connect.
	Reconnect,
	/// Liveness tick: connect only if the link is down and may still retry.
	Rearm,
	Shutdown,
	/// An already-encoded outbound frame.
	Send(String),
	TimerElapsed { generation: u64 },
	CloseTimeout { generation: u64 },
	Transport { generation: u64, event: TransportEvent },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
	Dial { generation: u64 },
	/// Send the handshake frame on the transport that just opened.
	Handshake,
	Transmit(String),
	CloseTransport { code: u16, reason: String },
	ArmCloseTimeout { generation: u64 },
	ScheduleReconnect { generation: u64, delay: Duration },
	/// Tear down whatever transport belongs to `generation`.
	Release { generation: u64 },
	Status(StatusEvent),
	Deliver(Vec<u8>),
	/// An outbound frame was dropped because the link is not open.
	Dropped(String),
}

/// Point-in-time view of the connection published after each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
	pub state: ConnectionState,
	pub attempt_count: u32,
	pub auto_reconnect: bool,
}

#[derive(Debug)]
pub struct ConnectionMachine {
	endpoint: String,
	policy: ReconnectPolicy,
	state: ConnectionState,
	attempt_count: u32,
	auto_reconnect: bool,
	generation: u64,
}

impl ConnectionMachine {
	pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
		Self {
			endpoint: endpoint.into(),
			auto_reconnect: policy.auto_reconnect,
			policy,
			state: ConnectionState::Idle,
			attempt_count: 0,
			generation: 0,
		}
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn state(&self) -> ConnectionState {
		self.state
	}

	pub fn attempt_count(&self) -> u32 {
		self.attempt_count
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn snapshot(&self) -> ConnectionSnapshot {
		ConnectionSnapshot {
			state: self.state,
			attempt_count: self.attempt_count,
			auto_reconnect: self.auto_reconnect,
		}
	}

	pub fn handle(&mut self, input: Input) -> Vec<Effect> {
		let mut effects = Vec::new();
		match input {
			Input::Connect => self.connect(&mut effects),
			Input::Reconnect => {
				self.auto_reconnect = true;
				self.attempt_count = 0;
				self.connect(&mut effects);
			}
			Input::Rearm => {
				if self.auto_reconnect
					&& self.is_down()
					&& self.attempt_count < self.policy.ceiling
				{
					self.connect(&mut effects);
				}
			}
			Input::Shutdown => self.shutdown(&mut effects),
			Input::Send(frame) => {
				if self.state == ConnectionState::Open {
					effects.push(Effect::Transmit(frame));
				} else {
					effects.push(Effect::Dropped(frame));
				}
			}
			Input::TimerElapsed { generation } => {
				if generation == self.generation
					&& self.state == ConnectionState::Reconnecting
					&& self.auto_reconnect
				{
					self.connect(&mut effects);
				}
			}
			Input::CloseTimeout { generation } => {
				if generation == self.generation && self.state == ConnectionState::Closing {
					self.state = ConnectionState::Closed;
					effects.push(Effect::Release { generation });
					effects.push(self.status(LinkStatus::Disconnected, "Close handshake timed out"));
				}
			}
			Input::Transport { generation, event } => {
				self.on_transport(generation, event, &mut effects)
			}
		}
		effects
	}

	fn is_down(&self) -> bool {
		matches!(
			self.state,
			ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Reconnecting
		)
	}

	fn connect(&mut self, effects: &mut Vec<Effect>) {
		if !self.is_down() {
			return;
		}
		self.generation += 1;
		self.state = ConnectionState::Connecting;
		effects.push(self.status(
			LinkStatus::Connecting,
			format!("Connecting to {}", self.endpoint),
		));
		effects.push(Effect::Dial {
			generation: self.generation,
		});
	}

	fn shutdown(&mut self, effects: &mut Vec<Effect>) {
		self.auto_reconnect = false;
		match self.state {
			ConnectionState::Closing | ConnectionState::Closed => {}
			ConnectionState::Open => {
				self.state = ConnectionState::Closing;
				effects.push(Effect::CloseTransport {
					code: NORMAL_CLOSURE,
					reason: "client shutdown".into(),
				});
				effects.push(Effect::ArmCloseTimeout {
					generation: self.generation,
				});
				effects.push(self.status(LinkStatus::Closing, "Closing connection"));
			}
			ConnectionState::Idle | ConnectionState::Connecting | ConnectionState::Reconnecting => {
				let stale = self.generation;
				self.generation += 1;
				self.state = ConnectionState::Closed;
				effects.push(Effect::Release { generation: stale });
				effects.push(self.status(LinkStatus::Disconnected, "Disconnected"));
			}
		}
	}

	fn on_transport(&mut self, generation: u64, event: TransportEvent, effects: &mut Vec<Effect>) {
		if generation != self.generation {
			if event == TransportEvent::Opened {
				effects.push(Effect::Release { generation });
			}
			return;
		}

		match (self.state, event) {
			(ConnectionState::Connecting, TransportEvent::Opened) => {
				self.state = ConnectionState::Open;
				self.attempt_count = 0;
				effects.push(Effect::Handshake);
				effects.push(self.status(LinkStatus::Connected, "Connected to server"));
			}
			(_, TransportEvent::Opened) => effects.push(Effect::Release { generation }),

			(ConnectionState::Connecting, TransportEvent::Failed(reason))
			| (ConnectionState::Connecting, TransportEvent::Error(reason)) => {
				effects.push(Effect::Release { generation });
				effects.push(self.status(LinkStatus::Error, format!("Connection failed: {reason}")));
				self.after_loss(effects);
			}
			(
				ConnectionState::Connecting | ConnectionState::Open,
				TransportEvent::Closed { code, reason },
			) => {
				effects.push(Effect::Release { generation });
				effects.push(Effect::Status(
					self.event(LinkStatus::Disconnected, close_message(code, &reason))
						.with_code(code),
				));
				self.after_loss(effects);
			}
			(ConnectionState::Open, TransportEvent::Error(reason)) => {
				effects.push(self.status(LinkStatus::Error, format!("Connection error: {reason}")));
			}

			(ConnectionState::Closing, TransportEvent::Closed { code, .. }) => {
				self.state = ConnectionState::Closed;
				effects.push(Effect::Release { generation });
				effects.push(Effect::Status(
					self.event(LinkStatus::Disconnected, "Disconnected").with_code(code),
				));
			}

			(ConnectionState::Open | ConnectionState::Closing, TransportEvent::Frame(bytes)) => {
				effects.push(Effect::Deliver(bytes));
			}

			_ => {}
		}
	}

	/// Decide between another attempt and giving up after a lost transport.
	fn after_loss(&mut self, effects: &mut Vec<Effect>) {
		if self.auto_reconnect && self.attempt_count < self.policy.ceiling {
			self.attempt_count += 1;
			self.state = ConnectionState::Reconnecting;
			effects.push(Effect::ScheduleReconnect {
				generation: self.generation,
				delay: self.policy.backoff.delay_for(self.attempt_count),
			});
		} else {
			self.state = ConnectionState::Closed;
		}
	}

	fn event(&self, status: LinkStatus, message: impl Into<String>) -> StatusEvent {
		StatusEvent::new(status, message, self.attempt_count)
	}

	fn status(&self, status: LinkStatus, message: impl Into<String>) -> Effect {
		Effect::Status(self.event(status, message))
	}
}

fn close_message(code: u16, reason: &str) -> String {
	if reason.is_empty() {
		format!("Disconnected (code {code})")
	} else {
		format!("Disconnected (code {code}): {reason}")
	}
}
