//! Session runtime for the snaplink capture link.
//!
//! - **Machine**: the sans-IO connection state machine and its generation guard
//! - **Policy**: fixed or exponential reconnect delay and the attempt ceiling
//! - **Transport**: connector traits and the tokio-tungstenite implementation
//! - **Session**: the single-task driver that owns the machine and its timers
//!
//! # Architecture
//!
//! ```text
//! SessionHandle ──commands──► Driver ──SessionEvent──► router
//!                               │ ▲
//!                 dial / timers │ │ transport events
//!                               ▼ │
//!                           Connector
//! ```

pub mod error;
pub mod machine;
pub mod policy;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use machine::{
	ABNORMAL_CLOSURE, ConnectionMachine, ConnectionSnapshot, Effect, Input, NORMAL_CLOSURE,
	TransportEvent,
};
pub use policy::{Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL, ReconnectPolicy};
pub use session::{
	DEFAULT_CLOSE_TIMEOUT, DEFAULT_ENDPOINT, Session, SessionConfig, SessionEvent, SessionHandle,
};
pub use transport::{
	Connector, Inbound, Outbound, TransportParts, TransportReceiver, TransportSender,
	WebSocketConnector,
};
