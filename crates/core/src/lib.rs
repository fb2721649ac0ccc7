//! snaplink: a resilient capture-link client.
//!
//! Holds one WebSocket connection to a coordination server, reconnects on a
//! fixed (or exponential) schedule, answers `capture` requests with a
//! screenshot of the visible surface and relays server pushes to local UI
//! sinks. An HTTP polling loop can stand in for the socket.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use snaplink::{ChannelSink, ClientConfig, Supervisor};
//! use snaplink_runtime::WebSocketConnector;
//!
//! #[tokio::main]
//! async fn main() -> snaplink::Result<()> {
//!     let (sink, mut ui) = ChannelSink::new();
//!     let client = Supervisor::builder(ClientConfig::default())
//!         .sink(Arc::new(sink))
//!         .start(WebSocketConnector)?;
//!
//!     while let Some(event) = ui.recv().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//!     client.shutdown().await
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod poller;
pub mod router;
pub mod sink;
pub mod store;
pub mod supervisor;

pub use capture::{CaptureAdapter, CaptureError, CaptureFuture, CaptureProvider, Image, StaticCapture};
pub use config::{BackoffStrategy, ClientConfig, PollConfig, ReconnectConfig};
pub use error::{Error, Result};
pub use poller::{PollOutcome, Poller};
pub use router::Router;
pub use sink::{ChannelSink, UiSink};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, RecordBook, StorageError};
pub use supervisor::{Supervisor, SupervisorBuilder};
