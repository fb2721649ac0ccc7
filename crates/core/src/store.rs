//! Durable key-value store and the bounded message log.
//!
//! Persistence is best-effort: write failures are logged and never block
//! routing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use snaplink_protocol::{
	Direction, LATEST_MESSAGE_KEY, MESSAGE_LOG_KEY, StoredRecord, UiEvent, now_millis,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

pub const DEFAULT_RECORD_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("store I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("store encoding failed: {0}")]
	Json(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
	fn get(&self, key: &str) -> Option<Value>;
	fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Option<Value> {
		self.entries.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
		self.entries.lock().insert(key.to_string(), value);
		Ok(())
	}
}

/// One JSON document on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
	path: PathBuf,
	entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
	/// Opens `path`, starting empty when the file is missing or unreadable.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let entries = load_json(&path).unwrap_or_default();
		Self {
			path,
			entries: Mutex::new(entries),
		}
	}
}

impl KeyValueStore for JsonFileStore {
	fn get(&self, key: &str) -> Option<Value> {
		self.entries.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
		let mut entries = self.entries.lock();
		entries.insert(key.to_string(), value);
		save_json(&self.path, &*entries)
	}
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
	fs::read_to_string(path)
		.ok()
		.and_then(|content| serde_json::from_str(&content).ok())
}

fn save_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), StorageError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)?;
		}
	}
	fs::write(path, serde_json::to_string_pretty(data)?)?;
	Ok(())
}

/// Queued store operation. `Flush` resolves once every earlier write landed.
enum Write {
	Set { key: &'static str, value: Value },
	Flush(oneshot::Sender<()>),
}

/// Append-only record list truncated from the oldest end, mirrored into a
/// [`KeyValueStore`] under [`MESSAGE_LOG_KEY`].
///
/// Writes are queued in append order and applied one at a time by a writer
/// task on the blocking pool. Must be created inside a tokio runtime.
pub struct RecordBook {
	limit: usize,
	records: Mutex<Vec<StoredRecord>>,
	latest: Mutex<Option<Value>>,
	writes: mpsc::UnboundedSender<Write>,
}

impl RecordBook {
	/// Loads any previously stored log, trimmed to `limit`.
	pub fn new(store: Arc<dyn KeyValueStore>, limit: usize) -> Self {
		let limit = limit.max(1);
		let mut records: Vec<StoredRecord> = store
			.get(MESSAGE_LOG_KEY)
			.and_then(|value| serde_json::from_value(value).ok())
			.unwrap_or_default();
		trim(&mut records, limit);
		let latest = store.get(LATEST_MESSAGE_KEY);

		let (writes, rx) = mpsc::unbounded_channel();
		tokio::spawn(run_writer(store, rx));

		Self {
			limit,
			records: Mutex::new(records),
			latest: Mutex::new(latest),
			writes,
		}
	}

	pub fn record(&self, direction: Direction, kind: &str, content: impl Into<String>) {
		let mut records = self.records.lock();
		records.push(StoredRecord {
			direction,
			kind: kind.to_string(),
			content: content.into(),
			timestamp: now_millis(),
		});
		trim(&mut records, self.limit);
		// queued under the lock so persisted order matches append order
		match serde_json::to_value(&*records) {
			Ok(value) => self.enqueue(MESSAGE_LOG_KEY, value),
			Err(err) => warn!(target = "snaplink.router", error = %err, "failed to encode message log"),
		}
	}

	/// Remembers the most recent UI event.
	pub fn set_latest(&self, event: &UiEvent) {
		let value = match serde_json::to_value(event) {
			Ok(value) => value,
			Err(err) => {
				warn!(target = "snaplink.router", error = %err, "failed to encode latest message");
				return;
			}
		};
		let mut latest = self.latest.lock();
		*latest = Some(value.clone());
		self.enqueue(LATEST_MESSAGE_KEY, value);
	}

	pub fn records(&self) -> Vec<StoredRecord> {
		self.records.lock().clone()
	}

	pub fn latest(&self) -> Option<Value> {
		self.latest.lock().clone()
	}

	/// Waits until every write queued so far has reached the store.
	pub async fn flush(&self) {
		let (done, wait) = oneshot::channel();
		if self.writes.send(Write::Flush(done)).is_ok() {
			let _ = wait.await;
		}
	}

	fn enqueue(&self, key: &'static str, value: Value) {
		if self.writes.send(Write::Set { key, value }).is_err() {
			warn!(target = "snaplink.router", key, "store writer gone, state not persisted");
		}
	}
}

async fn run_writer(store: Arc<dyn KeyValueStore>, mut rx: mpsc::UnboundedReceiver<Write>) {
	while let Some(write) = rx.recv().await {
		match write {
			Write::Set { key, value } => {
				let store = Arc::clone(&store);
				let result = tokio::task::spawn_blocking(move || store.set(key, value)).await;
				match result {
					Ok(Ok(())) => {}
					Ok(Err(err)) => {
						warn!(target = "snaplink.router", key, error = %err, "failed to persist state")
					}
					Err(err) => warn!(target = "snaplink.router", key, error = %err, "store write panicked"),
				}
			}
			Write::Flush(done) => {
				let _ = done.send(());
			}
		}
	}
}

fn trim(records: &mut Vec<StoredRecord>, limit: usize) {
	if records.len() > limit {
		let excess = records.len() - limit;
		records.drain(0..excess);
	}
}
