//! Client configuration.
//!
//! Every field has a default so a partial JSON file (or none at all) is
//! valid. The CLI layers its flags on top of what is loaded here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snaplink_protocol::{Codec, Discriminator};
use snaplink_runtime::{
	Backoff, DEFAULT_CLOSE_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_MAX_ATTEMPTS,
	DEFAULT_RECONNECT_INTERVAL, ReconnectPolicy, SessionConfig,
};

use crate::error::{Error, Result};
use crate::store::DEFAULT_RECORD_LIMIT;

pub const DEFAULT_LIVENESS_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 6_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
	#[default]
	Fixed,
	Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectConfig {
	pub interval_ms: u64,
	pub max_attempts: u32,
	pub strategy: BackoffStrategy,
	/// Upper bound for the exponential strategy.
	pub max_delay_ms: u64,
	pub auto_reconnect: bool,
}

impl Default for ReconnectConfig {
	fn default() -> Self {
		Self {
			interval_ms: DEFAULT_RECONNECT_INTERVAL.as_millis() as u64,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			strategy: BackoffStrategy::Fixed,
			max_delay_ms: DEFAULT_MAX_DELAY_MS,
			auto_reconnect: true,
		}
	}
}

impl ReconnectConfig {
	pub fn policy(&self) -> ReconnectPolicy {
		let interval = Duration::from_millis(self.interval_ms);
		let backoff = match self.strategy {
			BackoffStrategy::Fixed => Backoff::Fixed(interval),
			BackoffStrategy::Exponential => Backoff::Exponential {
				initial: interval,
				max: Duration::from_millis(self.max_delay_ms.max(self.interval_ms)),
			},
		};
		ReconnectPolicy {
			backoff,
			ceiling: self.max_attempts,
			auto_reconnect: self.auto_reconnect,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
	pub base_url: String,
	#[serde(default = "default_poll_interval")]
	pub interval_ms: u64,
}

impl PollConfig {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			interval_ms: DEFAULT_POLL_INTERVAL_MS,
		}
	}

	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}

	pub fn validate(&self) -> Result<()> {
		if self.interval_ms == 0 {
			return Err(Error::Config("poll interval must be positive".into()));
		}
		Ok(())
	}
}

fn default_poll_interval() -> u64 {
	DEFAULT_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	pub endpoint: String,
	pub discriminator: Discriminator,
	pub reconnect: ReconnectConfig,
	/// 0 disables the liveness timer.
	pub liveness_interval_ms: u64,
	pub close_timeout_ms: u64,
	pub record_limit: usize,
	/// In-memory store when absent.
	pub store_path: Option<PathBuf>,
	/// argv of an external program that writes a PNG to stdout.
	pub capture_command: Option<Vec<String>>,
	pub poll: Option<PollConfig>,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			discriminator: Discriminator::default(),
			reconnect: ReconnectConfig::default(),
			liveness_interval_ms: DEFAULT_LIVENESS_INTERVAL_MS,
			close_timeout_ms: DEFAULT_CLOSE_TIMEOUT.as_millis() as u64,
			record_limit: DEFAULT_RECORD_LIMIT,
			store_path: None,
			capture_command: None,
			poll: None,
		}
	}
}

impl ClientConfig {
	/// Reads a JSON config file; missing fields take their defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		let config: Self = serde_json::from_str(&content)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		let scheme_ok = self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://");
		if !scheme_ok {
			return Err(Error::Config(format!(
				"endpoint must be a ws:// or wss:// URL, got {:?}",
				self.endpoint
			)));
		}
		if self.reconnect.interval_ms == 0 {
			return Err(Error::Config("reconnect interval must be positive".into()));
		}
		if self.record_limit == 0 {
			return Err(Error::Config("record limit must be at least 1".into()));
		}
		if let Some(argv) = &self.capture_command {
			if argv.is_empty() {
				return Err(Error::Config("capture command is empty".into()));
			}
		}
		if let Some(poll) = &self.poll {
			poll.validate()?;
		}
		Ok(())
	}

	pub fn liveness_interval(&self) -> Option<Duration> {
		(self.liveness_interval_ms > 0).then(|| Duration::from_millis(self.liveness_interval_ms))
	}

	pub fn session(&self) -> SessionConfig {
		SessionConfig {
			endpoint: self.endpoint.clone(),
			codec: Codec::new(self.discriminator),
			policy: self.reconnect.policy(),
			close_timeout: Duration::from_millis(self.close_timeout_ms),
		}
	}
}
