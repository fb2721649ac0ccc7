use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use snaplink::{ClientConfig, PollConfig};
use snaplink_protocol::Discriminator;

pub const CONFIG_DIR: &str = "snaplink";
pub const CONFIG_FILE: &str = "config.json";

/// Wire variant selector (CLI wrapper for [`Discriminator`])
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliDiscriminator {
	/// `{"type": ...}` messages
	Type,
	/// `{"action": ...}` messages
	Action,
}

impl From<CliDiscriminator> for Discriminator {
	fn from(value: CliDiscriminator) -> Self {
		match value {
			CliDiscriminator::Type => Discriminator::Type,
			CliDiscriminator::Action => Discriminator::Action,
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "snaplink")]
#[command(about = "Keeps a capture link to a coordination server and answers screenshot requests")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file (default: <config dir>/snaplink/config.json if present)
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// WebSocket endpoint of the coordination server
	#[arg(long, env = "SNAPLINK_ENDPOINT", value_name = "URL")]
	pub endpoint: Option<String>,

	/// Message discriminator used on the wire
	#[arg(long, value_enum)]
	pub discriminator: Option<CliDiscriminator>,

	/// Fixed delay between reconnect attempts
	#[arg(long, value_name = "MS")]
	pub reconnect_interval_ms: Option<u64>,

	/// Give up after this many consecutive failed attempts
	#[arg(long, value_name = "N")]
	pub max_attempts: Option<u32>,

	/// Never reconnect after the connection drops
	#[arg(long)]
	pub no_auto_reconnect: bool,

	/// Number of stored message records to keep
	#[arg(long, value_name = "N")]
	pub record_limit: Option<usize>,

	/// Persist records and the latest event to this JSON file
	#[arg(long, value_name = "FILE")]
	pub store: Option<PathBuf>,

	/// Program that writes a PNG of the visible surface to stdout (e.g. "grim -")
	#[arg(long, value_name = "COMMAND")]
	pub capture_cmd: Option<String>,

	/// Use HTTP polling against this base URL instead of the WebSocket link
	#[arg(long, value_name = "BASE_URL")]
	pub poll: Option<String>,

	/// Polling interval
	#[arg(long, value_name = "MS", requires = "poll")]
	pub poll_interval_ms: Option<u64>,
}

impl Cli {
	/// Loads the config file (explicit or default) and applies flag overrides.
	pub fn resolve_config(&self) -> Result<ClientConfig> {
		let mut config = match &self.config {
			Some(path) => load(path)?,
			None => match default_config_path() {
				Some(path) if path.exists() => load(&path)?,
				_ => ClientConfig::default(),
			},
		};
		self.apply(&mut config);
		config.validate()?;
		Ok(config)
	}

	fn apply(&self, config: &mut ClientConfig) {
		if let Some(endpoint) = &self.endpoint {
			config.endpoint = endpoint.clone();
		}
		if let Some(discriminator) = self.discriminator {
			config.discriminator = discriminator.into();
		}
		if let Some(interval) = self.reconnect_interval_ms {
			config.reconnect.interval_ms = interval;
		}
		if let Some(max) = self.max_attempts {
			config.reconnect.max_attempts = max;
		}
		if self.no_auto_reconnect {
			config.reconnect.auto_reconnect = false;
		}
		if let Some(limit) = self.record_limit {
			config.record_limit = limit;
		}
		if let Some(store) = &self.store {
			config.store_path = Some(store.clone());
		}
		if let Some(command) = &self.capture_cmd {
			config.capture_command = Some(command.split_whitespace().map(String::from).collect());
		}
		if let Some(base_url) = &self.poll {
			let mut poll = PollConfig::new(base_url.clone());
			if let Some(interval) = self.poll_interval_ms {
				poll.interval_ms = interval;
			}
			config.poll = Some(poll);
		}
	}
}

fn load(path: &Path) -> Result<ClientConfig> {
	ClientConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
