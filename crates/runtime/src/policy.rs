//! Reconnect timing and the attempt ceiling.

use std::time::Duration;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 999;

/// Delay between a lost connection and the next dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
	Fixed(Duration),
	/// Doubles per attempt starting at `initial`, capped at `max`.
	Exponential { initial: Duration, max: Duration },
}

impl Backoff {
	/// Delay before reconnect attempt number `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		match *self {
			Backoff::Fixed(interval) => interval,
			Backoff::Exponential { initial, max } => {
				let factor = 1u32
					.checked_shl(attempt.saturating_sub(1))
					.unwrap_or(u32::MAX);
				initial.saturating_mul(factor).min(max)
			}
		}
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Backoff::Fixed(DEFAULT_RECONNECT_INTERVAL)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
	pub backoff: Backoff,
	/// Reconnect attempts allowed before the connection settles in `Closed`.
	pub ceiling: u32,
	/// Initial value of the operator-controlled auto reconnect flag.
	pub auto_reconnect: bool,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			backoff: Backoff::default(),
			ceiling: DEFAULT_MAX_ATTEMPTS,
			auto_reconnect: true,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixed_interval_ignores_attempt() {
		let backoff = Backoff::default();
		assert_eq!(backoff.delay_for(1), Duration::from_secs(3));
		assert_eq!(backoff.delay_for(500), Duration::from_secs(3));
	}

	#[test]
	fn exponential_doubles_and_caps() {
		let backoff = Backoff::Exponential {
			initial: Duration::from_millis(500),
			max: Duration::from_secs(5),
		};
		assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
		assert_eq!(backoff.delay_for(2), Duration::from_millis(1000));
		assert_eq!(backoff.delay_for(4), Duration::from_millis(4000));
		assert_eq!(backoff.delay_for(5), Duration::from_secs(5));
		assert_eq!(backoff.delay_for(64), Duration::from_secs(5));
	}
}
