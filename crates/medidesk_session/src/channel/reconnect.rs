use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Bounded exponential backoff for the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay: Duration::from_millis(1_000),
			max_delay: Duration::from_millis(30_000),
		}
	}
}

impl ReconnectPolicy {
	/// Delay before attempt `attempt` (1-based), without jitter.
	pub fn base_delay_for(&self, attempt: u32) -> Duration {
		let base_ms = self.base_delay.as_millis() as u64;
		let max_ms = self.max_delay.as_millis() as u64;
		let pow = 2u64.saturating_pow(attempt.saturating_sub(1).min(16));
		Duration::from_millis(base_ms.saturating_mul(pow).min(max_ms))
	}

	/// Deadline and jittered delay for `attempt`, or `None` once attempts are exhausted.
	pub fn schedule(&self, attempt: u32) -> Option<(Instant, u64)> {
		if attempt == 0 || attempt > self.max_attempts {
			return None;
		}
		let delay_ms = self.base_delay_for(attempt).as_millis() as u64;
		let jitter_window = (delay_ms / 10).max(1);
		let mut rng = rand::rng();
		let jitter_offset = rng.random_range(0..=(jitter_window * 2));
		let final_ms = delay_ms.saturating_sub(jitter_window).saturating_add(jitter_offset);
		Some((Instant::now() + Duration::from_millis(final_ms), final_ms))
	}
}
