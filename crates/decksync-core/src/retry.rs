//! Reconnect policy and backoff calculation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum consecutive reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay in milliseconds for the first reconnect attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default cap on the backoff delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Reconnect behavior for the transport.
///
/// Delays grow exponentially from `base_delay_ms` and are capped at
/// `max_delay_ms`. After `max_attempts` consecutive failures the transport
/// gives up for good; only a manual connect starts a fresh cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Maximum consecutive failed attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on the backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay before reconnect attempt `attempt` (zero-based).
    ///
    /// Computes `min(max_delay, base_delay * 2^attempt)`. The shift is
    /// clamped so large attempt numbers cannot overflow.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay_ms.saturating_mul(1u64 << attempt.min(31));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }
}
