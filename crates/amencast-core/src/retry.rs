//! Reconnect policy for long-lived upstream sessions.
//!
//! Fixed delay between attempts, bounded attempt count. Once the cap is
//! exceeded the session is failed with [`ReconnectPolicy::exhausted_message`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default delay between reconnect attempts in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Bounded fixed-delay reconnect policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Maximum reconnect attempts before the session is failed (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before each attempt in ms (default: 1000).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt is allowed after `attempts_so_far`.
    #[must_use]
    pub fn allows(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }

    /// Error text surfaced once the cap is exceeded.
    #[must_use]
    pub fn exhausted_message(&self) -> String {
        format!("Failed to reconnect after {} attempts.", self.max_attempts)
    }
}
