//! Reconnect delay schedule.

use std::time::Duration;

/// Linear reconnect backoff: `min(max, step * max(1, attempt))`.
///
/// The attempt counter is incremented on every [`next_delay`](Self::next_delay)
/// call and reset once a connection opens. There is no retry cap.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    step: Duration,
    max: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self {
            step,
            max,
            attempt: 0,
        }
    }

    /// Advance the attempt counter and return the delay before the next try.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.step.saturating_mul(self.attempt.max(1)).min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
