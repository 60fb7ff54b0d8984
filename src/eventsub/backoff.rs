//! Reconnect delay policy.
//!
//! The first unclean disconnect after a stable session reconnects at once.
//! Each further disconnect before the session is stable again waits the
//! current delay, which then doubles up to the cap.

use std::time::Duration;

/// Delay after the first failed immediate reconnect.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    max: Duration,
    attempt: u32,
    current: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
            current: Duration::ZERO,
        }
    }

    /// Delay before the next reconnect attempt. Advances the state.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.current;
        self.current = if self.current.is_zero() {
            self.base
        } else {
            (self.current * 2).min(self.max)
        };
        delay
    }

    /// Back to an immediate first retry. Called when a session becomes active.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current = Duration::ZERO;
    }

    /// Unclean disconnects since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
