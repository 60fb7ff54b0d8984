//! Silence watchdog for an event session.
//!
//! The provider promises traffic (at least a keepalive) every
//! `keepalive_timeout_seconds`. The session is dead once nothing at all has
//! arrived for longer than that plus a grace period.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::SessionError;

/// Slack on top of the negotiated interval before declaring the session dead.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct KeepaliveMonitor {
    interval: Duration,
    grace: Duration,
    last_message_at: Instant,
}

impl KeepaliveMonitor {
    /// Arm the watchdog at `now` for a negotiated `interval`.
    pub fn new(interval: Duration, grace: Duration, now: Instant) -> Self {
        Self {
            interval,
            grace,
            last_message_at: now,
        }
    }

    /// Note that a frame arrived.
    pub fn record(&mut self, now: Instant) {
        if now > self.last_message_at {
            self.last_message_at = now;
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Longest silence tolerated.
    pub fn allowed(&self) -> Duration {
        self.interval + self.grace
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_message_at)
    }

    /// Fails iff the silence at `now` exceeds interval + grace.
    pub fn check(&self, now: Instant) -> Result<(), SessionError> {
        let silence = self.silence(now);
        if silence > self.allowed() {
            return Err(SessionError::KeepaliveExpired {
                silent_secs: silence.as_secs(),
                allowed_secs: self.allowed().as_secs(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(start: Instant) -> KeepaliveMonitor {
        KeepaliveMonitor::new(Duration::from_secs(10), DEFAULT_GRACE, start)
    }

    #[test]
    fn test_fires_only_after_interval_plus_grace() {
        let start = Instant::now();
        let monitor = monitor(start);

        assert!(monitor.check(start).is_ok());
        assert!(monitor.check(start + Duration::from_secs(10)).is_ok());
        assert!(monitor.check(start + Duration::from_secs(15)).is_ok());
        assert!(monitor
            .check(start + Duration::from_secs(15) + Duration::from_millis(1))
            .is_err());
    }

    #[test]
    fn test_any_gap_up_to_the_limit_is_tolerated() {
        let start = Instant::now();
        let mut monitor = monitor(start);
        let mut now = start;

        for gap_ms in [0u64, 1, 9_999, 10_000, 14_999, 15_000] {
            now += Duration::from_millis(gap_ms);
            assert!(monitor.check(now).is_ok(), "gap {}ms fired early", gap_ms);
            monitor.record(now);
        }
    }

    #[test]
    fn test_record_pushes_deadline() {
        let start = Instant::now();
        let mut monitor = monitor(start);

        monitor.record(start + Duration::from_secs(12));
        assert!(monitor.check(start + Duration::from_secs(20)).is_ok());

        match monitor.check(start + Duration::from_secs(30)) {
            Err(SessionError::KeepaliveExpired {
                silent_secs,
                allowed_secs,
            }) => {
                assert_eq!(silent_secs, 18);
                assert_eq!(allowed_secs, 15);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_record_never_moves_backwards() {
        let start = Instant::now();
        let mut monitor = monitor(start + Duration::from_secs(5));
        monitor.record(start);
        assert_eq!(monitor.silence(start + Duration::from_secs(5)), Duration::ZERO);
    }
}
