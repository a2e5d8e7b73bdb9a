//! Capped exponential backoff.

use std::time::Duration;

/// Retry delay policy: `2^attempt × unit`, never more than `max`.
///
/// Attempts are numbered from 1, so the first retry waits `2 × unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub unit: Duration,
    pub max: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(unit: Duration, max: Duration) -> Self {
        Self { unit, max }
    }

    /// Delay before retry number `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.unit.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(8));
        assert_eq!(backoff.delay(40), Duration::from_secs(8));
    }
}
