//! Exponential backoff with a cap.

use std::time::Duration;

/// Retry delay policy: `min(base * 2^attempt, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    /// Creates a policy with the given base delay and cap.
    #[must_use]
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before retry number `attempt` (zero-based). Saturates at the
    /// cap instead of overflowing.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |d| d.min(self.cap))
    }

    /// The base delay.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// The delay cap.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Backoff {
        Backoff::new(Duration::from_millis(1_000), Duration::from_millis(30_000))
    }

    #[test]
    fn doubles_until_cap() {
        let delays: Vec<u128> = (0..7).map(|n| policy().delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn huge_attempt_saturates_at_cap() {
        assert_eq!(policy().delay(40), Duration::from_millis(30_000));
        assert_eq!(policy().delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn cap_below_base_wins() {
        let p = Backoff::new(Duration::from_secs(5), Duration::from_secs(2));
        assert_eq!(p.delay(0), Duration::from_secs(2));
    }
}
