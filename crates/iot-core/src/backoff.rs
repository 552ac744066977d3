use std::time::Duration;

/// `{base, factor, max_delay, max_retries}` as specified for the requeue
/// scheduler. Pure value type — no side effects, no allocation.
///
/// `max_retries == 0` denotes unlimited retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_retries: 0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, factor: f64, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base,
            factor,
            max_delay,
            max_retries,
        }
    }

    /// Delay for attempt `n >= 1`: `min(max_delay, base * factor^(n-1))`.
    /// `attempt <= 0` is treated as 1. Monotonic non-decreasing until capped.
    pub fn delay_for(&self, attempt: i64) -> Duration {
        let attempt = attempt.max(1) as u32;
        let exponent = attempt - 1;
        let multiplier = self.factor.powi(exponent as i32);
        let base_nanos = self.base.as_secs_f64() * multiplier;
        let capped = base_nanos.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Whether a message that has undergone `attempts` reinsertions should be
    /// dropped rather than retried again.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_retries > 0 && attempts >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_secs(2), 2.0, Duration::from_secs(5), 0)
    }

    #[test]
    fn delay_for_zero_and_one_both_equal_base() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_secs(2));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
    }

    #[test]
    fn delay_for_caps_at_max_delay() {
        let p = policy();
        // attempt 5 => 2 * 2^4 = 32s, capped to 5s
        assert_eq!(p.delay_for(5), Duration::from_secs(5));
    }

    #[test]
    fn delay_is_monotonic_non_decreasing_until_capped() {
        let p = policy();
        for n in 1..10 {
            assert!(p.delay_for(n) <= p.delay_for(n + 1));
        }
    }

    #[test]
    fn negative_attempt_treated_as_one() {
        let p = policy();
        assert_eq!(p.delay_for(-3), p.delay_for(1));
    }

    #[test]
    fn max_retries_zero_means_never_exhausted() {
        let p = BackoffPolicy::new(Duration::from_millis(1), 1.0, Duration::from_millis(1), 0);
        assert!(!p.exhausted(10_000));
    }

    #[test]
    fn max_retries_bounds_attempts() {
        let p = BackoffPolicy::new(Duration::from_millis(1), 1.0, Duration::from_millis(1), 3);
        assert!(!p.exhausted(2));
        assert!(p.exhausted(3));
        assert!(p.exhausted(4));
    }
}
