/// A payload paired with a retry attempt count. Immutable across retries
/// except for `attempts`, which the requeue scheduler increments each
/// backoff cycle. `0` before the first try.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    pub payload: T,
    pub attempts: u32,
}

impl<T> Message<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            attempts: 0,
        }
    }

    pub fn with_attempts(payload: T, attempts: u32) -> Self {
        Self { payload, attempts }
    }

    /// Treats `0` as `1` on the first call, matching `requeueWithBackoff`'s
    /// "increments attempts (treating 0 as 1 on first call)" semantics.
    pub fn bump_attempt(&mut self) -> u32 {
        self.attempts = if self.attempts == 0 {
            1
        } else {
            self.attempts + 1
        };
        self.attempts
    }
}
