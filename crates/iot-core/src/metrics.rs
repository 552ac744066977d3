use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Concurrent-safe counters for one publisher/topic: message count, error
/// count, and summed publish latency. All fields are mutated atomically;
/// `snapshot()` may straddle independent updates but never observes a torn
/// 64-bit value.
pub struct PublishMetrics {
    topic: String,
    messages: AtomicU64,
    errors: AtomicU64,
    summed_latency_nanos: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub messages: u64,
    pub errors: u64,
    pub avg_latency: Duration,
}

impl PublishMetrics {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            summed_latency_nanos: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Increments `messages` and `summed_latency` unconditionally, and
    /// increments `errors` iff `is_err` is set.
    pub fn update(&self, latency: Duration, is_err: bool) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.summed_latency_nanos
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if is_err {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let messages = self.messages.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let summed = self.summed_latency_nanos.load(Ordering::Relaxed);
        let avg_latency = if messages == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(summed / messages)
        };
        MetricsSnapshot {
            messages,
            errors,
            avg_latency,
        }
    }
}

impl std::fmt::Debug for PublishMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("PublishMetrics")
            .field("topic", &self.topic)
            .field("messages", &snap.messages)
            .field("errors", &snap.errors)
            .field("avg_latency", &snap.avg_latency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_zero_avg_latency_with_no_messages() {
        let m = PublishMetrics::new("t");
        let snap = m.snapshot();
        assert_eq!(snap.messages, 0);
        assert_eq!(snap.errors, 0);
        assert_eq!(snap.avg_latency, Duration::ZERO);
    }

    #[test]
    fn update_accumulates_and_averages() {
        let m = PublishMetrics::new("t");
        m.update(Duration::from_millis(100), false);
        m.update(Duration::from_millis(300), true);
        let snap = m.snapshot();
        assert_eq!(snap.messages, 2);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.avg_latency, Duration::from_millis(200));
    }
}
