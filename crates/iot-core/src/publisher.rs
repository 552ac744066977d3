use crate::backoff::BackoffPolicy;
use crate::broker::{BrokerError, BrokerPublisher, Qos};
use crate::message::Message;
use crate::metrics::PublishMetrics;
use crate::queue::Queue;
use crate::transform::Transform;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drains a queue, transforms each payload, publishes it, and retries with
/// backoff on transient failure. One instance per (topic, payload type).
/// All work proceeds sequentially so latency and ordering stay locally
/// predictable; cross-publisher parallelism comes from running multiple
/// instances, one per topic.
pub struct BufferedPublisher<T> {
    topic: String,
    broker: Arc<dyn BrokerPublisher>,
    metrics: Arc<PublishMetrics>,
    queue: Arc<Queue<T>>,
    transform: Arc<dyn Transform<T>>,
    qos: Qos,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
}

impl<T> BufferedPublisher<T>
where
    T: Send + Sync + Clone + 'static,
{
    pub fn new(
        topic: impl Into<String>,
        broker: Arc<dyn BrokerPublisher>,
        metrics: Arc<PublishMetrics>,
        queue: Arc<Queue<T>>,
        transform: Arc<dyn Transform<T>>,
        qos: Qos,
        backoff: BackoffPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            topic: topic.into(),
            broker,
            metrics,
            queue,
            transform,
            qos,
            backoff,
            cancel,
        }
    }

    pub fn metrics(&self) -> &Arc<PublishMetrics> {
        &self.metrics
    }

    pub fn queue(&self) -> &Arc<Queue<T>> {
        &self.queue
    }

    /// Wraps `queue.close()` for callers that own the publisher rather than
    /// the queue directly.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Runs until the queue's end-of-stream is observed, i.e. until
    /// `close()` has been called and all buffered messages drained (modulo
    /// their own backoff timers).
    pub async fn run(self: Arc<Self>) {
        let mut stream = self.queue.items();
        while let Some(msg) = stream.next().await {
            self.process(msg).await;
        }
        debug!(topic = %self.topic, "publisher run loop exiting: queue closed and drained");
    }

    async fn process(&self, msg: Message<T>) {
        let bytes = match self.transform.transform(&msg.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.update(std::time::Duration::ZERO, true);
                warn!(topic = %self.topic, error = %e, "transform failed, requeuing");
                self.queue
                    .requeue_with_backoff(msg, self.backoff, self.cancel.clone());
                return;
            }
        };

        let t0 = Instant::now();
        let result = self
            .broker
            .publish(&self.topic, &bytes, self.qos, false)
            .await;
        let latency = t0.elapsed();
        self.metrics.update(latency, result.is_err());

        match result {
            Ok(()) => {
                debug!(topic = %self.topic, bytes = bytes.len(), "published");
            }
            Err(e) => {
                warn!(
                    topic = %self.topic,
                    attempts = msg.attempts,
                    error = %e,
                    "publish failed, requeuing"
                );
                self.queue
                    .requeue_with_backoff(msg, self.backoff, self.cancel.clone());
            }
        }
    }
}

/// Fixed-spacing connect retry used at broker-client startup — distinct
/// from the per-message backoff policy above. Stops after `max_attempts`
/// and reports the last failure. Generic over the connected handle `T` so
/// callers can return the constructed broker client itself, not just `()`.
pub async fn connect_with_retry<F, Fut, T>(
    mut attempt: F,
    spacing: std::time::Duration,
    max_attempts: u32,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, BrokerError>>,
{
    let mut last_err = BrokerError::Connect("no attempts made".to_string());
    for n in 1..=max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt = n, max_attempts, error = %e, "broker connect attempt failed");
                last_err = e;
                if n < max_attempts {
                    tokio::time::sleep(spacing).await;
                }
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockBroker {
        publish_calls: Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
        fail_first_n: AtomicUsize,
    }

    #[async_trait]
    impl BrokerPublisher for MockBroker {
        async fn publish(
            &self,
            _topic: &str,
            payload: &[u8],
            _qos: Qos,
            _retained: bool,
        ) -> Result<(), BrokerError> {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                return Err(BrokerError::Publish("simulated failure".into()));
            }
            self.publish_calls.lock().unwrap().push(payload.to_vec());
            Ok(())
        }

        async fn close(&self) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    fn transform_str(s: &&'static str) -> Result<Vec<u8>, TransformError> {
        Ok(format!("transformed: {s}").into_bytes())
    }

    #[tokio::test]
    async fn successful_publish_updates_metrics_once() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let broker = Arc::new(MockBroker {
            publish_calls: calls.clone(),
            fail_first_n: AtomicUsize::new(0),
        });
        let queue = Queue::new(10);
        let metrics = Arc::new(PublishMetrics::new("data_json"));
        let backoff = BackoffPolicy::new(
            std::time::Duration::from_millis(100),
            2.0,
            std::time::Duration::from_secs(1),
            3,
        );
        let publisher = Arc::new(BufferedPublisher::new(
            "data_json",
            broker,
            metrics.clone(),
            queue.clone(),
            Arc::new(transform_str as fn(&&'static str) -> Result<Vec<u8>, TransformError>),
            Qos::AtLeastOnce,
            backoff,
            CancellationToken::new(),
        ));

        queue.enqueue(Message::new("x")).unwrap();
        queue.close();

        let run_handle = tokio::spawn(publisher.clone().run());
        tokio::time::timeout(std::time::Duration::from_secs(2), run_handle)
            .await
            .expect("publisher exited")
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.messages, 1);
        assert_eq!(snap.errors, 0);
        assert_eq!(calls.lock().unwrap().as_slice(), &[b"transformed: x".to_vec()]);
    }

    #[tokio::test]
    async fn publish_failure_then_retry_eventually_succeeds() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let broker = Arc::new(MockBroker {
            publish_calls: calls.clone(),
            fail_first_n: AtomicUsize::new(1),
        });
        let queue = Queue::new(10);
        let metrics = Arc::new(PublishMetrics::new("data_json"));
        let backoff = BackoffPolicy::new(
            std::time::Duration::from_millis(50),
            2.0,
            std::time::Duration::from_millis(500),
            3,
        );
        let publisher = Arc::new(BufferedPublisher::new(
            "data_json",
            broker,
            metrics.clone(),
            queue.clone(),
            Arc::new(transform_str as fn(&&'static str) -> Result<Vec<u8>, TransformError>),
            Qos::AtLeastOnce,
            backoff,
            CancellationToken::new(),
        ));

        queue.enqueue(Message::new("x")).unwrap();
        let run_handle = tokio::spawn(publisher.clone().run());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        queue.close();
        tokio::time::timeout(std::time::Duration::from_secs(2), run_handle)
            .await
            .expect("publisher exited")
            .unwrap();

        let snap = metrics.snapshot();
        assert!(snap.messages >= 2);
        assert!(snap.errors >= 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
