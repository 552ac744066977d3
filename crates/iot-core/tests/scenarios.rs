use async_trait::async_trait;
use iot_core::{BackoffPolicy, BrokerError, BrokerPublisher, BufferedPublisher, Message, PublishMetrics, Qos, Queue, TransformError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct RecordingBroker {
    calls: Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl BrokerPublisher for RecordingBroker {
    async fn publish(
        &self,
        _topic: &str,
        payload: &[u8],
        _qos: Qos,
        _retained: bool,
    ) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

fn passthrough(s: &Vec<u8>) -> Result<Vec<u8>, TransformError> {
    Ok(s.clone())
}

/// Scenario 4: shutdown drains buffered items. Enqueue 5 messages, cancel
/// the orchestrator (here: close the queue). The publisher run loop exits
/// within 2s after the broker has observed all 5 publish calls.
#[tokio::test]
async fn shutdown_drains_buffered_items() {
    let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
    let broker = Arc::new(RecordingBroker {
        calls: calls.clone(),
    });
    let queue = Queue::new(10);
    let metrics = Arc::new(PublishMetrics::new("data_json"));
    let publisher = Arc::new(BufferedPublisher::new(
        "data_json",
        broker,
        metrics,
        queue.clone(),
        Arc::new(passthrough as fn(&Vec<u8>) -> Result<Vec<u8>, TransformError>),
        Qos::AtLeastOnce,
        BackoffPolicy::default(),
        CancellationToken::new(),
    ));

    for i in 0..5u8 {
        queue.enqueue(Message::new(vec![i])).unwrap();
    }
    queue.close();

    let run_handle = tokio::spawn(publisher.clone().run());
    tokio::time::timeout(Duration::from_secs(2), run_handle)
        .await
        .expect("publisher exited within 2s")
        .unwrap();

    assert_eq!(calls.lock().unwrap().len(), 5);
}

/// Scenario 5: full-queue shedding. Capacity 2, enqueue 3 messages without
/// a consumer running. The third enqueue returns `full`; queue length stays 2.
#[tokio::test]
async fn full_queue_shedding_keeps_length_at_capacity() {
    let queue: Arc<Queue<u8>> = Queue::new(2);
    assert!(queue.enqueue(Message::new(1)).is_ok());
    assert!(queue.enqueue(Message::new(2)).is_ok());
    let result = queue.enqueue(Message::new(3));
    assert_eq!(result, Err(iot_core::EnqueueError::Full));
    assert_eq!(queue.len(), 2);
}

/// Shutdown law: after cancellation and publisher join, the publisher task
/// has exited and no further metrics updates occur.
#[tokio::test]
async fn shutdown_law_no_activity_after_join() {
    let calls_counter = Arc::new(AtomicUsize::new(0));
    struct CountingBroker(Arc<AtomicUsize>);
    #[async_trait]
    impl BrokerPublisher for CountingBroker {
        async fn publish(&self, _t: &str, _p: &[u8], _q: Qos, _r: bool) -> Result<(), BrokerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn close(&self) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    let queue: Arc<Queue<Vec<u8>>> = Queue::new(4);
    let metrics = Arc::new(PublishMetrics::new("metrics"));
    let publisher = Arc::new(BufferedPublisher::new(
        "metrics",
        Arc::new(CountingBroker(calls_counter.clone())),
        metrics.clone(),
        queue.clone(),
        Arc::new(passthrough as fn(&Vec<u8>) -> Result<Vec<u8>, TransformError>),
        Qos::AtLeastOnce,
        BackoffPolicy::default(),
        CancellationToken::new(),
    ));

    queue.enqueue(Message::new(vec![1])).unwrap();
    queue.close();
    tokio::spawn(publisher.clone().run()).await.unwrap();

    let after_join = calls_counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls_counter.load(Ordering::SeqCst), after_join);
    assert!(queue.enqueue(Message::new(vec![2])).is_err());
}
