use crate::backoff::BackoffPolicy;
use crate::message::Message;
use futures::Stream;
use parking_lot::RwLock as SyncRwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Non-blocking `enqueue` outcomes: `Full` under backpressure, `Closed`
/// once the queue is in its terminal state. Neither panics under
/// concurrent misuse.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("queue is at capacity")]
    Full,
    #[error("queue is closed")]
    Closed,
}

/// A closable bounded FIFO of `Message<T>`.
///
/// State machine: `Open -> Closed`, one-way. In `Open`, enqueue/dequeue are
/// active. In `Closed`, enqueue is rejected and dequeue drains residual
/// items before signalling end-of-stream. `size <= capacity` holds at every
/// observable moment (invariant Q1) because the underlying bounded channel
/// itself refuses sends past its buffer.
pub struct Queue<T> {
    sender: SyncRwLock<Option<mpsc::Sender<Message<T>>>>,
    receiver: AsyncMutex<mpsc::Receiver<Message<T>>>,
    capacity: usize,
    len: AtomicUsize,
    cancel_token: CancellationToken,
}

impl<T> Queue<T> {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Arc::new(Self {
            sender: SyncRwLock::new(Some(tx)),
            receiver: AsyncMutex::new(rx),
            capacity,
            len: AtomicUsize::new(0),
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Observational; may be slightly stale under concurrent mutation.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Never blocks. Rejects with `Full` at capacity, `Closed` after close.
    pub fn enqueue(&self, msg: Message<T>) -> Result<(), EnqueueError> {
        if self.is_closed() {
            return Err(EnqueueError::Closed);
        }
        let guard = self.sender.read();
        match guard.as_ref() {
            Some(tx) => match tx.try_send(msg) {
                Ok(()) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(TrySendError::Full(_)) => Err(EnqueueError::Full),
                Err(TrySendError::Closed(_)) => Err(EnqueueError::Closed),
            },
            None => Err(EnqueueError::Closed),
        }
    }

    /// Awaits the next buffered message in FIFO order, or `None` once the
    /// queue is closed and fully drained (invariant Q3: the end-of-stream
    /// signal is never lost, even if `close()` races with a blocked
    /// consumer).
    pub async fn dequeue(&self) -> Option<Message<T>> {
        let mut rx = self.receiver.lock().await;
        let item = rx.recv().await;
        if item.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        item
    }

    /// A consumable lazy sequence yielding buffered messages in FIFO order;
    /// terminates cleanly when the queue is closed and drained.
    pub fn items(self: &Arc<Self>) -> impl Stream<Item = Message<T>> + Send + 'static
    where
        T: Send + 'static,
    {
        let queue = Arc::clone(self);
        futures::stream::unfold(queue, |queue| async move {
            queue.dequeue().await.map(|msg| (msg, queue))
        })
    }

    /// Idempotent; wakes any consumer blocked on `items()`/`dequeue()` by
    /// dropping the last sender handle once called, so `recv()` returns
    /// `None` as soon as the channel's buffer drains.
    pub fn close(&self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        self.cancel_token.cancel();
        *self.sender.write() = None;
    }

    /// Best-effort re-insertion after `delay`. Never blocks the caller.
    /// Drops the message silently if the queue closes, `outer` cancels, or
    /// the reinsertion is rejected terminally.
    pub fn requeue_after(self: &Arc<Self>, msg: Message<T>, delay: Duration, outer: CancellationToken)
    where
        T: Send + 'static,
    {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = queue.enqueue(msg) {
                        trace!(?e, "requeue_after: dropping message");
                    }
                }
                () = outer.cancelled() => {}
                () = queue.cancel_token.cancelled() => {}
            }
        });
    }

    /// Increments `msg.attempts` (treating 0 as 1 on first call), then loops
    /// waiting `delay_for(attempts)` and attempting enqueue, incrementing
    /// attempts again on `Full`, until the message is placed, the queue
    /// closes, `attempts >= max_retries` (when `max_retries > 0`), or `outer`
    /// cancels — in which case the message is dropped.
    pub fn requeue_with_backoff(
        self: &Arc<Self>,
        mut msg: Message<T>,
        policy: BackoffPolicy,
        outer: CancellationToken,
    ) where
        T: Send + Clone + 'static,
    {
        let queue = Arc::clone(self);
        msg.bump_attempt();
        tokio::spawn(async move {
            loop {
                if policy.exhausted(msg.attempts) {
                    trace!(attempts = msg.attempts, "requeue_with_backoff: exhausted");
                    return;
                }
                let delay = policy.delay_for(i64::from(msg.attempts));
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    () = outer.cancelled() => return,
                    () = queue.cancel_token.cancelled() => return,
                }
                match queue.enqueue(msg.clone()) {
                    Ok(()) => return,
                    Err(EnqueueError::Closed) => return,
                    Err(EnqueueError::Full) => {
                        msg.bump_attempt();
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips_unchanged() {
        let q: Arc<Queue<&'static str>> = Queue::new(4);
        q.enqueue(Message::new("x")).unwrap();
        let got = q.dequeue().await.unwrap();
        assert_eq!(got.payload, "x");
        assert_eq!(got.attempts, 0);
    }

    #[tokio::test]
    async fn full_queue_sheds_without_blocking() {
        let q: Arc<Queue<i32>> = Queue::new(2);
        q.enqueue(Message::new(1)).unwrap();
        q.enqueue(Message::new(2)).unwrap();
        let start = std::time::Instant::now();
        let result = q.enqueue(Message::new(3));
        assert_eq!(result, Err(EnqueueError::Full));
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(q.len(), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_does_not_panic() {
        let q: Arc<Queue<i32>> = Queue::new(2);
        q.close();
        q.close();
        assert_eq!(q.enqueue(Message::new(1)), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn dequeue_on_closed_drained_queue_returns_end_of_stream() {
        let q: Arc<Queue<i32>> = Queue::new(2);
        q.enqueue(Message::new(1)).unwrap();
        q.close();
        assert!(q.dequeue().await.is_some());
        assert!(q.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn requeue_with_backoff_drops_after_max_retries() {
        let q: Arc<Queue<i32>> = Queue::new(1);
        // Fill the queue so every reinsertion attempt observes `Full`.
        q.enqueue(Message::new(0)).unwrap();
        let policy = BackoffPolicy::new(
            Duration::from_millis(5),
            1.0,
            Duration::from_millis(5),
            3,
        );
        q.requeue_with_backoff(Message::new(99), policy, CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Only the original message is present; the retried one was dropped.
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn requeue_with_backoff_eventually_succeeds_once_space_frees() {
        let q: Arc<Queue<i32>> = Queue::new(1);
        q.enqueue(Message::new(0)).unwrap();
        let policy = BackoffPolicy::new(
            Duration::from_millis(5),
            1.0,
            Duration::from_millis(5),
            0,
        );
        q.requeue_with_backoff(Message::new(99), policy, CancellationToken::new());
        // Drain the original so the next retry attempt finds room.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = q.dequeue().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(q.len(), 1);
        let got = q.dequeue().await.unwrap();
        assert_eq!(got.payload, 99);
        assert!(got.attempts >= 1);
    }
}
