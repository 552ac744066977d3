use crate::broker::{BrokerConsumer, BrokerError};
use futures::StreamExt;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("handler failed: {0}")]
    Handler(String),
}

/// A side effect (DB insert, gauge update, ...) applied to one inbound
/// delivery's payload. Ack is only sent after this returns `Ok`, which is
/// what makes the dispatch loop at-least-once rather than at-most-once.
#[async_trait::async_trait]
pub trait DispatchHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), DispatchError>;
}

/// Runs an at-least-once ack/nack loop over a broker delivery stream:
/// prefetch 1 (so retries never amplify under load), invoke `handler` per
/// delivery, positive-ack on success, negative-ack-with-requeue on failure,
/// exit cleanly when the stream ends.
pub async fn run_dispatch(
    consumer: &mut dyn BrokerConsumer,
    queue_ref: &str,
    consumer_tag: &str,
    handler: &dyn DispatchHandler,
) -> Result<(), BrokerError> {
    consumer.qos(1, 0, false).await?;
    let mut deliveries = consumer.consume(queue_ref, consumer_tag).await?;

    while let Some(delivery) = deliveries.next().await {
        let payload = delivery.payload().to_vec();
        match handler.handle(&payload).await {
            Ok(()) => {
                if let Err(e) = delivery.ack().await {
                    error!(error = %e, "failed to ack delivery after successful handling");
                }
            }
            Err(e) => {
                warn!(error = %e, "handler failed, nacking with requeue");
                if let Err(e) = delivery.nack(true).await {
                    error!(error = %e, "failed to nack delivery after handler failure");
                }
            }
        }
    }

    Ok(())
}
