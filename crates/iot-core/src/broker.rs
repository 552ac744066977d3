use futures::stream::BoxStream;
use thiserror::Error;

/// MQTT-style quality of service. AMQP adapters map this onto
/// publisher-confirms / manual-ack equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Qos::AtMostOnce),
            1 => Some(Qos::AtLeastOnce),
            2 => Some(Qos::ExactlyOnce),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker connect failed: {0}")]
    Connect(String),
    #[error("broker publish failed: {0}")]
    Publish(String),
    #[error("broker consume failed: {0}")]
    Consume(String),
    #[error("broker operation timed out")]
    Timeout,
    #[error("broker connection already closed")]
    Closed,
}

type AckFn = Box<dyn FnOnce() -> futures::future::BoxFuture<'static, Result<(), BrokerError>> + Send>;
type NackFn =
    Box<dyn FnOnce(bool) -> futures::future::BoxFuture<'static, Result<(), BrokerError>> + Send>;

/// An opaque broker-supplied unit carrying an inbound byte payload and two
/// one-shot side effects. Consuming `self` in `ack`/`nack` makes
/// double-completion a compile-time error rather than a runtime one.
pub struct DeliveryRecord {
    payload: Vec<u8>,
    ack: AckFn,
    nack: NackFn,
}

impl DeliveryRecord {
    pub fn new(payload: Vec<u8>, ack: AckFn, nack: NackFn) -> Self {
        Self { payload, ack, nack }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Positive acknowledgement (release).
    pub async fn ack(self) -> Result<(), BrokerError> {
        (self.ack)().await
    }

    /// Negative acknowledgement with a requeue hint.
    pub async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        (self.nack)(requeue).await
    }
}

/// Pub-side contract: blocks until broker-acknowledged or fails. Callers
/// measure latency around this call.
#[async_trait::async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retained: bool,
    ) -> Result<(), BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// Sub-side contract.
#[async_trait::async_trait]
pub trait BrokerConsumer: Send + Sync {
    async fn connect(&mut self) -> Result<(), BrokerError>;
    async fn qos(&mut self, prefetch: u16, size: u32, global: bool) -> Result<(), BrokerError>;
    async fn consume(
        &mut self,
        queue_ref: &str,
        consumer_tag: &str,
    ) -> Result<BoxStream<'static, DeliveryRecord>, BrokerError>;
    async fn close(&mut self) -> Result<(), BrokerError>;
}
