#![deny(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]

//! The reliable bounded-buffer publisher core shared by every device and
//! worker binary in the pipeline: backoff policy, closable bounded queue,
//! publish metrics, buffered publisher run loop, broker-facing traits, and
//! the consumer dispatch loop.

pub mod backoff;
pub mod broker;
pub mod consumer;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod queue;
pub mod transform;

pub use backoff::BackoffPolicy;
pub use broker::{BrokerConsumer, BrokerError, BrokerPublisher, DeliveryRecord, Qos};
pub use consumer::{run_dispatch, DispatchError, DispatchHandler};
pub use message::Message;
pub use metrics::{MetricsSnapshot, PublishMetrics};
pub use publisher::{connect_with_retry, BufferedPublisher};
pub use queue::{EnqueueError, Queue};
pub use transform::{Transform, TransformError};
