#![deny(rust_2018_idioms)]

//! [`iot_core::BrokerPublisher`] / [`iot_core::BrokerConsumer`] backed by
//! `rumqttc`. The event loop that drives the underlying connection is
//! polled on a dedicated background task, same shape as other rumqttc
//! consumers in the wild: `AsyncClient` is cheap to clone and hands off
//! requests to that task's internal channel.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use iot_core::{BrokerConsumer, BrokerError, BrokerPublisher, DeliveryRecord, Qos};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

fn to_rumqttc_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn mqtt_options(broker_url: &str, client_id: &str) -> Result<MqttOptions, BrokerError> {
    let (host, port) = split_host_port(broker_url)
        .ok_or_else(|| BrokerError::Connect(format!("invalid broker url: {broker_url}")))?;
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(30));
    Ok(options)
}

fn split_host_port(broker_url: &str) -> Option<(String, u16)> {
    let stripped = broker_url
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://");
    let (host, port) = stripped.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some((host.to_string(), port))
}

/// Drains the event loop on a background task for as long as the client is
/// alive, forwarding incoming `Publish` packets to `incoming` for the
/// consumer side. A publisher has no consumer side, so it passes `None` and
/// the loop just discards incoming packets (still necessary to keep pings
/// and acks flowing).
fn spawn_event_loop(
    mut event_loop: EventLoop,
    incoming: Option<mpsc::Sender<rumqttc::Publish>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(tx) = &incoming {
                        if tx.send(publish).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "mqtt event loop error, retrying");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    })
}

/// Publish-side handle. Owns the client and the background event loop task;
/// `close()` aborts the task and disconnects.
pub struct MqttPublisher {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    pub fn connect(broker_url: &str, client_id: &str) -> Result<Self, BrokerError> {
        let options = mqtt_options(broker_url, client_id)?;
        let (client, event_loop) = AsyncClient::new(options, 64);
        let handle = spawn_event_loop(event_loop, None);
        Ok(Self {
            client,
            event_loop: handle,
        })
    }
}

#[async_trait]
impl BrokerPublisher for MqttPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retained: bool,
    ) -> Result<(), BrokerError> {
        self.client
            .publish(topic, to_rumqttc_qos(qos), retained, payload.to_vec())
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if let Err(err) = self.client.disconnect().await {
            debug!(error = %err, "mqtt disconnect failed, client likely already gone");
        }
        self.event_loop.abort();
        Ok(())
    }
}

/// Consume-side handle. Subscribes one topic per `consume()` call; the
/// `ack`/`nack` closures on each [`DeliveryRecord`] are no-ops because
/// `rumqttc` completes the QoS handshake internally once a `Publish` packet
/// is handed back from the event loop.
pub struct MqttConsumer {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
}

impl MqttConsumer {
    pub fn new(broker_url: &str, client_id: &str) -> Result<Self, BrokerError> {
        let options = mqtt_options(broker_url, client_id)?;
        let (client, event_loop) = AsyncClient::new(options, 64);
        Ok(Self {
            client,
            event_loop: Some(event_loop),
        })
    }
}

#[async_trait]
impl BrokerConsumer for MqttConsumer {
    async fn connect(&mut self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn qos(&mut self, _prefetch: u16, _size: u32, _global: bool) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn consume(
        &mut self,
        queue_ref: &str,
        _consumer_tag: &str,
    ) -> Result<BoxStream<'static, DeliveryRecord>, BrokerError> {
        self.client
            .subscribe(queue_ref, QoS::AtLeastOnce)
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))?;

        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| BrokerError::Consume("consume() called more than once".into()))?;

        let (tx, rx) = mpsc::channel(64);
        spawn_event_loop(event_loop, Some(tx));

        let stream = stream::unfold(rx, |mut rx| async move {
            let publish = rx.recv().await?;
            let record = DeliveryRecord::new(
                publish.payload.to_vec(),
                Box::new(|| Box::pin(async { Ok(()) })),
                Box::new(|_requeue| Box::pin(async { Ok(()) })),
            );
            Some((record, rx))
        });

        Ok(stream.boxed())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        let _ = self.client.disconnect().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port_from_mqtt_url() {
        assert_eq!(
            split_host_port("mqtt://broker.local:1883"),
            Some(("broker.local".to_string(), 1883))
        );
    }

    #[test]
    fn splits_host_and_port_without_scheme() {
        assert_eq!(
            split_host_port("localhost:1883"),
            Some(("localhost".to_string(), 1883))
        );
    }

    #[test]
    fn rejects_url_without_port() {
        assert_eq!(split_host_port("mqtt://broker.local"), None);
    }

    #[test]
    fn builds_options_for_a_well_formed_url() {
        assert!(mqtt_options("mqtt://broker.local:1883", "device-1").is_ok());
    }

    #[test]
    fn rejects_malformed_broker_url() {
        assert!(mqtt_options("not a url", "device-1").is_err());
    }
}
