//! Wires a loaded [`iot_config::Config`] into a ready-to-run
//! [`DeviceOrchestrator`]: picks the configured broker (MQTT preferred when
//! both are present), connects it with bounded retry, and resolves the
//! per-topic buffer/backoff settings.

use crate::orchestrator::{DeviceOrchestrator, OrchestratorConfig, WireFormat};
use iot_config::{BackoffConfig, RawConfig};
use iot_core::{connect_with_retry, BackoffPolicy, BrokerError, BrokerPublisher, Qos};
use iot_drivers::Driver;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Start-up connect retry: fixed 2s spacing, up to 30 attempts, per the
/// broker client lifecycle design note — separate from per-message backoff.
const CONNECT_RETRY_SPACING: Duration = Duration::from_secs(2);
const CONNECT_RETRY_MAX_ATTEMPTS: u32 = 30;

fn backoff_policy(config: &BackoffConfig) -> BackoffPolicy {
    BackoffPolicy::new(
        Duration::from_secs_f64(config.base_in_seconds),
        config.factor,
        Duration::from_secs_f64(config.max_delay_in_seconds),
        config.max_retries,
    )
}

pub async fn build_orchestrator(
    config: &RawConfig,
    device_id: String,
    driver: Arc<dyn Driver>,
    cancel: CancellationToken,
) -> Result<(DeviceOrchestrator, Arc<dyn BrokerPublisher>), BrokerError> {
    let (broker, orchestrator_config) = if let Some(mqtt) = &config.mqtt {
        let data_topic = &mqtt.topics["data_json"];
        let metrics_topic = &mqtt.topics["metrics"];
        let client_id = format!("{device_id}-pub");
        let publisher: Arc<dyn BrokerPublisher> = connect_with_retry(
            || async {
                iot_broker_mqtt::MqttPublisher::connect(&mqtt.broker, &client_id)
                    .map(|p| Arc::new(p) as Arc<dyn BrokerPublisher>)
            },
            CONNECT_RETRY_SPACING,
            CONNECT_RETRY_MAX_ATTEMPTS,
        )
        .await?;
        let qos = Qos::from_level(mqtt.qos)
            .ok_or_else(|| BrokerError::Connect(format!("invalid mqtt qos {}", mqtt.qos)))?;
        let orchestrator_config = OrchestratorConfig {
            device_id: device_id.clone(),
            sample_interval: Duration::from_secs(config.device.sample_interval_secs),
            metrics_interval: Duration::from_secs(config.device.metrics_interval_secs),
            data_topic: data_topic.topic.clone(),
            metrics_topic: metrics_topic.topic.clone(),
            data_buffer_capacity: data_topic.buffer.capacity,
            metrics_buffer_capacity: metrics_topic.buffer.capacity,
            data_backoff: backoff_policy(&data_topic.buffer.backoff),
            metrics_backoff: backoff_policy(&metrics_topic.buffer.backoff),
            qos,
            wire: WireFormat::Json,
        };
        (publisher, orchestrator_config)
    } else {
        let amqp = config
            .amqp
            .as_ref()
            .expect("validated config guarantees mqtt or amqp is present");
        let data_topic = &amqp.queues["data_json"];
        let metrics_topic = &amqp.queues["metrics"];
        let publisher: Arc<dyn BrokerPublisher> = connect_with_retry(
            || async {
                iot_broker_amqp::AmqpPublisher::connect(&amqp.uri)
                    .await
                    .map(|p| Arc::new(p) as Arc<dyn BrokerPublisher>)
            },
            CONNECT_RETRY_SPACING,
            CONNECT_RETRY_MAX_ATTEMPTS,
        )
        .await?;
        let orchestrator_config = OrchestratorConfig {
            device_id: device_id.clone(),
            sample_interval: Duration::from_secs(config.device.sample_interval_secs),
            metrics_interval: Duration::from_secs(config.device.metrics_interval_secs),
            data_topic: data_topic.topic.clone(),
            metrics_topic: metrics_topic.topic.clone(),
            data_buffer_capacity: data_topic.buffer.capacity,
            metrics_buffer_capacity: metrics_topic.buffer.capacity,
            data_backoff: backoff_policy(&data_topic.buffer.backoff),
            metrics_backoff: backoff_policy(&metrics_topic.buffer.backoff),
            qos: Qos::AtLeastOnce,
            wire: WireFormat::Binary,
        };
        (publisher, orchestrator_config)
    };

    let orchestrator =
        DeviceOrchestrator::new(orchestrator_config, driver, broker.clone(), cancel);
    Ok((orchestrator, broker))
}
