//! One orchestrator instance per simulated device: constructs two buffered
//! publishers (sensor data, system metrics), drives their sampling timers,
//! and runs the five-step shutdown drain on cancellation.

use chrono::Utc;
use iot_core::{BackoffPolicy, BrokerPublisher, BufferedPublisher, Message, PublishMetrics, Queue};
use iot_drivers::Driver;
use iot_drivers::{SensorSample, SystemSample};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::transform;

pub struct OrchestratorConfig {
    pub device_id: String,
    pub sample_interval: Duration,
    pub metrics_interval: Duration,
    pub data_topic: String,
    pub metrics_topic: String,
    pub data_buffer_capacity: usize,
    pub metrics_buffer_capacity: usize,
    pub data_backoff: BackoffPolicy,
    pub metrics_backoff: BackoffPolicy,
    pub qos: iot_core::Qos,
    pub wire: WireFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Binary,
}

pub struct DeviceOrchestrator {
    config: OrchestratorConfig,
    driver: Arc<dyn Driver>,
    data_publisher: Arc<BufferedPublisher<SensorSample>>,
    metrics_publisher: Arc<BufferedPublisher<SystemSample>>,
    cancel: CancellationToken,
}

impl DeviceOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        driver: Arc<dyn Driver>,
        broker: Arc<dyn BrokerPublisher>,
        cancel: CancellationToken,
    ) -> Self {
        let data_queue = Queue::new(config.data_buffer_capacity);
        let metrics_queue = Queue::new(config.metrics_buffer_capacity);
        let data_metrics = Arc::new(PublishMetrics::new(&config.data_topic));
        let system_metrics = Arc::new(PublishMetrics::new(&config.metrics_topic));

        type SensorTransformFn = fn(&SensorSample) -> Result<Vec<u8>, iot_core::TransformError>;
        type SystemTransformFn = fn(&SystemSample) -> Result<Vec<u8>, iot_core::TransformError>;

        let data_transform: Arc<dyn iot_core::Transform<SensorSample>> = match config.wire {
            WireFormat::Json => Arc::new(transform::sensor_to_json as SensorTransformFn),
            WireFormat::Binary => Arc::new(transform::sensor_to_binary as SensorTransformFn),
        };
        let metrics_transform: Arc<dyn iot_core::Transform<SystemSample>> = match config.wire {
            WireFormat::Json => Arc::new(transform::system_to_json as SystemTransformFn),
            WireFormat::Binary => Arc::new(transform::system_to_binary as SystemTransformFn),
        };

        let data_publisher = Arc::new(BufferedPublisher::new(
            config.data_topic.clone(),
            broker.clone(),
            data_metrics,
            data_queue,
            data_transform,
            config.qos,
            config.data_backoff,
            cancel.clone(),
        ));
        let metrics_publisher = Arc::new(BufferedPublisher::new(
            config.metrics_topic.clone(),
            broker,
            system_metrics,
            metrics_queue,
            metrics_transform,
            config.qos,
            config.metrics_backoff,
            cancel.clone(),
        ));

        Self {
            config,
            driver,
            data_publisher,
            metrics_publisher,
            cancel,
        }
    }

    /// Runs the sampling/metrics-print timers until cancellation, then
    /// performs the five-step shutdown drain described in the orchestrator
    /// design: log buffer lengths, close both queues, await both publisher
    /// loops, emit a final metrics snapshot, and only then let the broker
    /// connection go away (the caller owns and closes the broker handle).
    pub async fn run(self) {
        let data_run = tokio::spawn(self.data_publisher.clone().run());
        let metrics_run = tokio::spawn(self.metrics_publisher.clone().run());

        let mut sample_tick = tokio::time::interval(self.config.sample_interval);
        let mut metrics_tick = tokio::time::interval(self.config.metrics_interval);

        loop {
            tokio::select! {
                _ = sample_tick.tick() => self.sample_once(),
                _ = metrics_tick.tick() => self.log_metrics_snapshot(),
                _ = self.cancel.cancelled() => break,
            }
        }

        info!(
            device_id = %self.config.device_id,
            data_len = self.data_publisher.queue().len(),
            metrics_len = self.metrics_publisher.queue().len(),
            "shutting down: closing queues to drain buffered samples"
        );
        self.data_publisher.close();
        self.metrics_publisher.close();

        let _ = data_run.await;
        let _ = metrics_run.await;

        self.log_metrics_snapshot();
    }

    fn sample_once(&self) {
        let timestamp = Utc::now();
        let sensor_reading = self.driver.probe_sensor();
        let system_reading = self.driver.probe_system_metrics();

        let sensor_sample = SensorSample {
            sensor_id: self.config.device_id.clone(),
            humidity: sensor_reading.humidity,
            temperature: sensor_reading.temperature,
            timestamp,
        };
        let system_sample = SystemSample {
            sensor_id: self.config.device_id.clone(),
            cpu_usage: system_reading.cpu_usage,
            memory_usage: system_reading.memory_usage,
            disk_usage: system_reading.disk_usage,
            network_usage: system_reading.network_usage,
            timestamp,
        };

        if self
            .data_publisher
            .queue()
            .enqueue(Message::new(sensor_sample))
            .is_err()
        {
            warn!(device_id = %self.config.device_id, "data queue full, dropping fresh sample");
        }
        if self
            .metrics_publisher
            .queue()
            .enqueue(Message::new(system_sample))
            .is_err()
        {
            warn!(device_id = %self.config.device_id, "metrics queue full, dropping fresh sample");
        }
    }

    fn log_metrics_snapshot(&self) {
        let data_snapshot = self.data_publisher.metrics().snapshot();
        let metrics_snapshot = self.metrics_publisher.metrics().snapshot();
        info!(
            device_id = %self.config.device_id,
            data_messages = data_snapshot.messages,
            data_errors = data_snapshot.errors,
            metrics_messages = metrics_snapshot.messages,
            metrics_errors = metrics_snapshot.errors,
            "metrics snapshot"
        );
    }
}
