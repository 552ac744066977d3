#![deny(rust_2018_idioms)]

pub mod gauge;
pub mod scrape;

use async_trait::async_trait;
use gauge::TimestampedGaugeCollector;
use iot_core::{DispatchError, DispatchHandler};
use iot_protocol::{parse_metrics_binary, parse_metrics_json};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Binary,
}

pub struct MetricsDispatchHandler {
    collector: Arc<TimestampedGaugeCollector>,
    wire: WireFormat,
}

impl MetricsDispatchHandler {
    pub fn new(collector: Arc<TimestampedGaugeCollector>, wire: WireFormat) -> Self {
        Self { collector, wire }
    }
}

#[async_trait]
impl DispatchHandler for MetricsDispatchHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let sample = match self.wire {
            WireFormat::Json => parse_metrics_json(payload),
            WireFormat::Binary => parse_metrics_binary(payload),
        }
        .map_err(|e| DispatchError::Handler(e.to_string()))?;

        self.collector.record(&sample);
        debug!(device_id = %sample.sensor_id, "recorded metrics sample");
        Ok(())
    }
}

pub use gauge::GaugeEntry;
