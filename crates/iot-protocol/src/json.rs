//! Single-quoted JSON-like payload, the default MQTT wire format.
//!
//! The source emits e.g. `{'sensor_id': 'd1', 'data': {'humidity': 42.0,
//! 'temperature': 21.5}}` — not valid JSON as written, but valid once every
//! `'` is swapped for `"`. Neither field ever embeds a quote character, so
//! the blanket replace is safe for this payload shape.

use crate::ParseError;
use chrono::Utc;
use iot_drivers::{SensorSample, SystemSample};
use serde::Deserialize;

#[derive(Deserialize)]
struct DataWire {
    sensor_id: String,
    data: DataFields,
}

#[derive(Deserialize)]
struct DataFields {
    humidity: f64,
    temperature: f64,
}

#[derive(Deserialize)]
struct MetricsWire {
    sensor_id: String,
    data: MetricsFields,
}

#[derive(Deserialize)]
struct MetricsFields {
    cpu_usage: f64,
    memory_usage: f64,
    disk_usage: f64,
    network_usage: f64,
}

fn to_json(payload: &[u8]) -> Result<String, ParseError> {
    let text = std::str::from_utf8(payload)?;
    Ok(text.replace('\'', "\""))
}

/// This wire variant carries no producer timestamp, so the wall clock at
/// parse time is always substituted (spec.md §4.9's fallback branch).
pub fn parse_data_json(payload: &[u8]) -> Result<SensorSample, ParseError> {
    let json = to_json(payload)?;
    let wire: DataWire = serde_json::from_str(&json)?;
    Ok(SensorSample {
        sensor_id: wire.sensor_id,
        humidity: wire.data.humidity,
        temperature: wire.data.temperature,
        timestamp: Utc::now(),
    })
}

pub fn parse_metrics_json(payload: &[u8]) -> Result<SystemSample, ParseError> {
    let json = to_json(payload)?;
    let wire: MetricsWire = serde_json::from_str(&json)?;
    Ok(SystemSample {
        sensor_id: wire.sensor_id,
        cpu_usage: wire.data.cpu_usage,
        memory_usage: wire.data.memory_usage,
        disk_usage: wire.data.disk_usage,
        network_usage: wire.data.network_usage,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_quoted_data_payload() {
        let payload = b"{'sensor_id': 'd1', 'data': {'humidity': 42.5, 'temperature': 21.0}}";
        let sample = parse_data_json(payload).unwrap();
        assert_eq!(sample.sensor_id, "d1");
        assert_eq!(sample.humidity, 42.5);
        assert_eq!(sample.temperature, 21.0);
    }

    #[test]
    fn parses_single_quoted_metrics_payload() {
        let payload = b"{'sensor_id': 'd2', 'data': {'cpu_usage': 1.0, 'memory_usage': 2.0, 'disk_usage': 3.0, 'network_usage': 4.0}}";
        let sample = parse_metrics_json(payload).unwrap();
        assert_eq!(sample.sensor_id, "d2");
        assert_eq!(sample.cpu_usage, 1.0);
        assert_eq!(sample.network_usage, 4.0);
    }

    #[test]
    fn rejects_malformed_payload() {
        let payload = b"{'sensor_id': 'd1', 'data': }";
        assert!(parse_data_json(payload).is_err());
    }
}
