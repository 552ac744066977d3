//! Base64-wrapped binary-schema payload, the default AMQP wire format.
//!
//! Wraps a `bincode`-encoded record carrying the same logical fields as the
//! JSON variant plus an explicit producer timestamp (unix seconds). A
//! non-positive timestamp means the producer didn't have a clock reading
//! worth trusting; the parser substitutes wall clock time in that case,
//! same as the JSON variant always does.

use crate::ParseError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use iot_drivers::{SensorSample, SystemSample};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct BinaryDataWire {
    sensor_id: String,
    humidity: f64,
    temperature: f64,
    timestamp: i64,
}

#[derive(Serialize, Deserialize)]
struct BinaryMetricsWire {
    sensor_id: String,
    cpu_usage: f64,
    memory_usage: f64,
    disk_usage: f64,
    network_usage: f64,
    timestamp: i64,
}

fn resolve_timestamp(unix_seconds: i64) -> DateTime<Utc> {
    if unix_seconds > 0 {
        Utc.timestamp_opt(unix_seconds, 0)
            .single()
            .unwrap_or_else(Utc::now)
    } else {
        Utc::now()
    }
}

pub fn parse_data_binary(payload: &[u8]) -> Result<SensorSample, ParseError> {
    let raw = STANDARD.decode(payload)?;
    let (wire, _): (BinaryDataWire, usize) =
        bincode::serde::decode_from_slice(&raw, bincode::config::standard())
            .map_err(|_| ParseError::Truncated { need: 0, got: raw.len() })?;
    Ok(SensorSample {
        sensor_id: wire.sensor_id,
        humidity: wire.humidity,
        temperature: wire.temperature,
        timestamp: resolve_timestamp(wire.timestamp),
    })
}

pub fn parse_metrics_binary(payload: &[u8]) -> Result<SystemSample, ParseError> {
    let raw = STANDARD.decode(payload)?;
    let (wire, _): (BinaryMetricsWire, usize) =
        bincode::serde::decode_from_slice(&raw, bincode::config::standard())
            .map_err(|_| ParseError::Truncated { need: 0, got: raw.len() })?;
    Ok(SystemSample {
        sensor_id: wire.sensor_id,
        cpu_usage: wire.cpu_usage,
        memory_usage: wire.memory_usage,
        disk_usage: wire.disk_usage,
        network_usage: wire.network_usage,
        timestamp: resolve_timestamp(wire.timestamp),
    })
}
