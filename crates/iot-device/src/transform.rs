//! Wire-shape transformers for the two sample types. MQTT uses the
//! single-quoted JSON-like shape; AMQP uses base64-wrapped `bincode`. Each
//! device picks one pair at startup based on which broker is configured —
//! never both, never auto-detected.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use iot_core::TransformError;
use iot_drivers::{SensorSample, SystemSample};
use serde::Serialize;

pub fn sensor_to_json(sample: &SensorSample) -> Result<Vec<u8>, TransformError> {
    let json = serde_json::json!({
        "sensor_id": sample.sensor_id,
        "data": {
            "humidity": sample.humidity,
            "temperature": sample.temperature,
        }
    });
    Ok(json.to_string().replace('"', "'").into_bytes())
}

pub fn system_to_json(sample: &SystemSample) -> Result<Vec<u8>, TransformError> {
    let json = serde_json::json!({
        "sensor_id": sample.sensor_id,
        "data": {
            "cpu_usage": sample.cpu_usage,
            "memory_usage": sample.memory_usage,
            "disk_usage": sample.disk_usage,
            "network_usage": sample.network_usage,
        }
    });
    Ok(json.to_string().replace('"', "'").into_bytes())
}

#[derive(Serialize)]
struct BinaryDataWire<'a> {
    sensor_id: &'a str,
    humidity: f64,
    temperature: f64,
    timestamp: i64,
}

#[derive(Serialize)]
struct BinaryMetricsWire<'a> {
    sensor_id: &'a str,
    cpu_usage: f64,
    memory_usage: f64,
    disk_usage: f64,
    network_usage: f64,
    timestamp: i64,
}

fn encode_binary<T: Serialize>(wire: &T) -> Result<Vec<u8>, TransformError> {
    let bytes = bincode::serde::encode_to_vec(wire, bincode::config::standard())
        .map_err(|e| TransformError::Serialize(e.to_string()))?;
    Ok(STANDARD.encode(bytes).into_bytes())
}

pub fn sensor_to_binary(sample: &SensorSample) -> Result<Vec<u8>, TransformError> {
    encode_binary(&BinaryDataWire {
        sensor_id: &sample.sensor_id,
        humidity: sample.humidity,
        temperature: sample.temperature,
        timestamp: sample.timestamp.timestamp(),
    })
}

pub fn system_to_binary(sample: &SystemSample) -> Result<Vec<u8>, TransformError> {
    encode_binary(&BinaryMetricsWire {
        sensor_id: &sample.sensor_id,
        cpu_usage: sample.cpu_usage,
        memory_usage: sample.memory_usage,
        disk_usage: sample.disk_usage,
        network_usage: sample.network_usage,
        timestamp: sample.timestamp.timestamp(),
    })
}
