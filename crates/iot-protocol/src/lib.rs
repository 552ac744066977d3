#![deny(rust_2018_idioms)]

//! Parses inbound broker payloads into [`iot_drivers::SensorSample`] /
//! [`iot_drivers::SystemSample`]. Two wire variants are observed in the
//! field: single-quoted JSON-like text (used over MQTT) and a
//! base64-wrapped binary schema (used over AMQP). Both map `bytes -> sample
//! | error`; neither auto-detects the other, per the deployment doing the
//! picking once and documenting it.

pub mod binary;
pub mod json;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("binary payload too short: need at least {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("payload is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub use binary::{parse_data_binary, parse_metrics_binary};
pub use json::{parse_data_json, parse_metrics_json};
