use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub relative: bool,
    #[serde(default)]
    pub as_json: bool,
}

impl Default for LogSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relative: true,
            as_json: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    #[serde(default)]
    pub source: LogSourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    /// Sampling tick interval, default 1s (spec.md §4.6).
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// Metrics-print tick interval, default 5s.
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_sample_interval_secs() -> u64 {
    1
}

fn default_metrics_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base_secs")]
    pub base_in_seconds: f64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_in_seconds: f64,
    #[serde(default)]
    pub max_retries: u32,
}

fn default_base_secs() -> f64 {
    0.5
}
fn default_factor() -> f64 {
    2.0
}
fn default_max_delay_secs() -> f64 {
    60.0
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_in_seconds: default_base_secs(),
            factor: default_factor(),
            max_delay_in_seconds: default_max_delay_secs(),
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_capacity() -> usize {
    100
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    pub topic: String,
    #[serde(default)]
    pub buffer: BufferConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub broker: String,
    pub qos: u8,
    pub topics: HashMap<String, TopicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    pub uri: String,
    pub queues: HashMap<String, TopicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub log: LogConfig,
    pub device: DeviceConfig,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub amqp: Option<AmqpConfig>,
    #[serde(default)]
    pub wifi: Option<WifiConfig>,
}

pub const REQUIRED_TOPIC_NAMES: [&str; 2] = ["data_json", "metrics"];
