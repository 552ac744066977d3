#![deny(rust_2018_idioms)]

mod cli;
mod error;
mod model;
mod validation;

pub use cli::{CliArgs, Config, MultiDeviceCliArgs};
pub use error::ConfigError;
pub use model::{
    AmqpConfig, BackoffConfig, BufferConfig, DeviceConfig, LogConfig, LogLevel, LogSourceConfig,
    MqttConfig, RawConfig, TopicConfig, WifiConfig, REQUIRED_TOPIC_NAMES,
};
