#![deny(rust_2018_idioms)]

//! Level-filtered, key/value structured logging, configured from the
//! `[log]` table: `level`, and `source.{enabled, relative, as_json}`.

use iot_config::{LogConfig, LogLevel};
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to build log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn level_filter(level: LogLevel) -> &'static str {
    level.as_str()
}

/// Installs the global tracing subscriber once per process. Safe to call
/// more than once within a test binary; subsequent calls are no-ops.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(level_filter(config.level))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(config.source.enabled && !config.source.relative)
        .with_line_number(config.source.enabled);

    if config.source.as_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json());
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::warn!("global tracing subscriber already set, skipping re-init");
        }
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact());
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::warn!("global tracing subscriber already set, skipping re-init");
        }
    }

    Ok(())
}
