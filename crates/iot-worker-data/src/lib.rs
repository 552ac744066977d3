#![deny(rust_2018_idioms)]

//! Consumer-side dispatch handler that parses inbound sensor payloads and
//! inserts them into `sensor_data`. At-least-once: the delivery is only
//! acked once the insert has returned success.

use async_trait::async_trait;
use iot_core::{DispatchError, DispatchHandler};
use iot_protocol::{parse_data_binary, parse_data_json};
use sqlx::PgPool;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Binary,
}

pub struct SensorDataHandler {
    pool: PgPool,
    wire: WireFormat,
}

impl SensorDataHandler {
    pub fn new(pool: PgPool, wire: WireFormat) -> Self {
        Self { pool, wire }
    }

    async fn insert(&self, sample: &iot_drivers::SensorSample) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sensor_data (time, device_id, humidity, temperature) VALUES ($1, $2, $3, $4)",
        )
        .bind(sample.timestamp)
        .bind(&sample.sensor_id)
        .bind(sample.humidity)
        .bind(sample.temperature)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DispatchHandler for SensorDataHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let sample = match self.wire {
            WireFormat::Json => parse_data_json(payload),
            WireFormat::Binary => parse_data_binary(payload),
        }
        .map_err(|e| DispatchError::Handler(e.to_string()))?;

        self.insert(&sample)
            .await
            .map_err(|e| DispatchError::Handler(e.to_string()))?;

        debug!(device_id = %sample.sensor_id, "inserted sensor sample");
        Ok(())
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
