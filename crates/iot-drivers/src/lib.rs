#![deny(rust_2018_idioms)]

//! Sensor and host-metrics sample producers. Plain value records; the
//! timestamp is assigned by the caller (the orchestrator) at sampling
//! time, never by the driver itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub sensor_id: String,
    pub humidity: f64,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    pub sensor_id: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub network_usage: f64,
    pub timestamp: DateTime<Utc>,
}

/// Raw, timestamp-less probe readings. `Driver` implementations only
/// produce these; the caller stamps a common timestamp across both
/// streams at sampling time (spec.md §3: "timestamp is assigned by the
/// orchestrator at sampling time, not at publish time").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub humidity: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemReading {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub network_usage: f64,
}

pub trait Driver: Send + Sync {
    fn probe_sensor(&self) -> SensorReading;
    fn probe_system_metrics(&self) -> SystemReading;
    fn check_network_connection(&self) -> bool;
    fn handle_reconnect(&self);
}

/// Simulated driver, generating plausible-but-fake readings instead of
/// reading real hardware. Humidity in `[40, 60)`, temperature in
/// `[20, 30)`, and the four system metrics each in `[10, 30)`.
#[derive(Debug, Default)]
pub struct RandomDataDriver;

impl RandomDataDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for RandomDataDriver {
    fn probe_sensor(&self) -> SensorReading {
        let mut rng = rand::rng();
        SensorReading {
            humidity: 40.0 + rand::Rng::random::<f64>(&mut rng) * 20.0,
            temperature: 20.0 + rand::Rng::random::<f64>(&mut rng) * 10.0,
        }
    }

    fn probe_system_metrics(&self) -> SystemReading {
        let mut rng = rand::rng();
        SystemReading {
            cpu_usage: 10.0 + rand::Rng::random::<f64>(&mut rng) * 20.0,
            memory_usage: 10.0 + rand::Rng::random::<f64>(&mut rng) * 20.0,
            disk_usage: 10.0 + rand::Rng::random::<f64>(&mut rng) * 20.0,
            network_usage: 10.0 + rand::Rng::random::<f64>(&mut rng) * 20.0,
        }
    }

    fn check_network_connection(&self) -> bool {
        true
    }

    fn handle_reconnect(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_sensor_reading_stays_in_documented_bounds() {
        let driver = RandomDataDriver::new();
        for _ in 0..1000 {
            let r = driver.probe_sensor();
            assert!((40.0..60.0).contains(&r.humidity));
            assert!((20.0..30.0).contains(&r.temperature));
        }
    }

    #[test]
    fn random_system_reading_stays_in_documented_bounds() {
        let driver = RandomDataDriver::new();
        for _ in 0..1000 {
            let r = driver.probe_system_metrics();
            assert!((10.0..30.0).contains(&r.cpu_usage));
            assert!((10.0..30.0).contains(&r.memory_usage));
            assert!((10.0..30.0).contains(&r.disk_usage));
            assert!((10.0..30.0).contains(&r.network_usage));
        }
    }
}
