//! Per-device last-value gauges that preserve the producer's sample
//! timestamp through the scrape interface. `prometheus::GaugeVec` stamps at
//! scrape time, which would fuse distinct producer samples into the scrape
//! cadence, so the four families are hand-rolled maps guarded by one lock
//! instead — the single-writer/many-reader pattern, generalized from a
//! RWMutex-of-maps to this crate's `parking_lot::RwLock`.

use chrono::{DateTime, Utc};
use iot_drivers::SystemSample;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeEntry {
    pub value: f64,
    pub sample_timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Gauges {
    cpu_usage: HashMap<String, GaugeEntry>,
    memory_usage: HashMap<String, GaugeEntry>,
    disk_usage: HashMap<String, GaugeEntry>,
    network_usage: HashMap<String, GaugeEntry>,
}

/// Maintains four labelled `deviceID -> GaugeEntry` maps. `record` replaces
/// all four cells for one device under a single write lock (invariant G1:
/// only the most recent-by-arrival sample is exposed). `collect` takes a
/// read lock and emits every cell with its own producer timestamp
/// (invariant G2: value and timestamp for one scrape are read atomically
/// from the same write).
pub struct TimestampedGaugeCollector {
    gauges: RwLock<Gauges>,
}

impl Default for TimestampedGaugeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampedGaugeCollector {
    pub fn new() -> Self {
        Self {
            gauges: RwLock::new(Gauges::default()),
        }
    }

    pub fn record(&self, sample: &SystemSample) {
        let mut gauges = self.gauges.write();
        let entry = |value: f64| GaugeEntry {
            value,
            sample_timestamp: sample.timestamp,
        };
        gauges
            .cpu_usage
            .insert(sample.sensor_id.clone(), entry(sample.cpu_usage));
        gauges
            .memory_usage
            .insert(sample.sensor_id.clone(), entry(sample.memory_usage));
        gauges
            .disk_usage
            .insert(sample.sensor_id.clone(), entry(sample.disk_usage));
        gauges
            .network_usage
            .insert(sample.sensor_id.clone(), entry(sample.network_usage));
    }

    /// Renders the standard Prometheus text exposition format, one sample
    /// line per device per metric family, each carrying its own producer
    /// timestamp in milliseconds since the epoch rather than the scrape
    /// time.
    pub fn collect(&self) -> String {
        let gauges = self.gauges.read();
        let mut out = String::new();
        render_family(
            &mut out,
            "iot_device_cpu_usage_percent",
            "CPU usage percentage reported by the device",
            &gauges.cpu_usage,
        );
        render_family(
            &mut out,
            "iot_device_memory_usage_percent",
            "Memory usage percentage reported by the device",
            &gauges.memory_usage,
        );
        render_family(
            &mut out,
            "iot_device_disk_usage_percent",
            "Disk usage percentage reported by the device",
            &gauges.disk_usage,
        );
        render_family(
            &mut out,
            "iot_device_network_usage_percent",
            "Network usage percentage reported by the device",
            &gauges.network_usage,
        );
        out
    }
}

fn render_family(out: &mut String, name: &str, help: &str, values: &HashMap<String, GaugeEntry>) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
    for (device_id, entry) in values {
        out.push_str(&format!(
            "{name}{{device_id=\"{device_id}\"}} {value} {timestamp}\n",
            value = entry.value,
            timestamp = entry.sample_timestamp.timestamp_millis(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(device_id: &str, timestamp: DateTime<Utc>) -> SystemSample {
        SystemSample {
            sensor_id: device_id.to_string(),
            cpu_usage: 12.5,
            memory_usage: 30.0,
            disk_usage: 40.0,
            network_usage: 5.0,
            timestamp,
        }
    }

    #[test]
    fn scrape_preserves_producer_timestamp_not_scrape_time() {
        let collector = TimestampedGaugeCollector::new();
        let producer_time = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        collector.record(&sample("d1", producer_time));

        let text = collector.collect();
        let expected_line = format!(
            "iot_device_cpu_usage_percent{{device_id=\"d1\"}} 12.5 {}",
            producer_time.timestamp_millis()
        );
        assert!(text.contains(&expected_line));
    }

    #[test]
    fn only_most_recent_sample_per_device_is_exposed() {
        let collector = TimestampedGaugeCollector::new();
        collector.record(&sample("d1", Utc.timestamp_opt(1, 0).single().unwrap()));
        collector.record(&sample("d1", Utc.timestamp_opt(2, 0).single().unwrap()));

        let text = collector.collect();
        let occurrences = text.matches("device_id=\"d1\"").count();
        assert_eq!(occurrences, 4, "one line per metric family, not one per record() call");
    }

    #[test]
    fn distinct_devices_are_labelled_independently() {
        let collector = TimestampedGaugeCollector::new();
        collector.record(&sample("d1", Utc::now()));
        collector.record(&sample("d2", Utc::now()));

        let text = collector.collect();
        assert!(text.contains("device_id=\"d1\""));
        assert!(text.contains("device_id=\"d2\""));
    }
}
