use crate::error::ConfigError;
use crate::model::{RawConfig, REQUIRED_TOPIC_NAMES};

impl RawConfig {
    /// Rejects: missing `device.id`; missing broker (neither `[mqtt]` nor
    /// `[amqp]` present, or an empty `mqtt.broker`/`amqp.uri`); QoS out of
    /// range; missing or empty topic string per configured topic; a present
    /// `[wifi]` block with an empty SSID; a missing required topic name
    /// (`data_json`, `metrics`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.id.trim().is_empty() {
            return Err(ConfigError::Invalid("device.id must not be empty".into()));
        }

        match (&self.mqtt, &self.amqp) {
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "at least one of [mqtt] or [amqp] must be configured".into(),
                ));
            }
            (Some(mqtt), _) => {
                if mqtt.broker.trim().is_empty() {
                    return Err(ConfigError::Invalid("mqtt.broker must not be empty".into()));
                }
                if mqtt.qos > 2 {
                    return Err(ConfigError::Invalid(format!(
                        "mqtt.qos must be 0, 1, or 2, got {}",
                        mqtt.qos
                    )));
                }
                for name in REQUIRED_TOPIC_NAMES {
                    let topic = mqtt.topics.get(name).ok_or_else(|| {
                        ConfigError::Invalid(format!("mqtt.topics.{name} is required"))
                    })?;
                    if topic.topic.trim().is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "mqtt.topics.{name}.topic must not be empty"
                        )));
                    }
                }
            }
            _ => {}
        }

        if let Some(amqp) = &self.amqp {
            if amqp.uri.trim().is_empty() {
                return Err(ConfigError::Invalid("amqp.uri must not be empty".into()));
            }
            for name in REQUIRED_TOPIC_NAMES {
                let queue = amqp.queues.get(name).ok_or_else(|| {
                    ConfigError::Invalid(format!("amqp.queues.{name} is required"))
                })?;
                if queue.topic.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "amqp.queues.{name}.topic must not be empty"
                    )));
                }
            }
        }

        if let Some(wifi) = &self.wifi {
            if wifi.ssid.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "wifi.ssid must not be empty when [wifi] is present".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BufferConfig, DeviceConfig, LogConfig, LogLevel, LogSourceConfig, MqttConfig, TopicConfig};
    use std::collections::HashMap;

    fn valid_mqtt() -> MqttConfig {
        let mut topics = HashMap::new();
        topics.insert(
            "data_json".to_string(),
            TopicConfig {
                topic: "devices/data".to_string(),
                buffer: BufferConfig::default(),
            },
        );
        topics.insert(
            "metrics".to_string(),
            TopicConfig {
                topic: "devices/metrics".to_string(),
                buffer: BufferConfig::default(),
            },
        );
        MqttConfig {
            broker: "tcp://localhost:1883".to_string(),
            qos: 1,
            topics,
        }
    }

    fn base_config() -> RawConfig {
        RawConfig {
            log: LogConfig {
                level: LogLevel::Info,
                source: LogSourceConfig::default(),
            },
            device: DeviceConfig {
                id: "device-1".to_string(),
                sample_interval_secs: 1,
                metrics_interval_secs: 5,
            },
            mqtt: Some(valid_mqtt()),
            amqp: None,
            wifi: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_empty_device_id() {
        let mut cfg = base_config();
        cfg.device.id = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_qos_out_of_range() {
        let mut cfg = base_config();
        cfg.mqtt.as_mut().unwrap().qos = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_missing_required_topic() {
        let mut cfg = base_config();
        cfg.mqtt.as_mut().unwrap().topics.remove("metrics");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_wifi_ssid() {
        let mut cfg = base_config();
        cfg.wifi = Some(crate::model::WifiConfig {
            ssid: String::new(),
            password: None,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_no_broker_configured() {
        let mut cfg = base_config();
        cfg.mqtt = None;
        assert!(cfg.validate().is_err());
    }
}
