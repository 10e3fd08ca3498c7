use crate::config::{AppConfig, BrokerAddress, ConfigError};

use super::transport::TransportSettings;

/// Everything needed to open the MQTT session
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub broker: BrokerAddress,
    pub client_id: String,
}

impl MqttConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            broker: config.broker()?,
            client_id: config.main.mqtt_client_id.clone(),
        })
    }
}

impl From<&AppConfig> for TransportSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            keep_alive: config.keep_alive(),
            reconnect_delay: config.reconnect_delay(),
            request_capacity: config.main.channel_capacity,
        }
    }
}
