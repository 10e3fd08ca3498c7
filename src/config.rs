//! # Application Configuration
//!
//! Loads the TOML file that describes the broker connection and the three
//! control groups. The file is read once at startup; nothing is written back.
//!
//! ```toml
//! [main]
//! mqtt_uri = "mqtt://broker.local:1883"
//! mqtt_client_id = "keybridge"
//! debounce_ms = 0
//!
//! [buttons]
//! a = "garage/door/open"
//!
//! [switches]
//! l = "garage/light"
//!
//! [outlets]
//! "Door contact" = "garage/door/state"
//! ```
//!
//! Group tables keep their document order so the window lists controls the
//! way the file lists them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Port used when `mqtt_uri` carries none.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

const URI_SCHEME: &str = "mqtt";
const CONFIG_DIR_NAME: &str = "keybridge";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading or validating the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("\"{option}\" format should be: \"{scheme}://HOST[:PORT]\"")]
    Uri {
        option: &'static str,
        scheme: &'static str,
    },

    #[error("Key '{0}' is bound to more than one control")]
    DuplicateKey(String),

    #[error("Topic '{0}' is listed more than once in [outlets]")]
    DuplicateTopic(String),

    #[error("Invalid entry in [{group}]: {reason}")]
    InvalidEntry { group: &'static str, reason: String },

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// `[main]` section
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MainSection {
    /// Broker address, `mqtt://HOST[:PORT]`
    pub mqtt_uri: String,
    pub mqtt_client_id: String,

    /// Delay before a released momentary button publishes `0`. Zero means
    /// "as soon as the pending input burst has been processed".
    #[serde(default)]
    pub debounce_ms: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Pause between failed polls of the MQTT event loop
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Capacity of the rumqttc request queue and the transport event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_keep_alive_secs() -> u64 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    100
}

/// Whole configuration file
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub main: MainSection,

    /// Momentary buttons, `key = "topic"`
    #[serde(default)]
    pub buttons: IndexMap<String, String>,

    /// Latching switches, `key = "topic"`
    #[serde(default)]
    pub switches: IndexMap<String, String>,

    /// Read-only outlets, `label = "topic"`
    #[serde(default)]
    pub outlets: IndexMap<String, String>,
}

/// Host and port parsed out of `mqtt_uri`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Default location: `<config_dir>/keybridge/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        debug!(
            "Configuration parsed: {} buttons, {} switches, {} outlets",
            config.buttons.len(),
            config.switches.len(),
            config.outlets.len()
        );
        Ok(config)
    }

    /// Checks the broker URI and rejects bindings that would make two controls
    /// compete for the same key or the same inbound topic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker()?;

        if self.main.mqtt_client_id.trim().is_empty() {
            return Err(ConfigError::InvalidEntry {
                group: "main",
                reason: "mqtt_client_id must not be empty".to_string(),
            });
        }

        if self.main.channel_capacity == 0 {
            return Err(ConfigError::InvalidEntry {
                group: "main",
                reason: "channel_capacity must be at least 1".to_string(),
            });
        }

        let mut keys = HashSet::new();
        for (group, entries) in [("buttons", &self.buttons), ("switches", &self.switches)] {
            for (key, topic) in entries {
                check_entry(group, key, topic)?;
                if !keys.insert(key.to_lowercase()) {
                    return Err(ConfigError::DuplicateKey(key.clone()));
                }
            }
        }

        let mut topics = HashSet::new();
        for (label, topic) in &self.outlets {
            check_entry("outlets", label, topic)?;
            if !topics.insert(topic.as_str()) {
                return Err(ConfigError::DuplicateTopic(topic.clone()));
            }
        }

        Ok(())
    }

    /// Parses `mqtt_uri` into host and port.
    pub fn broker(&self) -> Result<BrokerAddress, ConfigError> {
        parse_broker_uri(&self.main.mqtt_uri)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.main.debounce_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.main.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.main.reconnect_delay_ms)
    }
}

fn check_entry(group: &'static str, name: &str, topic: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::InvalidEntry {
            group,
            reason: format!("empty name for topic '{}'", topic),
        });
    }
    if topic.trim().is_empty() {
        return Err(ConfigError::InvalidEntry {
            group,
            reason: format!("'{}' has an empty topic", name),
        });
    }
    Ok(())
}

/// Accepts only `mqtt://HOST[:PORT]`: no path, query, fragment or credentials.
pub fn parse_broker_uri(uri: &str) -> Result<BrokerAddress, ConfigError> {
    let invalid = ConfigError::Uri {
        option: "mqtt_uri",
        scheme: URI_SCHEME,
    };

    let parsed = match Url::parse(uri) {
        Ok(parsed) => parsed,
        Err(_) => return Err(invalid),
    };

    if parsed.scheme() != URI_SCHEME
        || !parsed.path().is_empty()
        || parsed.query().is_some()
        || parsed.fragment().is_some()
        || !parsed.username().is_empty()
        || parsed.password().is_some()
    {
        return Err(invalid);
    }

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(invalid),
    };

    Ok(BrokerAddress {
        host,
        port: parsed.port().unwrap_or(DEFAULT_MQTT_PORT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[main]
mqtt_uri = "mqtt://broker.local:1884"
mqtt_client_id = "bench-1"
debounce_ms = 40

[buttons]
a = "rig/motor/run"
b = "rig/valve/open"

[switches]
l = "rig/light"

[outlets]
"Pressure ok" = "rig/pressure/ok"
"Door" = "rig/door"
"#;

    #[test]
    fn parses_all_groups_in_document_order() {
        let config = AppConfig::from_toml_str(SAMPLE).expect("valid config");

        let buttons: Vec<_> = config.buttons.keys().cloned().collect();
        assert_eq!(buttons, vec!["a", "b"]);
        assert_eq!(config.switches.get("l").map(String::as_str), Some("rig/light"));

        let outlets: Vec<_> = config.outlets.values().cloned().collect();
        assert_eq!(outlets, vec!["rig/pressure/ok", "rig/door"]);

        assert_eq!(config.debounce_delay(), Duration::from_millis(40));
        assert_eq!(config.keep_alive(), Duration::from_secs(5));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(1000));
        assert_eq!(config.main.channel_capacity, 100);
    }

    #[test]
    fn broker_uri_defaults_port() {
        let address = parse_broker_uri("mqtt://localhost").expect("valid uri");
        assert_eq!(
            address,
            BrokerAddress {
                host: "localhost".to_string(),
                port: DEFAULT_MQTT_PORT,
            }
        );

        let address = parse_broker_uri("mqtt://10.0.0.2:2883").expect("valid uri");
        assert_eq!(address.host, "10.0.0.2");
        assert_eq!(address.port, 2883);
    }

    #[test]
    fn broker_uri_rejects_other_shapes() {
        for uri in [
            "tcp://localhost:1883",
            "mqtt://localhost/some/path",
            "mqtt://localhost:1883?x=1",
            "mqtt://localhost#frag",
            "mqtt://user:pw@localhost",
            "localhost:1883",
            "",
        ] {
            let err = parse_broker_uri(uri).expect_err(uri);
            assert!(matches!(err, ConfigError::Uri { .. }), "{uri}: {err}");
        }
    }

    #[test]
    fn uri_error_message_names_the_format() {
        let err = parse_broker_uri("http://x").expect_err("wrong scheme");
        assert_eq!(
            err.to_string(),
            "\"mqtt_uri\" format should be: \"mqtt://HOST[:PORT]\""
        );
    }

    #[test]
    fn rejects_key_bound_twice() {
        let content = r#"
[main]
mqtt_uri = "mqtt://localhost"
mqtt_client_id = "x"

[buttons]
a = "one"

[switches]
A = "two"
"#;
        let err = AppConfig::from_toml_str(content).expect_err("duplicate key");
        assert!(matches!(err, ConfigError::DuplicateKey(key) if key == "A"));
    }

    #[test]
    fn rejects_outlet_topic_listed_twice() {
        let content = r#"
[main]
mqtt_uri = "mqtt://localhost"
mqtt_client_id = "x"

[outlets]
first = "same/topic"
second = "same/topic"
"#;
        let err = AppConfig::from_toml_str(content).expect_err("duplicate topic");
        assert!(matches!(err, ConfigError::DuplicateTopic(topic) if topic == "same/topic"));
    }

    #[test]
    fn rejects_empty_client_id() {
        let content = r#"
[main]
mqtt_uri = "mqtt://localhost"
mqtt_client_id = "  "
"#;
        let err = AppConfig::from_toml_str(content).expect_err("empty id");
        assert!(matches!(err, ConfigError::InvalidEntry { group: "main", .. }));
    }

    #[test]
    fn rejects_zero_channel_capacity() {
        let content = r#"
[main]
mqtt_uri = "mqtt://localhost"
mqtt_client_id = "x"
channel_capacity = 0
"#;
        let err = AppConfig::from_toml_str(content).expect_err("zero capacity");
        assert!(matches!(
            err,
            ConfigError::InvalidEntry { group: "main", ref reason } if reason.contains("channel_capacity")
        ));
    }

    #[test]
    fn missing_groups_are_empty() {
        let content = r#"
[main]
mqtt_uri = "mqtt://localhost"
mqtt_client_id = "x"
"#;
        let config = AppConfig::from_toml_str(content).expect("valid config");
        assert!(config.buttons.is_empty());
        assert!(config.switches.is_empty());
        assert!(config.outlets.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");

        let config = AppConfig::load(file.path()).expect("valid config");
        assert_eq!(config.main.mqtt_client_id, "bench-1");
        assert_eq!(
            config.broker().expect("valid uri"),
            BrokerAddress {
                host: "broker.local".to_string(),
                port: 1884,
            }
        );
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AppConfig::load(Path::new("/nonexistent/keybridge.toml")).expect_err("no file");
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/keybridge.toml"));
    }
}
