use lazy_static::lazy_static;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

use crate::teleinfo::structs::TELEINFO_BAUD_RATE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("No config file found, tried {0}")]
    NotFound(String),
    #[error("Config base {0} not known")]
    UnknownBase(String),
}

fn mqtt_client_name_default() -> String { return "teleinfo2mqtt".to_string() }
fn mqtt_ha_enabled_default() -> bool { return true }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    #[serde(default="mqtt_ha_enabled_default")]
    pub ha_enabled: bool,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
}

fn teleinfo_baud_rate_default() -> u32 { return TELEINFO_BAUD_RATE }
fn teleinfo_publish_interval_default() -> u64 { return 0 }
fn teleinfo_read_timeout_default() -> u64 { return 30 }
fn teleinfo_reopen_delay_default() -> u64 { return 5 }

/// One meter connected either to a local serial port or, without `port`,
/// through the MQTT input topic `teleinfo_input/<name>`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct TeleinfoMeterConfig {
    pub name: String,
    pub port: Option<String>,
    #[serde(default="teleinfo_baud_rate_default")]
    pub baud_rate: u32,
    #[serde(default="teleinfo_publish_interval_default")]
    pub publish_interval: u64,  // Seconds between two published frames, 0 publishes all
    #[serde(default="teleinfo_read_timeout_default")]
    pub read_timeout: u64,      // Seconds without data before warning, 0 never warns
    #[serde(default="teleinfo_reopen_delay_default")]
    pub reopen_delay: u64,      // Seconds before reopening a failed port
}

impl TeleinfoMeterConfig {
    pub fn new(name: &str) -> Self {
        return TeleinfoMeterConfig {
            name: name.to_string(),
            port: None,
            baud_rate: teleinfo_baud_rate_default(),
            publish_interval: teleinfo_publish_interval_default(),
            read_timeout: teleinfo_read_timeout_default(),
            reopen_delay: teleinfo_reopen_delay_default(),
        }
    }

    /// Stall warning delay, `read_timeout: 0` disables the warning
    pub fn stall_timeout(&self) -> Option<Duration> {
        match self.read_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn teleinfo_default() -> Vec<TeleinfoMeterConfig> { return Vec::new(); }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default="teleinfo_default")]
    pub teleinfo: Vec<TeleinfoMeterConfig>,
}

impl Config {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(contents)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }
}

pub struct ConfigHolder {
    pub config: Config,
}

pub enum ConfigBases {
    Mqtt(MqttConfig),
    Teleinfo(Vec<TeleinfoMeterConfig>),
}

const CONFIG_PATHS: [&str; 2] = ["config/t2m.yaml", "t2m.yaml"];

impl ConfigHolder {
    /// Loads the first existing file of `config/t2m.yaml` and `t2m.yaml`
    pub fn load() -> Result<Self, ConfigError> {
        for path in CONFIG_PATHS {
            let p = Path::new(path);
            if !p.exists() {
                continue;
            }

            let config = Config::load_from(p)?;
            info!("Configuration loaded from {path}");
            return Ok(ConfigHolder { config });
        }

        Err(ConfigError::NotFound(CONFIG_PATHS.join(", ")))
    }

    pub fn get_copy(&self, base: &str) -> Result<ConfigBases, ConfigError> {
        match base {
            "mqtt" => { return Ok(ConfigBases::Mqtt(self.config.mqtt.clone())) },
            "teleinfo" => { return Ok(ConfigBases::Teleinfo(self.config.teleinfo.clone())) },
            _ => { Err(ConfigError::UnknownBase(base.to_string())) }
        }
    }
}

lazy_static! {
    pub static ref CONFIG: RwLock<ConfigHolder> = RwLock::new(
        ConfigHolder::load().expect("Unable to load the config from config/t2m.yaml or t2m.yaml")
    );
}

#[macro_export]
macro_rules! get_config_or_panic {
    ($base: expr, $pat: path) => {
        {
            let c = CONFIG.read().unwrap().get_copy($base).unwrap();
            if let $pat(a) = c { // #1
                a
            } else {
                panic!(
                    "mismatch variant when cast to {}",
                    stringify!($pat)); // #2
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
mqtt:
  host: broker.local
  port: 1883
  user: tic
  pass: secret
  ha_enabled: false
teleinfo:
  - name: linky
    port: /dev/ttyAMA0
    publish_interval: 10
  - name: remote
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.client_name, "teleinfo2mqtt");
        assert!(!config.mqtt.ha_enabled);
        assert_eq!(config.teleinfo.len(), 2);

        let linky = &config.teleinfo[0];
        assert_eq!(linky.port.as_deref(), Some("/dev/ttyAMA0"));
        assert_eq!(linky.baud_rate, 1200);
        assert_eq!(linky.publish_interval, 10);
        assert_eq!(linky.read_timeout, 30);
        assert_eq!(linky.reopen_delay, 5);

        assert_eq!(config.teleinfo[1], TeleinfoMeterConfig::new("remote"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("mqtt:\n  host: h\n  port: 1\n  user: u\n  pass: p\n").unwrap();
        assert!(config.mqtt.ha_enabled);
        assert!(config.teleinfo.is_empty());
    }

    #[test]
    fn test_stall_timeout() {
        let config = Config::from_yaml("mqtt:\n  host: h\n  port: 1\n  user: u\n  pass: p\nteleinfo:\n  - name: a\n    read_timeout: 0\n  - name: b\n").unwrap();
        assert_eq!(config.teleinfo[0].stall_timeout(), None);
        assert_eq!(config.teleinfo[1].stall_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_missing_mqtt_section() {
        let result = Config::from_yaml("teleinfo: []\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.teleinfo[0].name, "linky");

        let missing = Config::load_from(Path::new("/nonexistent/t2m.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_get_copy() {
        let holder = ConfigHolder { config: Config::from_yaml(FULL).unwrap() };
        assert!(matches!(holder.get_copy("mqtt"), Ok(ConfigBases::Mqtt(_))));
        match holder.get_copy("teleinfo") {
            Ok(ConfigBases::Teleinfo(meters)) => assert_eq!(meters.len(), 2),
            _ => panic!("expected teleinfo config"),
        }
        assert!(matches!(holder.get_copy("modbus"), Err(ConfigError::UnknownBase(_))));
    }
}
