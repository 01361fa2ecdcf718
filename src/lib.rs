//! Teleinfo to MQTT bridge
//!
//! Decodes the historical Teleinfo output of French electricity meters and
//! publishes every frame, plus Home Assistant discovery, over MQTT.

pub mod models;
pub mod mqtt;
pub mod config;
pub mod teleinfo;

// Re-export common types for easier access
pub use mqtt::{CALLBACKS, MeteringData, MqttManager};
pub use config::CONFIG;
pub use teleinfo::{TeleinfoDecoder, TeleinfoManager, TeleinfoRecord};

pub fn get_unix_ts() -> u64 {
    return std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
}

pub fn get_id(protocol: &str, meter_name: &str) -> String {
    return format!("{}-{}-{:?}", protocol, meter_name, get_unix_ts());
}
