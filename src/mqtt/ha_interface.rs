use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HaDevice {
    ids: String,
    name: String,
    manufacturer: String,
    model: String,
}
#[derive(Serialize)]
pub struct HaOrigin {
    pub name: String,
    pub sw_version: String,
}

fn is_none_str(value: &String) -> bool {
    if value.is_empty() || value == "NONE" {
        return true;
    }
    return false;
}

#[derive(Serialize, PartialEq, Deserialize, Clone, Default)]
pub enum HAPlatform {
    #[default]
    Sensor,
    BinarySensor,
}

impl HAPlatform {
    pub fn to_string(&self) -> String {
        match self {
            HAPlatform::Sensor => "sensor".to_string(),
            HAPlatform::BinarySensor => "binary_sensor".to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct HaComponent {
    pub p: String,
    pub name: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub device_class: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub unit_of_measurement: String,
    pub value_template: String,
    pub unique_id: String,
    pub object_id: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub state_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<bool>,
}

impl HaComponent {
    /// Generic component reading `value_json.<json_key>` of the state topic
    pub fn new(platform: HAPlatform, device: &str, dclass: &str, uof: &str, proto: &str, name: &str, json_key: &str, state_class: &str) -> Self {
        let safe_name = name.replace(" ", "_");

        let (p_on, p_off) = if platform == HAPlatform::BinarySensor {
            (Some(true), Some(false))
        } else {
            (None, None)
        };

        return HaComponent {
            p: platform.to_string(),
            name: name.to_string(),
            device_class: dclass.to_string(),
            unit_of_measurement: uof.to_string(),
            value_template: format!("{{{{ value_json.{json_key} }}}}"),
            unique_id: format!("t2m_{proto}_{device}_{safe_name}").to_lowercase(),
            object_id: format!("{device}_{safe_name}").to_lowercase(),
            state_class: state_class.to_string(),
            payload_on: p_on,
            payload_off: p_off,
        }
    }

    /// Energy index in Wh, always increasing
    pub fn new_energy(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        Self::new(HAPlatform::Sensor, device, "energy", "Wh", proto, name, json_key, "total_increasing")
    }

    pub fn new_current(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        Self::new(HAPlatform::Sensor, device, "current", "A", proto, name, json_key, "measurement")
    }

    pub fn new_power(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        Self::new(HAPlatform::Sensor, device, "power", "W", proto, name, json_key, "measurement")
    }

    pub fn new_apparent_power(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        Self::new(HAPlatform::Sensor, device, "apparent_power", "VA", proto, name, json_key, "measurement")
    }

    /// Plain text sensor without class or unit
    pub fn new_text(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        Self::new(HAPlatform::Sensor, device, "NONE", "NONE", proto, name, json_key, "NONE")
    }
}

#[derive(Serialize)]
pub struct HaDiscover {
    pub dev: HaDevice,
    pub o: HaOrigin,
    pub cmps: serde_json::Map<String, serde_json::Value>,
    pub state_topic: String,
    pub qos: u32,
    #[serde(skip_serializing)]
    pub discover_topic: String,
}

impl HaDiscover {
    pub fn new(name: &str, manu: &str, model: &str, proto: &str) -> Self {
        return HaDiscover {
            discover_topic: format!("homeassistant/device/t2m_{proto}-{name}/config"),
            dev: HaDevice {
                ids: format!("t2m_{proto}_{name}"),
                name: name.to_string(),
                manufacturer: manu.to_string(),
                model: model.to_string(),
            },
            o: HaOrigin {
                name: "teleinfo2mqtt".to_string(),
                sw_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            cmps: serde_json::Map::new(),
            state_topic: format!("teleinfo2mqtt/devs/{proto}/{name}"),
            qos: 2
        }
    }

    pub fn add_component(&mut self, key: &str, component: HaComponent) {
        match serde_json::to_value(component) {
            Ok(v) => { self.cmps.insert(key.to_string(), v); },
            Err(e) => { log::error!("Unable to serialize component {key}: {e}"); }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_serialization() {
        let cmp = HaComponent::new_energy("linky", "Teleinfo", "BASE", "BASE");
        let json = serde_json::to_value(&cmp).unwrap();
        assert_eq!(json["p"], "sensor");
        assert_eq!(json["device_class"], "energy");
        assert_eq!(json["unit_of_measurement"], "Wh");
        assert_eq!(json["state_class"], "total_increasing");
        assert_eq!(json["value_template"], "{{ value_json.BASE }}");
        assert_eq!(json["unique_id"], "t2m_teleinfo_linky_base");
        assert!(json.get("payload_on").is_none());
    }

    #[test]
    fn test_text_component_skips_none() {
        let json = serde_json::to_value(HaComponent::new_text("linky", "Teleinfo", "PTEC", "PTEC")).unwrap();
        assert!(json.get("device_class").is_none());
        assert!(json.get("unit_of_measurement").is_none());
        assert!(json.get("state_class").is_none());
    }

    #[test]
    fn test_binary_sensor_payloads() {
        let cmp = HaComponent::new(HAPlatform::BinarySensor, "linky", "problem", "NONE", "Teleinfo", "overcurrent", "overcurrent", "NONE");
        assert_eq!(cmp.p, "binary_sensor");
        assert_eq!(cmp.payload_on, Some(true));
        assert_eq!(cmp.payload_off, Some(false));
    }

    #[test]
    fn test_discover_topics() {
        let mut disc = HaDiscover::new("linky", "Enedis", "Teleinfo Base", "Teleinfo");
        disc.add_component("PAPP", HaComponent::new_apparent_power("linky", "Teleinfo", "PAPP", "PAPP"));
        assert_eq!(disc.discover_topic, "homeassistant/device/t2m_Teleinfo-linky/config");
        assert_eq!(disc.state_topic, "teleinfo2mqtt/devs/Teleinfo/linky");

        let json = serde_json::to_value(&disc).unwrap();
        assert!(json.get("discover_topic").is_none());
        assert_eq!(json["cmps"]["PAPP"]["unit_of_measurement"], "VA");
        assert_eq!(json["dev"]["ids"], "t2m_Teleinfo_linky");
    }
}
