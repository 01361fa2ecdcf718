use serde::{Deserialize, Serialize};

/// Protocol a metering value was read with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceProtocol {
    Unknown,
    Teleinfo,
}

impl DeviceProtocol {
    pub fn to_string(&self) -> String {
        match self {
            DeviceProtocol::Unknown => "Unknown".to_string(),
            DeviceProtocol::Teleinfo => "Teleinfo".to_string(),
        }
    }
}
