/// Line speed of the historical Teleinfo output (7E1).
pub const TELEINFO_BAUD_RATE: u32 = 1200;

// Control characters of the Teleinfo protocol
pub const TELEINFO_CHAR_STX: u8 = 0x02; // start of frame
pub const TELEINFO_CHAR_ETX: u8 = 0x03; // end of frame
pub const TELEINFO_CHAR_EOT: u8 = 0x04; // frame interrupted
pub const TELEINFO_CHAR_LF: u8 = 0x0A; // start of group
pub const TELEINFO_CHAR_CR: u8 = 0x0D; // end of group
pub const TELEINFO_CHAR_SPACE: u8 = 0x20; // field separator

/// Size of the label and value buffers of a group, terminating zero included
pub const GROUP_BUFFER_SIZE: usize = 64;

/// Nominal mains voltage used to estimate power from IINST
pub const NOMINAL_VOLTAGE: u32 = 230;

/// Tariff option announced by the meter in OPTARIF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TariffOption {
    Base,
    OffPeak,
    Ejp,
    Tempo,
    Unknown,
}

impl TariffOption {
    pub fn from_optarif(optarif: &str) -> Self {
        match optarif {
            "BASE" => TariffOption::Base,
            "HC.." => TariffOption::OffPeak,
            "EJP." => TariffOption::Ejp,
            o if o.starts_with("BBR") => TariffOption::Tempo,
            _ => TariffOption::Unknown,
        }
    }

    /// Index labels the meter sends for this option
    pub fn index_labels(&self) -> &'static [&'static str] {
        match self {
            TariffOption::Base => &["BASE"],
            TariffOption::OffPeak => &["HCHC", "HCHP"],
            TariffOption::Ejp => &["EJPHN", "EJPHPM"],
            TariffOption::Tempo => &["BBRHCJB", "BBRHPJB", "BBRHCJW", "BBRHPJW", "BBRHCJR", "BBRHPJR"],
            TariffOption::Unknown => &[],
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            TariffOption::Base => "Base".to_string(),
            TariffOption::OffPeak => "Heures Creuses".to_string(),
            TariffOption::Ejp => "EJP".to_string(),
            TariffOption::Tempo => "Tempo".to_string(),
            TariffOption::Unknown => "Unknown".to_string(),
        }
    }
}
