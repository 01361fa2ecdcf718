use serde::Serialize;

use super::group::Group;
use super::structs::{TariffOption, NOMINAL_VOLTAGE};
use super::utils::{parse_leading_u32, parse_leading_u64};

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_nul(value: &char) -> bool {
    *value == '\0'
}

/// All data a meter sends in one Teleinfo frame.
///
/// Fields that were not part of the frame keep their default: 0, an empty
/// string or NUL for HHPHC. Energy indexes are in Wh, currents in A and the
/// apparent power in VA.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct TeleinfoRecord {
    /// Meter address
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adco: String,
    /// Tariff option
    #[serde(skip_serializing_if = "String::is_empty")]
    pub optarif: String,
    /// Subscribed current
    pub isousc: u32,

    // Option BASE
    #[serde(skip_serializing_if = "is_zero")]
    pub base: u64,

    // Option Heures Creuses
    #[serde(skip_serializing_if = "is_zero")]
    pub hchc: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub hchp: u64,

    // Option EJP
    #[serde(skip_serializing_if = "is_zero")]
    pub ejphn: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub ejphpm: u64,

    // Option TEMPO, blue / white / red days
    #[serde(skip_serializing_if = "is_zero")]
    pub bbrhcjb: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub bbrhpjb: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub bbrhcjw: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub bbrhpjw: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub bbrhcjr: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub bbrhpjr: u64,

    /// Minutes of advance notice before an EJP peak period
    pub pejp: u32,
    /// Tariff period in progress
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ptec: String,
    /// Color of the next day (Tempo)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub demain: String,
    /// Instantaneous current
    pub iinst: u32,
    /// Subscribed power exceeded warning
    pub adps: u32,
    /// Maximum current called
    pub imax: u32,
    /// Apparent power
    pub papp: u32,
    /// Off-peak/peak schedule group
    #[serde(skip_serializing_if = "is_nul")]
    pub hhphc: char,
    /// Meter status word
    #[serde(skip_serializing_if = "String::is_empty")]
    pub motdetat: String,
}

impl TeleinfoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Stores the value of a validated group in the matching field.
    ///
    /// Labels outside the known catalog are ignored.
    pub fn merge(&mut self, group: &Group) {
        let value = group.value();
        match group.label() {
            "ADCO" => self.adco = value.to_string(),
            "OPTARIF" => self.optarif = value.to_string(),
            "ISOUSC" => self.isousc = parse_leading_u32(value),
            "BASE" => self.base = parse_leading_u64(value),
            "HCHC" => self.hchc = parse_leading_u64(value),
            "HCHP" => self.hchp = parse_leading_u64(value),
            "EJPHN" => self.ejphn = parse_leading_u64(value),
            "EJPHPM" => self.ejphpm = parse_leading_u64(value),
            "BBRHCJB" => self.bbrhcjb = parse_leading_u64(value),
            "BBRHPJB" => self.bbrhpjb = parse_leading_u64(value),
            "BBRHCJW" => self.bbrhcjw = parse_leading_u64(value),
            "BBRHPJW" => self.bbrhpjw = parse_leading_u64(value),
            "BBRHCJR" => self.bbrhcjr = parse_leading_u64(value),
            "BBRHPJR" => self.bbrhpjr = parse_leading_u64(value),
            "PEJP" => self.pejp = parse_leading_u32(value),
            "PTEC" => self.ptec = value.to_string(),
            "DEMAIN" => self.demain = value.to_string(),
            "IINST" => self.iinst = parse_leading_u32(value),
            "ADPS" => self.adps = parse_leading_u32(value),
            "IMAX" => self.imax = parse_leading_u32(value),
            "PAPP" => self.papp = parse_leading_u32(value),
            "HHPHC" => self.hhphc = value.chars().next().unwrap_or('\0'),
            "MOTDETAT" => self.motdetat = value.to_string(),
            _ => {}
        }
    }

    /// Sum of every index, whatever the tariff option is.
    pub fn total_index(&self) -> u64 {
        [
            self.base,
            self.hchc,
            self.hchp,
            self.ejphn,
            self.ejphpm,
            self.bbrhcjb,
            self.bbrhpjb,
            self.bbrhcjw,
            self.bbrhpjw,
            self.bbrhcjr,
            self.bbrhpjr,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// PAPP if the meter sends it, otherwise IINST x 230 V, otherwise 0.
    pub fn inst_power(&self) -> u32 {
        if self.papp > 0 {
            self.papp
        } else if self.iinst > 0 {
            self.iinst.saturating_mul(NOMINAL_VOLTAGE)
        } else {
            0
        }
    }

    /// ADCO as a number, 0 if it does not start with digits
    pub fn adco_as_u64(&self) -> u64 {
        parse_leading_u64(&self.adco)
    }

    /// 8 bit wrapping sum of the ADCO characters, usable as a short meter tag
    pub fn adco_checksum8(&self) -> u8 {
        self.adco.bytes().fold(0u8, |acc, b| acc.wrapping_add(b))
    }

    pub fn tariff_option(&self) -> TariffOption {
        TariffOption::from_optarif(&self.optarif)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(label: &str, value: &str) -> Group {
        let mut g = Group::new();
        label.bytes().for_each(|b| g.append_label(b));
        value.bytes().for_each(|b| g.append_value(b));
        g
    }

    fn record_with(groups: &[(&str, &str)]) -> TeleinfoRecord {
        let mut record = TeleinfoRecord::new();
        for (label, value) in groups {
            record.merge(&group(label, value));
        }
        record
    }

    #[test]
    fn test_merge_all_fields() {
        let record = record_with(&[
            ("ADCO", "026489026467"),
            ("OPTARIF", "BASE"),
            ("ISOUSC", "30"),
            ("BASE", "006789543"),
            ("HCHC", "000654398"),
            ("HCHP", "009755123"),
            ("EJPHN", "000003365"),
            ("EJPHPM", "003556600"),
            ("BBRHCJB", "002836660"),
            ("BBRHPJB", "001117777"),
            ("BBRHCJW", "900222022"),
            ("BBRHPJW", "568800001"),
            ("BBRHCJR", "009222010"),
            ("BBRHPJR", "000001112"),
            ("PEJP", "60"),
            ("PTEC", "HCJB"),
            ("DEMAIN", "BLAN"),
            ("ADPS", "020"),
            ("IINST", "004"),
            ("IMAX", "030"),
            ("PAPP", "00970"),
            ("HHPHC", "D"),
            ("MOTDETAT", "000000"),
        ]);

        assert_eq!(record.adco, "026489026467");
        assert_eq!(record.optarif, "BASE");
        assert_eq!(record.isousc, 30);
        assert_eq!(record.base, 6789543);
        assert_eq!(record.hchc, 654398);
        assert_eq!(record.hchp, 9755123);
        assert_eq!(record.ejphn, 3365);
        assert_eq!(record.ejphpm, 3556600);
        assert_eq!(record.bbrhcjb, 2836660);
        assert_eq!(record.bbrhpjb, 1117777);
        assert_eq!(record.bbrhcjw, 900222022);
        assert_eq!(record.bbrhpjw, 568800001);
        assert_eq!(record.bbrhcjr, 9222010);
        assert_eq!(record.bbrhpjr, 1112);
        assert_eq!(record.pejp, 60);
        assert_eq!(record.ptec, "HCJB");
        assert_eq!(record.demain, "BLAN");
        assert_eq!(record.adps, 20);
        assert_eq!(record.iinst, 4);
        assert_eq!(record.imax, 30);
        assert_eq!(record.papp, 970);
        assert_eq!(record.hhphc, 'D');
        assert_eq!(record.motdetat, "000000");
        assert_eq!(record.total_index(), 1502958611);
    }

    #[test]
    fn test_unknown_and_lowercase_labels_ignored() {
        let record = record_with(&[("PPOT", "00"), ("papp", "1200"), ("ADIR1", "045")]);
        assert_eq!(record, TeleinfoRecord::default());
    }

    #[test]
    fn test_empty_and_garbage_values() {
        let record = record_with(&[("HHPHC", ""), ("PAPP", ""), ("IINST", "A12"), ("BASE", "12kWh")]);
        assert_eq!(record.hhphc, '\0');
        assert_eq!(record.papp, 0);
        assert_eq!(record.iinst, 0);
        assert_eq!(record.base, 12);
    }

    #[test]
    fn test_total_index_max() {
        let labels = ["BASE", "HCHC", "HCHP", "EJPHN", "EJPHPM", "BBRHCJB", "BBRHPJB", "BBRHCJW", "BBRHPJW", "BBRHCJR", "BBRHPJR"];
        let groups: Vec<(&str, &str)> = labels.iter().map(|l| (*l, "999999999")).collect();
        let record = record_with(&groups);
        assert_eq!(record.total_index(), 10999999989);
    }

    #[test]
    fn test_inst_power() {
        let mut record = TeleinfoRecord::new();
        assert_eq!(record.inst_power(), 0);

        record.iinst = 17;
        assert_eq!(record.inst_power(), 3910);

        record.papp = 4000;
        assert_eq!(record.inst_power(), 4000);
    }

    #[test]
    fn test_adco_as_u64() {
        let mut record = TeleinfoRecord::new();
        assert_eq!(record.adco_as_u64(), 0);

        for (adco, expected) in [
            ("026489026467", 26489026467u64),
            ("999999999999", 999999999999),
            ("000000000000", 0),
            ("ABCDEFGHIJKL", 0),
        ] {
            record.adco = adco.to_string();
            assert_eq!(record.adco_as_u64(), expected, "ADCO {adco}");
        }
    }

    #[test]
    fn test_adco_checksum8() {
        let mut record = TeleinfoRecord::new();
        assert_eq!(record.adco_checksum8(), 0x00);

        record.adco = "026489026467".to_string();
        assert_eq!(record.adco_checksum8(), 0x76);

        record.adco = "0".to_string();
        assert_eq!(record.adco_checksum8(), 0x30);
    }

    #[test]
    fn test_reset() {
        let mut record = record_with(&[("ADCO", "026489026467"), ("HHPHC", "A"), ("BASE", "1")]);
        record.reset();
        assert_eq!(record, TeleinfoRecord::default());
        assert_eq!(record.hhphc, '\0');
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let record = record_with(&[("ADCO", "026489026467"), ("OPTARIF", "BASE"), ("BASE", "006789543"), ("PAPP", "00970")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ADCO"], "026489026467");
        assert_eq!(json["BASE"], 6789543);
        assert_eq!(json["PAPP"], 970);
        assert_eq!(json["IINST"], 0);
        assert!(json.get("HCHC").is_none());
        assert!(json.get("HHPHC").is_none());
        assert!(json.get("PTEC").is_none());
    }
}
