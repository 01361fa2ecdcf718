use crate::mqtt::ha_interface::{HAPlatform, HaComponent, HaDiscover};
use crate::mqtt::MeteringData;
use crate::models::DeviceProtocol;
use crate::{get_id, get_unix_ts};

use super::decoder::DecoderStats;
use super::record::TeleinfoRecord;
use super::structs::*;
use super::TeleinfoError;

const PROTO_NAME: &str = "Teleinfo";

/// Parses the longest leading run of decimal digits.
///
/// Leading whitespace and a single `+` are skipped, anything after the digits
/// is ignored. Returns 0 when no digit is found and saturates on overflow.
pub fn parse_leading_u64(value: &str) -> u64 {
    let trimmed = value.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut result: u64 = 0;
    for c in digits.bytes().take_while(|c| c.is_ascii_digit()) {
        result = result
            .saturating_mul(10)
            .saturating_add((c - b'0') as u64);
    }
    result
}

pub fn parse_leading_u32(value: &str) -> u32 {
    u32::try_from(parse_leading_u64(value)).unwrap_or(u32::MAX)
}

/// Teleinfo group checksum of a label/value pair
pub fn compute_checksum(label: &str, value: &str) -> u8 {
    let sum = label.bytes().map(|b| b as u32).sum::<u32>()
        + TELEINFO_CHAR_SPACE as u32
        + value.bytes().map(|b| b as u32).sum::<u32>();
    ((sum & 0x3F) + 0x20) as u8
}

/// Wire representation of one group: LF label SP value SP checksum CR
pub fn encode_group(label: &str, value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(label.len() + value.len() + 5);
    out.push(TELEINFO_CHAR_LF);
    out.extend_from_slice(label.as_bytes());
    out.push(TELEINFO_CHAR_SPACE);
    out.extend_from_slice(value.as_bytes());
    out.push(TELEINFO_CHAR_SPACE);
    out.push(compute_checksum(label, value));
    out.push(TELEINFO_CHAR_CR);
    out
}

/// Complete frame (STX groups ETX) for the given label/value pairs
pub fn encode_frame(groups: &[(&str, &str)]) -> Vec<u8> {
    let mut out = vec![TELEINFO_CHAR_STX];
    for (label, value) in groups {
        out.extend(encode_group(label, value));
    }
    out.push(TELEINFO_CHAR_ETX);
    out
}

/// Metered values of a record: the frame fields plus the derived values
pub fn record_to_values(record: &TeleinfoRecord) -> serde_json::Map<String, serde_json::Value> {
    let mut values = match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    values.insert("total_index".to_string(), record.total_index().into());
    values.insert("inst_power".to_string(), record.inst_power().into());
    values.insert("overcurrent".to_string(), (record.adps > 0).into());
    if !record.adco.is_empty() {
        values.insert("adco_checksum8".to_string(), record.adco_checksum8().into());
    }
    values
}

pub fn to_metering_data(meter_name: &str, record: &TeleinfoRecord, stats: &DecoderStats) -> MeteringData {
    let mut mr = MeteringData::new();
    let now = get_unix_ts();
    mr.id = get_id("teleinfo", meter_name);
    mr.meter_name = meter_name.to_string();
    mr.protocol = DeviceProtocol::Teleinfo;
    mr.transmission_time = now;
    mr.metered_time = now;
    mr.metered_values = record_to_values(record);

    let mut protocol_map = serde_json::Map::new();
    protocol_map.insert("type".to_string(), "teleinfo".into());
    protocol_map.insert("tariff_option".to_string(), record.tariff_option().to_string().into());
    protocol_map.insert("frames".to_string(), stats.frames.into());
    protocol_map.insert("checksum_errors".to_string(), stats.checksum_errors.into());
    protocol_map.insert("aborted_frames".to_string(), stats.aborted_frames.into());
    mr.metered_values.insert("proto".to_string(), protocol_map.into());

    mr
}

/// Home Assistant device for a meter, built from its first complete frame.
///
/// The meter address and a known tariff option are required so a device is
/// never announced from a partial frame.
pub fn build_discovery(meter_name: &str, record: &TeleinfoRecord) -> Result<HaDiscover, TeleinfoError> {
    if record.adco.is_empty() {
        return Err(TeleinfoError::MissingAddress);
    }

    let option = record.tariff_option();
    if option == TariffOption::Unknown {
        return Err(TeleinfoError::UnknownTariffOption(record.optarif.clone()));
    }

    let model = format!("Teleinfo {} ({})", option.to_string(), record.adco);
    let mut disc = HaDiscover::new(meter_name, "Enedis", &model, PROTO_NAME);

    for label in option.index_labels() {
        disc.add_component(label, HaComponent::new_energy(meter_name, PROTO_NAME, label, label));
    }
    disc.add_component("total_index", HaComponent::new_energy(meter_name, PROTO_NAME, "Total index", "total_index"));
    disc.add_component("PAPP", HaComponent::new_apparent_power(meter_name, PROTO_NAME, "Apparent power", "PAPP"));
    disc.add_component("IINST", HaComponent::new_current(meter_name, PROTO_NAME, "Current", "IINST"));
    disc.add_component("inst_power", HaComponent::new_power(meter_name, PROTO_NAME, "Power", "inst_power"));
    disc.add_component("PTEC", HaComponent::new_text(meter_name, PROTO_NAME, "Tariff period", "PTEC"));
    disc.add_component("overcurrent", HaComponent::new(
        HAPlatform::BinarySensor, meter_name, "problem", "NONE", PROTO_NAME, "Overcurrent", "overcurrent", "NONE"
    ));

    Ok(disc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_u64() {
        assert_eq!(parse_leading_u64("026489026467"), 26489026467);
        assert_eq!(parse_leading_u64("999999999999"), 999999999999);
        assert_eq!(parse_leading_u64("000000000000"), 0);
        assert_eq!(parse_leading_u64("ABCDEFGHIJKL"), 0);
        assert_eq!(parse_leading_u64(""), 0);
        assert_eq!(parse_leading_u64("00970VA"), 970);
        assert_eq!(parse_leading_u64("  +12"), 12);
        assert_eq!(parse_leading_u64("-12"), 0);
        assert_eq!(parse_leading_u64("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_parse_leading_u32() {
        assert_eq!(parse_leading_u32("030"), 30);
        assert_eq!(parse_leading_u32("x30"), 0);
        assert_eq!(parse_leading_u32("99999999999"), u32::MAX);
    }

    #[test]
    fn test_compute_checksum() {
        assert_eq!(compute_checksum("ADCO", "026489026467"), b'M');
        assert_eq!(compute_checksum("@", ""), b'@');
    }

    #[test]
    fn test_encode_group() {
        let bytes = encode_group("PAPP", "00970");
        assert_eq!(bytes.first(), Some(&TELEINFO_CHAR_LF));
        assert_eq!(bytes.last(), Some(&TELEINFO_CHAR_CR));
        assert_eq!(&bytes[1..11], b"PAPP 00970");
        assert_eq!(bytes[11], TELEINFO_CHAR_SPACE);
        assert_eq!(bytes[12], compute_checksum("PAPP", "00970"));
    }

    #[test]
    fn test_encode_frame() {
        let bytes = encode_frame(&[("ADCO", "0")]);
        assert_eq!(bytes[0], TELEINFO_CHAR_STX);
        assert_eq!(*bytes.last().unwrap(), TELEINFO_CHAR_ETX);
        assert_eq!(bytes.len(), 2 + encode_group("ADCO", "0").len());
    }

    fn base_record() -> TeleinfoRecord {
        let mut record = TeleinfoRecord::new();
        record.adco = "026489026467".to_string();
        record.optarif = "BASE".to_string();
        record.isousc = 30;
        record.base = 1502958611;
        record.ptec = "TH..".to_string();
        record.iinst = 4;
        record.papp = 970;
        record
    }

    #[test]
    fn test_record_to_values() {
        let values = record_to_values(&base_record());
        assert_eq!(values["ADCO"], "026489026467");
        assert_eq!(values["BASE"], 1502958611u64);
        assert_eq!(values["PAPP"], 970);
        assert_eq!(values["total_index"], 1502958611u64);
        assert_eq!(values["inst_power"], 970);
        assert_eq!(values["overcurrent"], false);
        assert_eq!(values["adco_checksum8"], 0x76);
        assert!(values.get("HCHC").is_none());
    }

    #[test]
    fn test_values_without_address() {
        let values = record_to_values(&TeleinfoRecord::new());
        assert!(values.get("ADCO").is_none());
        assert!(values.get("adco_checksum8").is_none());
        assert_eq!(values["inst_power"], 0);
    }

    #[test]
    fn test_to_metering_data() {
        let stats = DecoderStats { frames: 3, checksum_errors: 1, aborted_frames: 0 };
        let mr = to_metering_data("linky", &base_record(), &stats);
        assert_eq!(mr.meter_name, "linky");
        assert_eq!(mr.protocol, DeviceProtocol::Teleinfo);
        assert!(mr.id.starts_with("teleinfo-linky-"));
        assert_eq!(mr.transmission_time, mr.metered_time);
        assert_eq!(mr.metered_values["proto"]["tariff_option"], "Base");
        assert_eq!(mr.metered_values["proto"]["frames"], 3);
        assert_eq!(mr.metered_values["proto"]["checksum_errors"], 1);
    }

    #[test]
    fn test_build_discovery() {
        let disc = build_discovery("linky", &base_record()).unwrap();
        assert_eq!(disc.discover_topic, "homeassistant/device/t2m_Teleinfo-linky/config");
        assert!(disc.cmps.contains_key("BASE"));
        assert!(!disc.cmps.contains_key("HCHC"));
        assert_eq!(disc.cmps["overcurrent"]["p"], "binary_sensor");
        assert_eq!(disc.cmps["PAPP"]["value_template"], "{{ value_json.PAPP }}");

        let json = serde_json::to_value(&disc).unwrap();
        assert_eq!(json["dev"]["model"], "Teleinfo Base (026489026467)");
    }

    #[test]
    fn test_build_discovery_tempo() {
        let mut record = base_record();
        record.optarif = "BBR(".to_string();
        let disc = build_discovery("linky", &record).unwrap();
        for label in ["BBRHCJB", "BBRHPJB", "BBRHCJW", "BBRHPJW", "BBRHCJR", "BBRHPJR"] {
            assert!(disc.cmps.contains_key(label));
        }
    }

    #[test]
    fn test_build_discovery_needs_address() {
        let result = build_discovery("linky", &TeleinfoRecord::new());
        assert!(matches!(result, Err(TeleinfoError::MissingAddress)));
    }

    #[test]
    fn test_build_discovery_needs_tariff_option() {
        let mut record = base_record();
        record.optarif.clear();
        let result = build_discovery("linky", &record);
        assert!(matches!(result, Err(TeleinfoError::UnknownTariffOption(o)) if o.is_empty()));

        record.optarif = "XYZ".to_string();
        assert!(matches!(build_discovery("linky", &record), Err(TeleinfoError::UnknownTariffOption(_))));
    }
}
