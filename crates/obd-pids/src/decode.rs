//! Pure payload decoders
//!
//! Every decoder is a function of the response payload bytes alone; no I/O
//! and no session state. Payloads arrive with the service/PID echo already
//! stripped by the caller, so each decoder sees only its value bytes.

use tracing::debug;

use crate::error::DecodeError;
use crate::uas;
use crate::units::{convert, Unit, UnitSystem};
use crate::value::{
    IgnitionType, MeasurementResult, MonitorStatus, MonitorTest, Status, TroubleCode, TypedValue,
};

/// Names the decode function for a catalogued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderId {
    /// `A * 100 / 255` %
    Percent,
    /// `(A - 128) * 100 / 128` %
    PercentCentered,
    /// `A - 40` °C
    TemperatureC,
    /// `A` kPa
    PressureKpa,
    /// `A * 3` kPa
    FuelPressure,
    /// `int16(A,B) / 4` Pa
    EvapPressure,
    /// `uint16(A,B) / 1000` kPa
    EvapPressureAlt,
    /// `uint16(A,B) / 4` rpm
    Rpm,
    /// `A` km/h
    Speed,
    /// `A / 2 - 64` °
    TimingAdvance,
    /// `uint16(A,B) / 100` g/s
    Maf,
    /// `A / 200` V narrowband sensor
    SensorVoltage,
    /// `uint16(C,D) * 8 / 65535` V wideband sensor
    SensorVoltageWide,
    /// `uint16(C,D) / 256 - 128` mA
    CurrentCentered,
    /// `A * 10` g/s
    MaxMaf,
    /// Unit-and-scaling table entry applied to the big-endian raw field
    Uas(u8),
    /// Supported-PID bitmap, surfaced raw for the discovery walk
    PidSupport,
    /// Readiness monitor frame
    Status,
    /// One DTC pair (freeze frame cause)
    SingleDtc,
    /// Sequence of DTC pairs, `00 00` terminated
    DtcList,
    /// Mode 06 test records
    MonitorTest,
    /// Printable-ASCII text (VIN, calibration id, ECU name)
    EncodedString,
    /// Calibration verification numbers, hex-grouped
    Cvn,
    /// Big-endian integer count
    Count,
    /// O2 sensor presence bitmap
    O2SensorsPresent,
    /// OBD standards compliance table index
    ObdCompliance,
    /// Fuel system status flag bytes
    FuelStatus,
    /// Fuel type table index
    FuelType,
    /// Secondary air status flag byte
    AirStatus,
    /// ASCII voltage reading from `ATRV`
    Voltage,
    /// Response acknowledged, payload irrelevant
    Drop,
}

/// Decode `payload` and convert measurements into `units`.
pub fn decode(
    decoder: DecoderId,
    payload: &[u8],
    units: UnitSystem,
) -> Result<TypedValue, DecodeError> {
    let value = decode_metric(decoder, payload)?;
    Ok(match value {
        TypedValue::Measurement(m) => {
            let (value, unit) = convert(m.value, m.unit, units);
            TypedValue::Measurement(MeasurementResult::new(value, unit))
        }
        other => other,
    })
}

/// Decode `payload` in metric units.
pub fn decode_metric(decoder: DecoderId, payload: &[u8]) -> Result<TypedValue, DecodeError> {
    let measurement =
        |value: f64, unit: Unit| Ok(TypedValue::Measurement(MeasurementResult::new(value, unit)));

    match decoder {
        DecoderId::Percent => {
            need(payload, 1)?;
            measurement(payload[0] as f64 * 100.0 / 255.0, Unit::Percent)
        }
        DecoderId::PercentCentered => {
            need(payload, 1)?;
            measurement((payload[0] as f64 - 128.0) * 100.0 / 128.0, Unit::Percent)
        }
        DecoderId::TemperatureC => {
            need(payload, 1)?;
            measurement(payload[0] as f64 - 40.0, Unit::Celsius)
        }
        DecoderId::PressureKpa => {
            need(payload, 1)?;
            measurement(payload[0] as f64, Unit::Kilopascal)
        }
        DecoderId::FuelPressure => {
            need(payload, 1)?;
            measurement(payload[0] as f64 * 3.0, Unit::Kilopascal)
        }
        DecoderId::EvapPressure => {
            need(payload, 2)?;
            let raw = i16::from_be_bytes([payload[0], payload[1]]);
            measurement(raw as f64 / 4.0, Unit::Pascal)
        }
        DecoderId::EvapPressureAlt => {
            need(payload, 2)?;
            measurement(be16(payload) as f64 / 1000.0, Unit::Kilopascal)
        }
        DecoderId::Rpm => {
            need(payload, 2)?;
            measurement(be16(payload) as f64 / 4.0, Unit::Rpm)
        }
        DecoderId::Speed => {
            need(payload, 1)?;
            measurement(payload[0] as f64, Unit::Kmh)
        }
        DecoderId::TimingAdvance => {
            need(payload, 1)?;
            measurement(payload[0] as f64 / 2.0 - 64.0, Unit::Degree)
        }
        DecoderId::Maf => {
            need(payload, 2)?;
            measurement(be16(payload) as f64 / 100.0, Unit::GramsPerSec)
        }
        DecoderId::SensorVoltage => {
            need(payload, 2)?;
            measurement(payload[0] as f64 / 200.0, Unit::Volt)
        }
        DecoderId::SensorVoltageWide => {
            need(payload, 4)?;
            measurement(
                be16(&payload[2..]) as f64 * 8.0 / 65535.0,
                Unit::Volt,
            )
        }
        DecoderId::CurrentCentered => {
            need(payload, 4)?;
            measurement(
                be16(&payload[2..]) as f64 / 256.0 - 128.0,
                Unit::Milliampere,
            )
        }
        DecoderId::MaxMaf => {
            need(payload, 1)?;
            measurement(payload[0] as f64 * 10.0, Unit::GramsPerSec)
        }
        DecoderId::Uas(uas_id) => {
            need(payload, 1)?;
            let entry = uas::lookup(uas_id).ok_or(DecodeError::UnsupportedDecoder)?;
            let width = payload.len().min(4);
            let raw = be_int(&payload[..width]);
            measurement(entry.apply(raw, width), entry.unit)
        }
        DecoderId::PidSupport => {
            need(payload, 4)?;
            Ok(TypedValue::Raw(payload[..4].to_vec()))
        }
        DecoderId::Status => decode_status(payload),
        DecoderId::SingleDtc => {
            need(payload, 2)?;
            Ok(TypedValue::TroubleCodes(
                TroubleCode::from_bytes(payload[0], payload[1])
                    .into_iter()
                    .collect(),
            ))
        }
        DecoderId::DtcList => Ok(TypedValue::TroubleCodes(decode_dtc_list(payload))),
        DecoderId::MonitorTest => Ok(TypedValue::MonitorTests(decode_monitor_tests(payload))),
        DecoderId::EncodedString => Ok(TypedValue::EncodedString(printable_ascii(payload))),
        DecoderId::Cvn => Ok(TypedValue::EncodedString(decode_cvn(payload))),
        DecoderId::Count => {
            need(payload, 1)?;
            measurement(be_int(payload) as f64, Unit::Count)
        }
        DecoderId::O2SensorsPresent => {
            need(payload, 1)?;
            Ok(TypedValue::EncodedString(decode_o2_sensors(payload[0])))
        }
        DecoderId::ObdCompliance => {
            need(payload, 1)?;
            let index = payload[0] as usize;
            let name = OBD_COMPLIANCE
                .get(index)
                .copied()
                .ok_or(DecodeError::Invalid("unknown OBD compliance value"))?;
            Ok(TypedValue::EncodedString(name.to_string()))
        }
        DecoderId::FuelStatus => decode_fuel_status(payload),
        DecoderId::FuelType => {
            need(payload, 1)?;
            let name = FUEL_TYPES
                .get(payload[0] as usize)
                .copied()
                .ok_or(DecodeError::Invalid("unknown fuel type value"))?;
            Ok(TypedValue::EncodedString(name.to_string()))
        }
        DecoderId::AirStatus => {
            need(payload, 1)?;
            let name = match payload[0] {
                0x01 => "Upstream",
                0x02 => "Downstream of catalytic converter",
                0x04 => "From the outside atmosphere or off",
                0x08 => "Pump commanded on for diagnostics",
                _ => return Err(DecodeError::Invalid("air status byte is not one-hot")),
            };
            Ok(TypedValue::EncodedString(name.to_string()))
        }
        DecoderId::Voltage => decode_voltage(payload),
        DecoderId::Drop => Ok(TypedValue::Raw(payload.to_vec())),
    }
}

/// Iterate a supported-PID bitmap MSB-first; bit `k` set means the PID at
/// `base + k + 1` is supported.
pub fn support_bits(bitmap: &[u8]) -> impl Iterator<Item = bool> + '_ {
    bitmap
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |bit| byte & (1 << bit) != 0))
}

fn need(payload: &[u8], n: usize) -> Result<(), DecodeError> {
    if payload.len() < n {
        Err(DecodeError::InsufficientBytes {
            needed: n,
            got: payload.len(),
        })
    } else {
        Ok(())
    }
}

fn be16(payload: &[u8]) -> u16 {
    u16::from_be_bytes([payload[0], payload[1]])
}

fn be_int(payload: &[u8]) -> u32 {
    payload.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Base monitors present on every vehicle, availability in the low bits of
/// byte B, incompleteness in bits 4..6.
const BASE_MONITORS: [&str; 3] = ["misfire", "fuel_system", "components"];

/// Byte C/D monitors for spark-ignition engines, bit 0 first
const SPARK_MONITORS: [&str; 8] = [
    "catalyst",
    "heated_catalyst",
    "evaporative_system",
    "secondary_air_system",
    "ac_refrigerant",
    "oxygen_sensor",
    "oxygen_sensor_heater",
    "egr_system",
];

/// Byte C/D monitors for compression-ignition engines
const COMPRESSION_MONITORS: [&str; 8] = [
    "nmhc_catalyst",
    "nox_scr_monitor",
    "reserved_1",
    "boost_pressure",
    "reserved_2",
    "exhaust_gas_sensor",
    "pm_filter",
    "egr_vvt_system",
];

fn decode_status(payload: &[u8]) -> Result<TypedValue, DecodeError> {
    need(payload, 4)?;
    let [a, b, c, d] = [payload[0], payload[1], payload[2], payload[3]];

    let ignition = if b & 0x08 != 0 {
        IgnitionType::Compression
    } else {
        IgnitionType::Spark
    };

    let mut monitors = Vec::with_capacity(11);
    for (bit, name) in BASE_MONITORS.iter().enumerate() {
        monitors.push(MonitorStatus {
            name,
            available: b & (1 << bit) != 0,
            complete: b & (1 << (bit + 4)) != 0,
        });
    }

    let specific = match ignition {
        IgnitionType::Spark => &SPARK_MONITORS,
        IgnitionType::Compression => &COMPRESSION_MONITORS,
    };
    for (bit, name) in specific.iter().enumerate() {
        if name.starts_with("reserved") {
            continue;
        }
        monitors.push(MonitorStatus {
            name,
            available: c & (1 << bit) != 0,
            complete: d & (1 << bit) != 0,
        });
    }

    Ok(TypedValue::Status(Status {
        mil: a & 0x80 != 0,
        dtc_count: a & 0x7F,
        ignition,
        monitors,
    }))
}

fn decode_dtc_list(payload: &[u8]) -> Vec<TroubleCode> {
    let mut codes = Vec::new();
    for pair in payload.chunks_exact(2) {
        if let Some(code) = TroubleCode::from_bytes(pair[0], pair[1]) {
            codes.push(code);
        }
    }
    if payload.len() % 2 != 0 {
        debug!(len = payload.len(), "odd trailing byte in DTC payload");
    }
    codes
}

/// Monitor ids with standardized meanings; everything else is vendor space
fn mid_description(mid: u8) -> &'static str {
    match mid {
        0x01 => "O2 sensor monitor bank 1 sensor 1",
        0x02 => "O2 sensor monitor bank 1 sensor 2",
        0x03 => "O2 sensor monitor bank 1 sensor 3",
        0x04 => "O2 sensor monitor bank 1 sensor 4",
        0x05 => "O2 sensor monitor bank 2 sensor 1",
        0x06 => "O2 sensor monitor bank 2 sensor 2",
        0x07 => "O2 sensor monitor bank 2 sensor 3",
        0x08 => "O2 sensor monitor bank 2 sensor 4",
        0x21 => "Catalyst monitor bank 1",
        0x22 => "Catalyst monitor bank 2",
        0x31 => "EGR monitor bank 1",
        0x32 => "EGR monitor bank 2",
        0x39 => "EVAP monitor (cap off)",
        0x3A => "EVAP monitor (0.090\")",
        0x41 => "O2 sensor heater monitor bank 1 sensor 1",
        0x42 => "O2 sensor heater monitor bank 1 sensor 2",
        _ => "Vendor-specific monitor",
    }
}

/// Mode 06 (CAN): records of `[MID, TID, UASID, value, min, max]` with
/// 16-bit fields. Short trailing chunks are dropped.
fn decode_monitor_tests(payload: &[u8]) -> Vec<MonitorTest> {
    let mut tests = Vec::new();
    for record in payload.chunks(9) {
        if record.len() < 9 {
            if !record.iter().all(|&b| b == 0) {
                debug!(len = record.len(), "short monitor test record dropped");
            }
            continue;
        }
        let (mid, test_id, uas_id) = (record[0], record[1], record[2]);
        let raw_value = be16(&record[3..]) as u32;
        let raw_min = be16(&record[5..]) as u32;
        let raw_max = be16(&record[7..]) as u32;

        let (value, min, max, unit) = match uas::lookup(uas_id) {
            Some(entry) => (
                entry.apply(raw_value, 2),
                entry.apply(raw_min, 2),
                entry.apply(raw_max, 2),
                entry.unit,
            ),
            None => (raw_value as f64, raw_min as f64, raw_max as f64, Unit::Count),
        };

        tests.push(MonitorTest {
            mid,
            test_id,
            description: mid_description(mid),
            value,
            min,
            max,
            unit,
            passed: min <= value && value <= max,
        });
    }
    tests
}

/// Keep printable ASCII, dropping NULs and control noise
fn printable_ascii(payload: &[u8]) -> String {
    payload
        .iter()
        .filter(|&&b| (0x20..0x7F).contains(&b))
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

fn decode_cvn(payload: &[u8]) -> String {
    // a leading odd byte is the record count
    let data = if payload.len() % 4 == 1 {
        &payload[1..]
    } else {
        payload
    };
    data.chunks(4)
        .map(|chunk| chunk.iter().map(|b| format!("{b:02X}")).collect::<String>())
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_o2_sensors(bitmap: u8) -> String {
    let mut present = Vec::new();
    for bank in 0..2 {
        for sensor in 0..4 {
            if bitmap & (1 << (bank * 4 + sensor)) != 0 {
                present.push(format!("B{}S{}", bank + 1, sensor + 1));
            }
        }
    }
    present.join(",")
}

const FUEL_STATUS_NAMES: [&str; 5] = [
    "Open loop due to insufficient engine temperature",
    "Closed loop, using oxygen sensor feedback to determine fuel mix",
    "Open loop due to engine load or fuel cut due to deceleration",
    "Open loop due to system failure",
    "Closed loop, using at least one oxygen sensor but there is a fault in the feedback system",
];

fn decode_fuel_status(payload: &[u8]) -> Result<TypedValue, DecodeError> {
    need(payload, 1)?;
    let mut names = Vec::new();
    for &byte in payload.iter().take(2) {
        if byte == 0 {
            continue;
        }
        if byte.count_ones() != 1 {
            return Err(DecodeError::Invalid("fuel status byte is not one-hot"));
        }
        let index = byte.trailing_zeros() as usize;
        match FUEL_STATUS_NAMES.get(index) {
            Some(name) => names.push(*name),
            None => return Err(DecodeError::Invalid("fuel status bit out of range")),
        }
    }
    if names.is_empty() {
        return Err(DecodeError::Invalid("no fuel system reported a status"));
    }
    Ok(TypedValue::EncodedString(names.join("; ")))
}

fn decode_voltage(payload: &[u8]) -> Result<TypedValue, DecodeError> {
    let text = printable_ascii(payload);
    let numeric = text.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let value: f64 = numeric
        .trim()
        .parse()
        .map_err(|_| DecodeError::Invalid("voltage reply is not numeric"))?;
    Ok(TypedValue::Measurement(MeasurementResult::new(
        value,
        Unit::Volt,
    )))
}

const OBD_COMPLIANCE: [&str; 34] = [
    "Undefined",
    "OBD-II as defined by the CARB",
    "OBD as defined by the EPA",
    "OBD and OBD-II",
    "OBD-I",
    "Not OBD compliant",
    "EOBD (Europe)",
    "EOBD and OBD-II",
    "EOBD and OBD",
    "EOBD, OBD and OBD II",
    "JOBD (Japan)",
    "JOBD and OBD II",
    "JOBD and EOBD",
    "JOBD, EOBD, and OBD II",
    "Reserved",
    "Reserved",
    "Reserved",
    "Engine Manufacturer Diagnostics (EMD)",
    "Engine Manufacturer Diagnostics Enhanced (EMD+)",
    "Heavy Duty On-Board Diagnostics (Child/Partial) (HD OBD-C)",
    "Heavy Duty On-Board Diagnostics (HD OBD)",
    "World Wide Harmonized OBD (WWH OBD)",
    "Reserved",
    "Heavy Duty Euro OBD Stage I without NOx control (HD EOBD-I)",
    "Heavy Duty Euro OBD Stage I with NOx control (HD EOBD-I N)",
    "Heavy Duty Euro OBD Stage II without NOx control (HD EOBD-II)",
    "Heavy Duty Euro OBD Stage II with NOx control (HD EOBD-II N)",
    "Reserved",
    "Brazil OBD Phase 1 (OBDBr-1)",
    "Brazil OBD Phase 2 (OBDBr-2)",
    "Korean OBD (KOBD)",
    "India OBD I (IOBD I)",
    "India OBD II (IOBD II)",
    "Heavy Duty Euro OBD Stage VI (HD EOBD-IV)",
];

const FUEL_TYPES: [&str; 24] = [
    "Not available",
    "Gasoline",
    "Methanol",
    "Ethanol",
    "Diesel",
    "LPG",
    "CNG",
    "Propane",
    "Electric",
    "Bifuel running Gasoline",
    "Bifuel running Methanol",
    "Bifuel running Ethanol",
    "Bifuel running LPG",
    "Bifuel running CNG",
    "Bifuel running Propane",
    "Bifuel running Electricity",
    "Bifuel running electric and combustion engine",
    "Hybrid gasoline",
    "Hybrid Ethanol",
    "Hybrid Diesel",
    "Hybrid Electric",
    "Hybrid running electric and combustion engine",
    "Hybrid Regenerative",
    "Bifuel running diesel",
];
