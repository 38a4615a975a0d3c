//! SAE J1979 unit-and-scaling entries
//!
//! Many responses share the same `scale * raw + offset` shape and differ
//! only in the scaling entry. The catalogue references entries by id; Mode
//! 06 test records carry the id on the wire.

use crate::units::Unit;

/// One scaling entry: `value = scale * raw + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UasEntry {
    /// Interpret the raw field as two's complement
    pub signed: bool,
    pub scale: f64,
    pub offset: f64,
    pub unit: Unit,
}

impl UasEntry {
    /// Apply the entry to a big-endian raw field
    pub fn apply(&self, raw: u32, width: usize) -> f64 {
        let raw = if self.signed {
            match width {
                1 => raw as u8 as i8 as f64,
                2 => raw as u16 as i16 as f64,
                _ => raw as i32 as f64,
            }
        } else {
            raw as f64
        };
        self.scale * raw + self.offset
    }
}

/// Entry ids used by the command catalogue
pub mod id {
    pub const COUNT: u8 = 0x01;
    pub const MILLIVOLT: u8 = 0x0B;
    pub const SECONDS: u8 = 0x12;
    pub const MINUTES: u8 = 0x13;
    pub const DECICELSIUS: u8 = 0x16;
    pub const KPA_0_079: u8 = 0x1B;
    pub const KPA_TEN: u8 = 0x1E;
    pub const KILOMETER: u8 = 0x25;
    pub const RATIO_32768: u8 = 0x2F;
    pub const PERCENT_OF_255: u8 = 0x32;
    pub const INJECTION_TIMING: u8 = 0x34;
    pub const LITERS_PER_HOUR: u8 = 0x35;
}

/// Look up a scaling entry; `None` for ids this catalogue does not carry
pub fn lookup(uas_id: u8) -> Option<UasEntry> {
    let entry = |signed, scale, offset, unit| UasEntry {
        signed,
        scale,
        offset,
        unit,
    };
    Some(match uas_id {
        id::COUNT => entry(false, 1.0, 0.0, Unit::Count),
        id::MILLIVOLT => entry(false, 0.001, 0.0, Unit::Volt),
        id::SECONDS => entry(false, 1.0, 0.0, Unit::Second),
        id::MINUTES => entry(false, 1.0, 0.0, Unit::Minute),
        id::DECICELSIUS => entry(false, 0.1, -40.0, Unit::Celsius),
        id::KPA_0_079 => entry(false, 0.079, 0.0, Unit::Kilopascal),
        id::KPA_TEN => entry(false, 10.0, 0.0, Unit::Kilopascal),
        id::KILOMETER => entry(false, 1.0, 0.0, Unit::Kilometer),
        id::RATIO_32768 => entry(false, 1.0 / 32768.0, 0.0, Unit::Ratio),
        id::PERCENT_OF_255 => entry(false, 100.0 / 255.0, 0.0, Unit::Percent),
        id::INJECTION_TIMING => entry(false, 1.0 / 128.0, -210.0, Unit::Degree),
        id::LITERS_PER_HOUR => entry(false, 0.05, 0.0, Unit::LiterPerHour),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalyst_temperature_scaling() {
        let entry = lookup(id::DECICELSIUS).unwrap();
        // 0x0F 0xA0 = 4000 -> 400.0 - 40.0
        assert!((entry.apply(4000, 2) - 360.0).abs() < 1e-9);
        assert_eq!(entry.unit, Unit::Celsius);
    }

    #[test]
    fn equivalence_ratio_scaling() {
        let entry = lookup(id::RATIO_32768).unwrap();
        assert!((entry.apply(32768, 2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(lookup(0xEE).is_none());
    }
}
