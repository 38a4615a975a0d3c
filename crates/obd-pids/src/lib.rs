//! OBD-II command catalogue and payload decoders
//!
//! The catalogue maps every supported command to its wire string, response
//! width, decoder and value range; the decoders are pure functions from
//! response payload bytes to typed values with physical units. Nothing in
//! this crate performs I/O.

mod command;
mod error;
mod uas;
mod units;
mod value;

pub mod decode;

pub use command::{CommandId, CommandSpec, Service};
pub use decode::DecoderId;
pub use error::DecodeError;
pub use uas::{lookup as uas_lookup, UasEntry};
pub use units::{convert, Unit, UnitSystem};
pub use value::{
    IgnitionType, MeasurementResult, MonitorStatus, MonitorTest, Status, TroubleCode, TypedValue,
};

impl CommandId {
    /// Decode a response payload for this command.
    ///
    /// Measurements are validated against the command's declared range
    /// before the unit conversion, so a sensor glitch surfaces as a decode
    /// error instead of an impossible reading.
    pub fn decode(self, payload: &[u8], units: UnitSystem) -> Result<TypedValue, DecodeError> {
        let spec = self.spec();
        let value = decode::decode_metric(spec.decoder, payload)?;

        if let TypedValue::Measurement(m) = &value {
            if spec.min < spec.max && (m.value < spec.min || m.value > spec.max) {
                return Err(DecodeError::OutOfRange {
                    value: m.value,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }

        Ok(match value {
            TypedValue::Measurement(m) => {
                let (value, unit) = convert(m.value, m.unit, units);
                TypedValue::Measurement(MeasurementResult::new(value, unit))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_decode_applies_range_and_units() {
        let value = CommandId::Speed
            .decode(&[0x32], UnitSystem::Metric)
            .unwrap()
            .as_measurement()
            .unwrap();
        assert_eq!(value.value, 50.0);
        assert_eq!(value.unit, Unit::Kmh);

        let imperial = CommandId::Speed
            .decode(&[0x32], UnitSystem::Imperial)
            .unwrap()
            .as_measurement()
            .unwrap();
        assert_eq!(imperial.unit, Unit::Mph);
    }

    #[test]
    fn command_decode_rejects_out_of_range() {
        // a 99 V battery reading is a glitch, not a measurement
        let err = CommandId::BatteryVoltage
            .decode(b"99.9V", UnitSystem::Metric)
            .unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange { .. }));

        // the fixed-width encodings span exactly their declared ranges
        let max = CommandId::CoolantTemp
            .decode(&[0xFF], UnitSystem::Metric)
            .unwrap()
            .as_measurement()
            .unwrap();
        assert_eq!(max.value, 215.0);
    }

    #[test]
    fn every_fixed_width_command_is_total() {
        // any payload of the declared width decodes or errors, never panics
        for &command in CommandId::all() {
            let width = command.spec().response_bytes;
            if width == 0 || width > 4 {
                continue;
            }
            for fill in [0x00u8, 0x55, 0xAA, 0xFF] {
                let payload = vec![fill; width];
                match command.decode(&payload, UnitSystem::Metric) {
                    Ok(TypedValue::Measurement(m)) => {
                        assert!(m.value.is_finite(), "{}", command.spec().wire)
                    }
                    Ok(_) | Err(_) => {}
                }
            }
        }
    }
}
