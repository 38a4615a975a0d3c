//! Physical units and the metric/imperial boundary conversion

use serde::{Deserialize, Serialize};

/// Unit preference applied at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

/// Physical unit carried by a decoded measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    None,
    Percent,
    Celsius,
    Fahrenheit,
    Kelvin,
    Kilopascal,
    Pascal,
    Psi,
    Rpm,
    Kmh,
    Mph,
    GramsPerSec,
    Volt,
    Milliampere,
    Degree,
    Second,
    Minute,
    Kilometer,
    Mile,
    LiterPerHour,
    Ratio,
    Count,
}

impl Unit {
    /// Display symbol, empty for dimensionless values
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::None | Unit::Count => "",
            Unit::Percent => "%",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::Kelvin => "K",
            Unit::Kilopascal => "kPa",
            Unit::Pascal => "Pa",
            Unit::Psi => "psi",
            Unit::Rpm => "rpm",
            Unit::Kmh => "km/h",
            Unit::Mph => "mph",
            Unit::GramsPerSec => "g/s",
            Unit::Volt => "V",
            Unit::Milliampere => "mA",
            Unit::Degree => "°",
            Unit::Second => "s",
            Unit::Minute => "min",
            Unit::Kilometer => "km",
            Unit::Mile => "mi",
            Unit::LiterPerHour => "L/h",
            Unit::Ratio => "",
        }
    }
}

/// Convert a metric measurement into the requested unit system.
///
/// Decoders always produce metric; the imperial table applies only to the
/// units that have a customary counterpart, everything else passes through.
pub fn convert(value: f64, unit: Unit, system: UnitSystem) -> (f64, Unit) {
    if system == UnitSystem::Metric {
        return (value, unit);
    }
    match unit {
        Unit::Celsius => (value * 9.0 / 5.0 + 32.0, Unit::Fahrenheit),
        Unit::Kmh => (value * 0.621_371, Unit::Mph),
        Unit::Kilometer => (value * 0.621_371, Unit::Mile),
        Unit::Kilopascal => (value * 0.145_038, Unit::Psi),
        other => (value, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_passthrough() {
        assert_eq!(
            convert(100.0, Unit::Kmh, UnitSystem::Metric),
            (100.0, Unit::Kmh)
        );
    }

    #[test]
    fn celsius_to_fahrenheit() {
        let (value, unit) = convert(0.0, Unit::Celsius, UnitSystem::Imperial);
        assert_eq!(unit, Unit::Fahrenheit);
        assert!((value - 32.0).abs() < 1e-9);
    }

    #[test]
    fn speed_to_mph() {
        let (value, unit) = convert(100.0, Unit::Kmh, UnitSystem::Imperial);
        assert_eq!(unit, Unit::Mph);
        assert!((value - 62.1371).abs() < 1e-3);
    }

    #[test]
    fn dimensionless_units_never_convert() {
        let (value, unit) = convert(42.0, Unit::Percent, UnitSystem::Imperial);
        assert_eq!((value, unit), (42.0, Unit::Percent));
    }
}
