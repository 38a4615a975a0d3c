//! The OBD-II command catalogue
//!
//! Every command the library can issue, with its wire string, response
//! width, decoder and value range. Mode 01 is the bulk of the table; Modes
//! 03/04/06/09 and the adapter-level AT commands round it out. The table
//! is static and addressable by wire string or by (mode, PID).

use serde::{Deserialize, Serialize};

use crate::decode::DecoderId;
use crate::uas::id as uas_id;

/// OBD-II service (or adapter-level command family) a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    /// Adapter-level AT commands
    General,
    /// Live data
    Mode01,
    /// Stored trouble codes
    Mode03,
    /// Clear trouble codes
    Mode04,
    /// On-board monitoring tests
    Mode06,
    /// Vehicle identification
    Mode09,
    /// Adapter protocol queries
    Protocols,
}

/// Static metadata for one catalogued command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSpec {
    /// ASCII request string, CR appended on the wire
    pub wire: &'static str,
    pub description: &'static str,
    pub short_description: &'static str,
    /// Fixed value width in bytes; 0 for variable-length responses
    pub response_bytes: usize,
    pub decoder: DecoderId,
    /// Whether the value changes while driving (eligible for polling)
    pub live: bool,
    pub min: f64,
    pub max: f64,
}

impl CommandSpec {
    const fn new(
        wire: &'static str,
        description: &'static str,
        short_description: &'static str,
        response_bytes: usize,
        decoder: DecoderId,
        live: bool,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            wire,
            description,
            short_description,
            response_bytes,
            decoder,
            live,
            min,
            max,
        }
    }
}

/// Identifies one catalogued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandId {
    // -- adapter --
    ElmVersion,
    BatteryVoltage,
    DescribeProtocol,
    DescribeProtocolNumber,

    // -- Mode 01 --
    PidsSupported01,
    Status,
    FreezeDtc,
    FuelStatus,
    EngineLoad,
    CoolantTemp,
    ShortFuelTrimB1,
    LongFuelTrimB1,
    ShortFuelTrimB2,
    LongFuelTrimB2,
    FuelPressure,
    IntakePressure,
    Rpm,
    Speed,
    TimingAdvance,
    IntakeTemp,
    Maf,
    ThrottlePosition,
    AirStatus,
    O2Sensors,
    O2B1S1,
    O2B1S2,
    O2B1S3,
    O2B1S4,
    O2B2S1,
    O2B2S2,
    O2B2S3,
    O2B2S4,
    ObdCompliance,
    O2SensorsAlt,
    AuxInputStatus,
    RunTime,
    PidsSupported21,
    DistanceWithMil,
    FuelRailPressureVac,
    FuelRailPressureDirect,
    O2S1WrVoltage,
    O2S2WrVoltage,
    O2S3WrVoltage,
    O2S4WrVoltage,
    O2S5WrVoltage,
    O2S6WrVoltage,
    O2S7WrVoltage,
    O2S8WrVoltage,
    CommandedEgr,
    EgrError,
    EvaporativePurge,
    FuelLevel,
    WarmupsSinceDtcClear,
    DistanceSinceDtcClear,
    EvapVaporPressure,
    BarometricPressure,
    O2S1WrCurrent,
    O2S2WrCurrent,
    O2S3WrCurrent,
    O2S4WrCurrent,
    O2S5WrCurrent,
    O2S6WrCurrent,
    O2S7WrCurrent,
    O2S8WrCurrent,
    CatalystTempB1S1,
    CatalystTempB2S1,
    CatalystTempB1S2,
    CatalystTempB2S2,
    PidsSupported41,
    StatusDriveCycle,
    ControlModuleVoltage,
    AbsoluteLoad,
    CommandedEquivRatio,
    RelativeThrottle,
    AmbientAirTemp,
    ThrottleB,
    ThrottleC,
    AcceleratorD,
    AcceleratorE,
    AcceleratorF,
    ThrottleActuator,
    RunTimeMil,
    TimeSinceDtcClear,
    MaxValues,
    MaxMaf,
    FuelType,
    EthanolPercent,
    EvapVaporPressureAbs,
    EvapVaporPressureAlt,
    ShortO2TrimB1,
    LongO2TrimB1,
    ShortO2TrimB2,
    LongO2TrimB2,
    FuelRailPressureAbs,
    RelativeAcceleratorPos,
    HybridBatteryRemaining,
    OilTemp,
    FuelInjectTiming,
    FuelRate,

    // -- Mode 03 / 04 --
    ScanDtcs,
    ClearDtcs,

    // -- Mode 06 --
    MidsSupportedA,
    MonitorO2B1S1,
    MonitorO2B1S2,
    MonitorO2B1S3,
    MonitorO2B1S4,
    MonitorO2B2S1,
    MonitorO2B2S2,
    MonitorO2B2S3,
    MonitorO2B2S4,
    MidsSupportedB,
    MonitorCatalystB1,
    MonitorCatalystB2,
    MonitorEgrB1,
    MonitorEgrB2,

    // -- Mode 09 --
    PidsSupported09,
    VinMessageCount,
    Vin,
    CalibrationIdCount,
    CalibrationId,
    CvnCount,
    Cvn,
    EcuName,
}

impl CommandId {
    /// Static metadata for this command
    pub const fn spec(self) -> CommandSpec {
        use CommandId as C;
        use CommandSpec as S;
        use DecoderId as D;

        match self {
            C::ElmVersion => S::new("ATI", "Adapter identification banner", "ELM version", 0, D::EncodedString, false, 0.0, 0.0),
            C::BatteryVoltage => S::new("ATRV", "Adapter supply voltage", "Battery", 0, D::Voltage, true, 0.0, 25.0),
            C::DescribeProtocol => S::new("ATDP", "Describe active protocol", "Protocol", 0, D::EncodedString, false, 0.0, 0.0),
            C::DescribeProtocolNumber => S::new("ATDPN", "Active protocol number", "Protocol #", 0, D::EncodedString, false, 0.0, 0.0),

            C::PidsSupported01 => S::new("0100", "PIDs supported [01-20]", "Supported PIDs", 4, D::PidSupport, false, 0.0, 0.0),
            C::Status => S::new("0101", "Monitor status since DTCs cleared", "Status", 4, D::Status, false, 0.0, 0.0),
            C::FreezeDtc => S::new("0102", "DTC that caused the freeze frame", "Freeze DTC", 2, D::SingleDtc, false, 0.0, 0.0),
            C::FuelStatus => S::new("0103", "Fuel system status", "Fuel status", 2, D::FuelStatus, true, 0.0, 0.0),
            C::EngineLoad => S::new("0104", "Calculated engine load", "Engine load", 1, D::Percent, true, 0.0, 100.0),
            C::CoolantTemp => S::new("0105", "Engine coolant temperature", "Coolant", 1, D::TemperatureC, true, -40.0, 215.0),
            C::ShortFuelTrimB1 => S::new("0106", "Short term fuel trim, bank 1", "STFT B1", 1, D::PercentCentered, true, -100.0, 100.0),
            C::LongFuelTrimB1 => S::new("0107", "Long term fuel trim, bank 1", "LTFT B1", 1, D::PercentCentered, true, -100.0, 100.0),
            C::ShortFuelTrimB2 => S::new("0108", "Short term fuel trim, bank 2", "STFT B2", 1, D::PercentCentered, true, -100.0, 100.0),
            C::LongFuelTrimB2 => S::new("0109", "Long term fuel trim, bank 2", "LTFT B2", 1, D::PercentCentered, true, -100.0, 100.0),
            C::FuelPressure => S::new("010A", "Fuel pressure (gauge)", "Fuel pressure", 1, D::FuelPressure, true, 0.0, 765.0),
            C::IntakePressure => S::new("010B", "Intake manifold absolute pressure", "Intake pressure", 1, D::PressureKpa, true, 0.0, 255.0),
            C::Rpm => S::new("010C", "Engine speed", "RPM", 2, D::Rpm, true, 0.0, 16383.75),
            C::Speed => S::new("010D", "Vehicle speed", "Speed", 1, D::Speed, true, 0.0, 255.0),
            C::TimingAdvance => S::new("010E", "Timing advance before TDC", "Timing advance", 1, D::TimingAdvance, true, -64.0, 63.5),
            C::IntakeTemp => S::new("010F", "Intake air temperature", "Intake temp", 1, D::TemperatureC, true, -40.0, 215.0),
            C::Maf => S::new("0110", "Mass air flow rate", "MAF", 2, D::Maf, true, 0.0, 655.35),
            C::ThrottlePosition => S::new("0111", "Throttle position", "Throttle", 1, D::Percent, true, 0.0, 100.0),
            C::AirStatus => S::new("0112", "Commanded secondary air status", "Air status", 1, D::AirStatus, false, 0.0, 0.0),
            C::O2Sensors => S::new("0113", "Oxygen sensors present", "O2 sensors", 1, D::O2SensorsPresent, false, 0.0, 0.0),
            C::O2B1S1 => S::new("0114", "O2 sensor voltage, bank 1 sensor 1", "O2 B1S1", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B1S2 => S::new("0115", "O2 sensor voltage, bank 1 sensor 2", "O2 B1S2", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B1S3 => S::new("0116", "O2 sensor voltage, bank 1 sensor 3", "O2 B1S3", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B1S4 => S::new("0117", "O2 sensor voltage, bank 1 sensor 4", "O2 B1S4", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B2S1 => S::new("0118", "O2 sensor voltage, bank 2 sensor 1", "O2 B2S1", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B2S2 => S::new("0119", "O2 sensor voltage, bank 2 sensor 2", "O2 B2S2", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B2S3 => S::new("011A", "O2 sensor voltage, bank 2 sensor 3", "O2 B2S3", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::O2B2S4 => S::new("011B", "O2 sensor voltage, bank 2 sensor 4", "O2 B2S4", 2, D::SensorVoltage, true, 0.0, 1.275),
            C::ObdCompliance => S::new("011C", "OBD standards compliance", "OBD compliance", 1, D::ObdCompliance, false, 0.0, 0.0),
            C::O2SensorsAlt => S::new("011D", "Oxygen sensors present (4 banks)", "O2 sensors alt", 1, D::O2SensorsPresent, false, 0.0, 0.0),
            C::AuxInputStatus => S::new("011E", "Auxiliary input status (PTO)", "Aux input", 1, D::Drop, false, 0.0, 0.0),
            C::RunTime => S::new("011F", "Run time since engine start", "Run time", 2, D::Uas(uas_id::SECONDS), true, 0.0, 65535.0),
            C::PidsSupported21 => S::new("0120", "PIDs supported [21-40]", "Supported PIDs", 4, D::PidSupport, false, 0.0, 0.0),
            C::DistanceWithMil => S::new("0121", "Distance traveled with MIL on", "MIL distance", 2, D::Uas(uas_id::KILOMETER), true, 0.0, 65535.0),
            C::FuelRailPressureVac => S::new("0122", "Fuel rail pressure relative to vacuum", "Rail pressure (vac)", 2, D::Uas(uas_id::KPA_0_079), true, 0.0, 5177.27),
            C::FuelRailPressureDirect => S::new("0123", "Fuel rail gauge pressure (direct inject)", "Rail pressure", 2, D::Uas(uas_id::KPA_TEN), true, 0.0, 655350.0),
            C::O2S1WrVoltage => S::new("0124", "Wideband O2 sensor 1 voltage", "O2 S1 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S2WrVoltage => S::new("0125", "Wideband O2 sensor 2 voltage", "O2 S2 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S3WrVoltage => S::new("0126", "Wideband O2 sensor 3 voltage", "O2 S3 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S4WrVoltage => S::new("0127", "Wideband O2 sensor 4 voltage", "O2 S4 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S5WrVoltage => S::new("0128", "Wideband O2 sensor 5 voltage", "O2 S5 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S6WrVoltage => S::new("0129", "Wideband O2 sensor 6 voltage", "O2 S6 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S7WrVoltage => S::new("012A", "Wideband O2 sensor 7 voltage", "O2 S7 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::O2S8WrVoltage => S::new("012B", "Wideband O2 sensor 8 voltage", "O2 S8 WR", 4, D::SensorVoltageWide, true, 0.0, 8.0),
            C::CommandedEgr => S::new("012C", "Commanded EGR", "EGR", 1, D::Percent, true, 0.0, 100.0),
            C::EgrError => S::new("012D", "EGR error", "EGR error", 1, D::PercentCentered, true, -100.0, 100.0),
            C::EvaporativePurge => S::new("012E", "Commanded evaporative purge", "Evap purge", 1, D::Percent, true, 0.0, 100.0),
            C::FuelLevel => S::new("012F", "Fuel tank level input", "Fuel level", 1, D::Percent, true, 0.0, 100.0),
            C::WarmupsSinceDtcClear => S::new("0130", "Warm-ups since codes cleared", "Warm-ups", 1, D::Uas(uas_id::COUNT), false, 0.0, 255.0),
            C::DistanceSinceDtcClear => S::new("0131", "Distance traveled since codes cleared", "Distance cleared", 2, D::Uas(uas_id::KILOMETER), true, 0.0, 65535.0),
            C::EvapVaporPressure => S::new("0132", "Evap system vapor pressure", "Evap pressure", 2, D::EvapPressure, true, -8192.0, 8191.75),
            C::BarometricPressure => S::new("0133", "Absolute barometric pressure", "Barometer", 1, D::PressureKpa, true, 0.0, 255.0),
            C::O2S1WrCurrent => S::new("0134", "Wideband O2 sensor 1 current", "O2 S1 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S2WrCurrent => S::new("0135", "Wideband O2 sensor 2 current", "O2 S2 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S3WrCurrent => S::new("0136", "Wideband O2 sensor 3 current", "O2 S3 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S4WrCurrent => S::new("0137", "Wideband O2 sensor 4 current", "O2 S4 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S5WrCurrent => S::new("0138", "Wideband O2 sensor 5 current", "O2 S5 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S6WrCurrent => S::new("0139", "Wideband O2 sensor 6 current", "O2 S6 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S7WrCurrent => S::new("013A", "Wideband O2 sensor 7 current", "O2 S7 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::O2S8WrCurrent => S::new("013B", "Wideband O2 sensor 8 current", "O2 S8 mA", 4, D::CurrentCentered, true, -128.0, 128.0),
            C::CatalystTempB1S1 => S::new("013C", "Catalyst temperature, bank 1 sensor 1", "Cat B1S1", 2, D::Uas(uas_id::DECICELSIUS), true, -40.0, 6513.5),
            C::CatalystTempB2S1 => S::new("013D", "Catalyst temperature, bank 2 sensor 1", "Cat B2S1", 2, D::Uas(uas_id::DECICELSIUS), true, -40.0, 6513.5),
            C::CatalystTempB1S2 => S::new("013E", "Catalyst temperature, bank 1 sensor 2", "Cat B1S2", 2, D::Uas(uas_id::DECICELSIUS), true, -40.0, 6513.5),
            C::CatalystTempB2S2 => S::new("013F", "Catalyst temperature, bank 2 sensor 2", "Cat B2S2", 2, D::Uas(uas_id::DECICELSIUS), true, -40.0, 6513.5),
            C::PidsSupported41 => S::new("0140", "PIDs supported [41-60]", "Supported PIDs", 4, D::PidSupport, false, 0.0, 0.0),
            C::StatusDriveCycle => S::new("0141", "Monitor status this drive cycle", "Drive cycle status", 4, D::Status, false, 0.0, 0.0),
            C::ControlModuleVoltage => S::new("0142", "Control module voltage", "Module voltage", 2, D::Uas(uas_id::MILLIVOLT), true, 0.0, 65.535),
            C::AbsoluteLoad => S::new("0143", "Absolute load value", "Absolute load", 2, D::Uas(uas_id::PERCENT_OF_255), true, 0.0, 25700.0),
            C::CommandedEquivRatio => S::new("0144", "Commanded air-fuel equivalence ratio", "Lambda", 2, D::Uas(uas_id::RATIO_32768), true, 0.0, 2.0),
            C::RelativeThrottle => S::new("0145", "Relative throttle position", "Rel throttle", 1, D::Percent, true, 0.0, 100.0),
            C::AmbientAirTemp => S::new("0146", "Ambient air temperature", "Ambient temp", 1, D::TemperatureC, true, -40.0, 215.0),
            C::ThrottleB => S::new("0147", "Absolute throttle position B", "Throttle B", 1, D::Percent, true, 0.0, 100.0),
            C::ThrottleC => S::new("0148", "Absolute throttle position C", "Throttle C", 1, D::Percent, true, 0.0, 100.0),
            C::AcceleratorD => S::new("0149", "Accelerator pedal position D", "Pedal D", 1, D::Percent, true, 0.0, 100.0),
            C::AcceleratorE => S::new("014A", "Accelerator pedal position E", "Pedal E", 1, D::Percent, true, 0.0, 100.0),
            C::AcceleratorF => S::new("014B", "Accelerator pedal position F", "Pedal F", 1, D::Percent, true, 0.0, 100.0),
            C::ThrottleActuator => S::new("014C", "Commanded throttle actuator", "Throttle actuator", 1, D::Percent, true, 0.0, 100.0),
            C::RunTimeMil => S::new("014D", "Time run with MIL on", "MIL time", 2, D::Uas(uas_id::MINUTES), true, 0.0, 65535.0),
            C::TimeSinceDtcClear => S::new("014E", "Time since trouble codes cleared", "Time cleared", 2, D::Uas(uas_id::MINUTES), true, 0.0, 65535.0),
            C::MaxValues => S::new("014F", "Maximum sensor values", "Max values", 4, D::Drop, false, 0.0, 0.0),
            C::MaxMaf => S::new("0150", "Maximum mass air flow rate", "Max MAF", 4, D::MaxMaf, false, 0.0, 2550.0),
            C::FuelType => S::new("0151", "Fuel type", "Fuel type", 1, D::FuelType, false, 0.0, 0.0),
            C::EthanolPercent => S::new("0152", "Ethanol fuel percentage", "Ethanol", 1, D::Percent, true, 0.0, 100.0),
            C::EvapVaporPressureAbs => S::new("0153", "Absolute evap system vapor pressure", "Evap abs", 2, D::EvapPressureAlt, true, 0.0, 65.535),
            C::EvapVaporPressureAlt => S::new("0154", "Evap system vapor pressure (wide)", "Evap wide", 2, D::EvapPressure, true, -8192.0, 8191.75),
            C::ShortO2TrimB1 => S::new("0155", "Short term secondary O2 trim, bank 1", "S-O2 STFT B1", 2, D::PercentCentered, true, -100.0, 100.0),
            C::LongO2TrimB1 => S::new("0156", "Long term secondary O2 trim, bank 1", "S-O2 LTFT B1", 2, D::PercentCentered, true, -100.0, 100.0),
            C::ShortO2TrimB2 => S::new("0157", "Short term secondary O2 trim, bank 2", "S-O2 STFT B2", 2, D::PercentCentered, true, -100.0, 100.0),
            C::LongO2TrimB2 => S::new("0158", "Long term secondary O2 trim, bank 2", "S-O2 LTFT B2", 2, D::PercentCentered, true, -100.0, 100.0),
            C::FuelRailPressureAbs => S::new("0159", "Fuel rail absolute pressure", "Rail abs", 2, D::Uas(uas_id::KPA_TEN), true, 0.0, 655350.0),
            C::RelativeAcceleratorPos => S::new("015A", "Relative accelerator pedal position", "Rel pedal", 1, D::Percent, true, 0.0, 100.0),
            C::HybridBatteryRemaining => S::new("015B", "Hybrid battery pack remaining life", "Hybrid battery", 1, D::Percent, true, 0.0, 100.0),
            C::OilTemp => S::new("015C", "Engine oil temperature", "Oil temp", 1, D::TemperatureC, true, -40.0, 215.0),
            C::FuelInjectTiming => S::new("015D", "Fuel injection timing", "Inject timing", 2, D::Uas(uas_id::INJECTION_TIMING), true, -210.0, 302.0),
            C::FuelRate => S::new("015E", "Engine fuel rate", "Fuel rate", 2, D::Uas(uas_id::LITERS_PER_HOUR), true, 0.0, 3276.75),

            C::ScanDtcs => S::new("03", "Read stored trouble codes", "Scan DTCs", 0, D::DtcList, false, 0.0, 0.0),
            C::ClearDtcs => S::new("04", "Clear trouble codes and reset monitors", "Clear DTCs", 0, D::Drop, false, 0.0, 0.0),

            C::MidsSupportedA => S::new("0600", "Monitor IDs supported [01-20]", "Supported MIDs", 4, D::PidSupport, false, 0.0, 0.0),
            C::MonitorO2B1S1 => S::new("0601", "O2 sensor monitor, bank 1 sensor 1", "O2 mon B1S1", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B1S2 => S::new("0602", "O2 sensor monitor, bank 1 sensor 2", "O2 mon B1S2", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B1S3 => S::new("0603", "O2 sensor monitor, bank 1 sensor 3", "O2 mon B1S3", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B1S4 => S::new("0604", "O2 sensor monitor, bank 1 sensor 4", "O2 mon B1S4", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B2S1 => S::new("0605", "O2 sensor monitor, bank 2 sensor 1", "O2 mon B2S1", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B2S2 => S::new("0606", "O2 sensor monitor, bank 2 sensor 2", "O2 mon B2S2", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B2S3 => S::new("0607", "O2 sensor monitor, bank 2 sensor 3", "O2 mon B2S3", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorO2B2S4 => S::new("0608", "O2 sensor monitor, bank 2 sensor 4", "O2 mon B2S4", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MidsSupportedB => S::new("0620", "Monitor IDs supported [21-40]", "Supported MIDs", 4, D::PidSupport, false, 0.0, 0.0),
            C::MonitorCatalystB1 => S::new("0621", "Catalyst monitor, bank 1", "Cat mon B1", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorCatalystB2 => S::new("0622", "Catalyst monitor, bank 2", "Cat mon B2", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorEgrB1 => S::new("0631", "EGR monitor, bank 1", "EGR mon B1", 0, D::MonitorTest, false, 0.0, 0.0),
            C::MonitorEgrB2 => S::new("0632", "EGR monitor, bank 2", "EGR mon B2", 0, D::MonitorTest, false, 0.0, 0.0),

            C::PidsSupported09 => S::new("0900", "Mode 09 PIDs supported [01-20]", "Supported PIDs", 4, D::PidSupport, false, 0.0, 0.0),
            C::VinMessageCount => S::new("0901", "VIN message count", "VIN count", 1, D::Count, false, 0.0, 255.0),
            C::Vin => S::new("0902", "Vehicle identification number", "VIN", 17, D::EncodedString, false, 0.0, 0.0),
            C::CalibrationIdCount => S::new("0903", "Calibration ID message count", "CALID count", 1, D::Count, false, 0.0, 255.0),
            C::CalibrationId => S::new("0904", "Calibration identification", "CALID", 16, D::EncodedString, false, 0.0, 0.0),
            C::CvnCount => S::new("0905", "CVN message count", "CVN count", 1, D::Count, false, 0.0, 255.0),
            C::Cvn => S::new("0906", "Calibration verification numbers", "CVN", 4, D::Cvn, false, 0.0, 0.0),
            C::EcuName => S::new("090A", "ECU name", "ECU name", 20, D::EncodedString, false, 0.0, 0.0),
        }
    }

    /// Which service (or adapter family) the command belongs to
    pub fn service(self) -> Service {
        let wire = self.spec().wire;
        if wire.starts_with("ATDP") {
            return Service::Protocols;
        }
        if wire.starts_with("AT") {
            return Service::General;
        }
        match &wire[..2] {
            "01" => Service::Mode01,
            "03" => Service::Mode03,
            "04" => Service::Mode04,
            "06" => Service::Mode06,
            "09" => Service::Mode09,
            _ => Service::General,
        }
    }

    /// `(mode, pid)` for OBD commands that carry a PID byte
    pub fn mode_pid(self) -> Option<(u8, u8)> {
        let wire = self.spec().wire;
        if wire.len() != 4 || wire.starts_with("AT") {
            return None;
        }
        let mode = u8::from_str_radix(&wire[..2], 16).ok()?;
        let pid = u8::from_str_radix(&wire[2..], 16).ok()?;
        Some((mode, pid))
    }

    /// The Mode 01 PID byte, for polling-batch assembly
    pub fn mode01_pid(self) -> Option<u8> {
        match self.mode_pid() {
            Some((0x01, pid)) => Some(pid),
            _ => None,
        }
    }

    /// Whether this command reads a supported-PID bitmap
    pub fn is_pid_getter(self) -> bool {
        matches!(self.spec().decoder, DecoderId::PidSupport)
    }

    /// Look a command up by its wire string, case-insensitive
    pub fn from_wire(wire: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.spec().wire.eq_ignore_ascii_case(wire))
    }

    /// Look a command up by mode and PID
    pub fn from_mode_pid(mode: u8, pid: u8) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.mode_pid() == Some((mode, pid)))
    }

    /// Every catalogued command
    pub fn all() -> &'static [CommandId] {
        ALL_COMMANDS
    }

    /// The bitmap getters, in discovery order
    pub fn pid_getters() -> impl Iterator<Item = CommandId> {
        Self::all().iter().copied().filter(|c| c.is_pid_getter())
    }
}

static ALL_COMMANDS: &[CommandId] = &[
    CommandId::ElmVersion,
    CommandId::BatteryVoltage,
    CommandId::DescribeProtocol,
    CommandId::DescribeProtocolNumber,
    CommandId::PidsSupported01,
    CommandId::Status,
    CommandId::FreezeDtc,
    CommandId::FuelStatus,
    CommandId::EngineLoad,
    CommandId::CoolantTemp,
    CommandId::ShortFuelTrimB1,
    CommandId::LongFuelTrimB1,
    CommandId::ShortFuelTrimB2,
    CommandId::LongFuelTrimB2,
    CommandId::FuelPressure,
    CommandId::IntakePressure,
    CommandId::Rpm,
    CommandId::Speed,
    CommandId::TimingAdvance,
    CommandId::IntakeTemp,
    CommandId::Maf,
    CommandId::ThrottlePosition,
    CommandId::AirStatus,
    CommandId::O2Sensors,
    CommandId::O2B1S1,
    CommandId::O2B1S2,
    CommandId::O2B1S3,
    CommandId::O2B1S4,
    CommandId::O2B2S1,
    CommandId::O2B2S2,
    CommandId::O2B2S3,
    CommandId::O2B2S4,
    CommandId::ObdCompliance,
    CommandId::O2SensorsAlt,
    CommandId::AuxInputStatus,
    CommandId::RunTime,
    CommandId::PidsSupported21,
    CommandId::DistanceWithMil,
    CommandId::FuelRailPressureVac,
    CommandId::FuelRailPressureDirect,
    CommandId::O2S1WrVoltage,
    CommandId::O2S2WrVoltage,
    CommandId::O2S3WrVoltage,
    CommandId::O2S4WrVoltage,
    CommandId::O2S5WrVoltage,
    CommandId::O2S6WrVoltage,
    CommandId::O2S7WrVoltage,
    CommandId::O2S8WrVoltage,
    CommandId::CommandedEgr,
    CommandId::EgrError,
    CommandId::EvaporativePurge,
    CommandId::FuelLevel,
    CommandId::WarmupsSinceDtcClear,
    CommandId::DistanceSinceDtcClear,
    CommandId::EvapVaporPressure,
    CommandId::BarometricPressure,
    CommandId::O2S1WrCurrent,
    CommandId::O2S2WrCurrent,
    CommandId::O2S3WrCurrent,
    CommandId::O2S4WrCurrent,
    CommandId::O2S5WrCurrent,
    CommandId::O2S6WrCurrent,
    CommandId::O2S7WrCurrent,
    CommandId::O2S8WrCurrent,
    CommandId::CatalystTempB1S1,
    CommandId::CatalystTempB2S1,
    CommandId::CatalystTempB1S2,
    CommandId::CatalystTempB2S2,
    CommandId::PidsSupported41,
    CommandId::StatusDriveCycle,
    CommandId::ControlModuleVoltage,
    CommandId::AbsoluteLoad,
    CommandId::CommandedEquivRatio,
    CommandId::RelativeThrottle,
    CommandId::AmbientAirTemp,
    CommandId::ThrottleB,
    CommandId::ThrottleC,
    CommandId::AcceleratorD,
    CommandId::AcceleratorE,
    CommandId::AcceleratorF,
    CommandId::ThrottleActuator,
    CommandId::RunTimeMil,
    CommandId::TimeSinceDtcClear,
    CommandId::MaxValues,
    CommandId::MaxMaf,
    CommandId::FuelType,
    CommandId::EthanolPercent,
    CommandId::EvapVaporPressureAbs,
    CommandId::EvapVaporPressureAlt,
    CommandId::ShortO2TrimB1,
    CommandId::LongO2TrimB1,
    CommandId::ShortO2TrimB2,
    CommandId::LongO2TrimB2,
    CommandId::FuelRailPressureAbs,
    CommandId::RelativeAcceleratorPos,
    CommandId::HybridBatteryRemaining,
    CommandId::OilTemp,
    CommandId::FuelInjectTiming,
    CommandId::FuelRate,
    CommandId::ScanDtcs,
    CommandId::ClearDtcs,
    CommandId::MidsSupportedA,
    CommandId::MonitorO2B1S1,
    CommandId::MonitorO2B1S2,
    CommandId::MonitorO2B1S3,
    CommandId::MonitorO2B1S4,
    CommandId::MonitorO2B2S1,
    CommandId::MonitorO2B2S2,
    CommandId::MonitorO2B2S3,
    CommandId::MonitorO2B2S4,
    CommandId::MidsSupportedB,
    CommandId::MonitorCatalystB1,
    CommandId::MonitorCatalystB2,
    CommandId::MonitorEgrB1,
    CommandId::MonitorEgrB2,
    CommandId::PidsSupported09,
    CommandId::VinMessageCount,
    CommandId::Vin,
    CommandId::CalibrationIdCount,
    CommandId::CalibrationId,
    CommandId::CvnCount,
    CommandId::Cvn,
    CommandId::EcuName,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn wire_strings_are_unique() {
        let mut seen = HashSet::new();
        for command in CommandId::all() {
            assert!(
                seen.insert(command.spec().wire),
                "duplicate wire string {}",
                command.spec().wire
            );
        }
    }

    #[test]
    fn wire_lookup_round_trips() {
        for &command in CommandId::all() {
            assert_eq!(CommandId::from_wire(command.spec().wire), Some(command));
        }
        assert_eq!(CommandId::from_wire("010c"), Some(CommandId::Rpm));
        assert!(CommandId::from_wire("01FF").is_none());
    }

    #[test]
    fn mode01_pids_parse_from_wire() {
        assert_eq!(CommandId::Rpm.mode01_pid(), Some(0x0C));
        assert_eq!(CommandId::Speed.mode01_pid(), Some(0x0D));
        assert_eq!(CommandId::ScanDtcs.mode01_pid(), None);
        assert_eq!(CommandId::Vin.mode01_pid(), None);
    }

    #[test]
    fn services_match_wire_prefixes() {
        assert_eq!(CommandId::Rpm.service(), Service::Mode01);
        assert_eq!(CommandId::ScanDtcs.service(), Service::Mode03);
        assert_eq!(CommandId::ClearDtcs.service(), Service::Mode04);
        assert_eq!(CommandId::MonitorCatalystB1.service(), Service::Mode06);
        assert_eq!(CommandId::Vin.service(), Service::Mode09);
        assert_eq!(CommandId::ElmVersion.service(), Service::General);
        assert_eq!(CommandId::DescribeProtocolNumber.service(), Service::Protocols);
    }

    #[test]
    fn getters_cover_every_catalogued_mode() {
        let getters: Vec<_> = CommandId::pid_getters().collect();
        assert!(getters.contains(&CommandId::PidsSupported01));
        assert!(getters.contains(&CommandId::PidsSupported21));
        assert!(getters.contains(&CommandId::PidsSupported41));
        assert!(getters.contains(&CommandId::MidsSupportedA));
        assert!(getters.contains(&CommandId::PidsSupported09));
    }

    #[test]
    fn every_mode01_pid_maps_back_to_its_command() {
        // a supported PID's bit position round-trips through its getter
        for &command in CommandId::all() {
            if let Some((mode, pid)) = command.mode_pid() {
                assert_eq!(CommandId::from_mode_pid(mode, pid), Some(command));
            }
        }
    }

    #[test]
    fn live_commands_declare_finite_ranges() {
        for &command in CommandId::all() {
            let spec = command.spec();
            assert!(spec.min.is_finite() && spec.max.is_finite());
            assert!(spec.min <= spec.max, "{} range inverted", spec.wire);
        }
    }

    #[test]
    fn batched_mode01_widths_are_fixed() {
        // the bytes a batch peels per PID equal the declared width
        for &command in CommandId::all() {
            if command.mode01_pid().is_some() && command.spec().live {
                assert!(command.spec().response_bytes > 0, "{}", command.spec().wire);
            }
        }
    }
}
