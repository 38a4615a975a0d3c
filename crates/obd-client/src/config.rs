//! Client configuration
//!
//! One immutable record passed into `connect`; nothing in the stack reads
//! settings from global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use elm327::{ObdProtocol, SessionConfig};
use obd_pids::UnitSystem;

/// Polling request distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PollStrategy {
    /// Concatenate every Mode 01 PID into compound requests
    #[default]
    Batched,
    /// One request per PID
    Sequential,
}

/// Continuous-update pacing and delivery knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Minimum time between batch starts
    pub interval: Duration,
    /// Derive the next interval from the last batch's elapsed time
    pub adaptive: bool,
    /// Multiplier applied to the elapsed time in adaptive mode
    pub safety_factor: f64,
    /// Adaptive interval lower bound
    pub floor: Duration,
    /// Adaptive interval upper bound
    pub cap: Duration,
    pub strategy: PollStrategy,
    /// Snapshot channel depth before the producer blocks
    pub channel_capacity: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            adaptive: false,
            safety_factor: 1.5,
            floor: Duration::from_millis(100),
            cap: Duration::from_secs(2),
            strategy: PollStrategy::Batched,
            channel_capacity: 16,
        }
    }
}

/// Everything `connect` needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Transport connect deadline
    pub connect_timeout: Duration,
    /// Skip auto-negotiation when the vehicle's protocol is known
    pub preferred_protocol: Option<ObdProtocol>,
    /// Session timing and retry policy
    pub session: SessionConfig,
    /// Metric or imperial values at the API boundary
    pub unit_system: UnitSystem,
    /// Accept sequence-less short legacy frames from software emulators
    pub emulator_mode: bool,
    /// Defaults for `continuous_updates`
    pub polling: PollingConfig,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            preferred_protocol: None,
            session: SessionConfig::default(),
            unit_system: UnitSystem::Metric,
            emulator_mode: false,
            polling: PollingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_safe() {
        let settings = ConnectionSettings::default();
        assert!(!settings.emulator_mode);
        assert_eq!(settings.polling.interval, Duration::from_millis(300));
        assert_eq!(settings.polling.strategy, PollStrategy::Batched);
        assert!(settings.preferred_protocol.is_none());
    }

    #[test]
    fn settings_round_trip_through_serde() {
        let settings = ConnectionSettings {
            preferred_protocol: Some(ObdProtocol::Can11Bit500K),
            emulator_mode: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: ConnectionSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.preferred_protocol, Some(ObdProtocol::Can11Bit500K));
        assert!(back.emulator_mode);
    }
}
