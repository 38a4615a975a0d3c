//! BLE transport for Bluetooth Low Energy OBD-II adapters
//!
//! BLE adapters expose the ELM327 byte stream over a GATT "serial"
//! service. The service/characteristic assignment is not standardized;
//! this module knows the three profiles seen in the field and falls back
//! to scanning for any characteristic pair that offers `write` plus
//! (`notify` or `read`). Some adapters (Veepeak) put both roles on a
//! single characteristic, which is an allowed profile.

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::{Transport, TransportError};

/// Expand a 16-bit Bluetooth SIG id to a full 128-bit UUID
const fn uuid16(short: u32) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_00805F9B34FB | ((short as u128) << 96))
}

/// GATT layout of one adapter family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BleDeviceProfile {
    pub service: Uuid,
    /// Characteristic commands are written to
    pub write_char: Uuid,
    /// Characteristic responses arrive on; may equal `write_char`
    pub notify_char: Uuid,
}

/// Profiles observed across adapter vendors, tried in order
pub const KNOWN_PROFILES: &[BleDeviceProfile] = &[
    // Veepeak class: one characteristic carries both roles
    BleDeviceProfile {
        service: uuid16(0xFFE0),
        write_char: uuid16(0xFFE1),
        notify_char: uuid16(0xFFE1),
    },
    // OBDLink CX class
    BleDeviceProfile {
        service: uuid16(0xFFF0),
        write_char: uuid16(0xFFF2),
        notify_char: uuid16(0xFFF1),
    },
    // VGate class
    BleDeviceProfile {
        service: uuid16(0x18F0),
        write_char: uuid16(0x2AF1),
        notify_char: uuid16(0x2AF0),
    },
];

/// BLE transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleTransportConfig {
    /// Only consider peripherals whose advertised name contains this
    pub name_filter: Option<String>,
    /// How long to scan before giving up on discovery
    pub scan_timeout: Duration,
}

impl Default for BleTransportConfig {
    fn default() -> Self {
        Self {
            name_filter: None,
            scan_timeout: Duration::from_secs(10),
        }
    }
}

type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// BLE implementation of [`Transport`]
pub struct BleTransport {
    config: BleTransportConfig,
    peripheral: Option<Peripheral>,
    write_char: Option<Characteristic>,
    write_type: WriteType,
    notifications: Option<NotificationStream>,
    pending: VecDeque<u8>,
}

impl BleTransport {
    pub fn new(config: BleTransportConfig) -> Self {
        Self {
            config,
            peripheral: None,
            write_char: None,
            write_type: WriteType::WithResponse,
            notifications: None,
            pending: VecDeque::new(),
        }
    }

    fn name_matches(&self, name: Option<&str>) -> bool {
        match (&self.config.name_filter, name) {
            (Some(filter), Some(name)) => name
                .to_ascii_lowercase()
                .contains(&filter.to_ascii_lowercase()),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Pick the write/notify characteristic pair on a connected peripheral.
    ///
    /// Known profiles win; otherwise any characteristic advertising `write`
    /// combined with `notify` or `read` is accepted, including a single
    /// characteristic carrying both roles.
    fn select_characteristics(
        peripheral: &Peripheral,
    ) -> Result<(Characteristic, Characteristic), TransportError> {
        let characteristics = peripheral.characteristics();

        for profile in KNOWN_PROFILES {
            let write = characteristics
                .iter()
                .find(|c| c.uuid == profile.write_char && c.service_uuid == profile.service);
            let notify = characteristics
                .iter()
                .find(|c| c.uuid == profile.notify_char && c.service_uuid == profile.service);
            if let (Some(write), Some(notify)) = (write, notify) {
                debug!(service = %profile.service, "matched known BLE profile");
                return Ok((write.clone(), notify.clone()));
            }
        }

        // fallback: any write + (notify | read) pair, same characteristic allowed
        let writable = characteristics.iter().filter(|c| {
            c.properties
                .intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE)
        });
        for write in writable {
            if write
                .properties
                .intersects(CharPropFlags::NOTIFY | CharPropFlags::READ)
            {
                debug!(char = %write.uuid, "using combined write/notify characteristic");
                return Ok((write.clone(), write.clone()));
            }
            if let Some(notify) = characteristics.iter().find(|c| {
                c.service_uuid == write.service_uuid
                    && c.uuid != write.uuid
                    && c.properties
                        .intersects(CharPropFlags::NOTIFY | CharPropFlags::READ)
            }) {
                debug!(write = %write.uuid, notify = %notify.uuid, "using fallback characteristic pair");
                return Ok((write.clone(), notify.clone()));
            }
        }

        Err(TransportError::ConnectFailed {
            endpoint: "ble".into(),
            reason: "no usable serial characteristics on peripheral".into(),
        })
    }

    async fn discover(&self, connect_timeout: Duration) -> Result<Peripheral, TransportError> {
        let manager = Manager::new().await.map_err(ble_err)?;
        let adapters = manager.adapters().await.map_err(ble_err)?;
        let central = adapters.into_iter().next().ok_or_else(|| {
            TransportError::Config("no Bluetooth adapter available on host".into())
        })?;

        let services = KNOWN_PROFILES.iter().map(|p| p.service).collect();
        central
            .start_scan(ScanFilter { services })
            .await
            .map_err(ble_err)?;

        let scan_window = self.config.scan_timeout.min(connect_timeout);
        let deadline = tokio::time::Instant::now() + scan_window;

        let found = 'scan: loop {
            for peripheral in central.peripherals().await.map_err(ble_err)? {
                let Ok(Some(properties)) = peripheral.properties().await else {
                    continue;
                };
                // a non-negative RSSI is a stale or bogus advertisement
                if properties.rssi.is_some_and(|rssi| rssi >= 0) {
                    continue;
                }
                if !self.name_matches(properties.local_name.as_deref()) {
                    continue;
                }
                info!(
                    name = properties.local_name.as_deref().unwrap_or("<unnamed>"),
                    rssi = ?properties.rssi,
                    "found candidate OBD adapter"
                );
                break 'scan peripheral;
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = central.stop_scan().await;
                return Err(TransportError::Timeout(scan_window));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        let _ = central.stop_scan().await;
        Ok(found)
    }
}

fn ble_err(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::NotConnected => TransportError::NotConnected,
        other => TransportError::ConnectFailed {
            endpoint: "ble".into(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self, connect_timeout: Duration) -> Result<(), TransportError> {
        let peripheral = self.discover(connect_timeout).await?;

        peripheral.connect().await.map_err(ble_err)?;
        peripheral.discover_services().await.map_err(ble_err)?;

        let (write_char, notify_char) = Self::select_characteristics(&peripheral)?;

        self.write_type = if write_char.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        if notify_char.properties.contains(CharPropFlags::NOTIFY) {
            peripheral.subscribe(&notify_char).await.map_err(ble_err)?;
        } else {
            warn!("read characteristic lacks notify; falling back to polled reads");
        }

        let stream = peripheral.notifications().await.map_err(ble_err)?;
        let wanted = notify_char.uuid;
        self.notifications = Some(Box::pin(stream.filter_map(move |n| async move {
            (n.uuid == wanted).then_some(n.value)
        })));

        self.pending.clear();
        self.write_char = Some(write_char);
        self.peripheral = Some(peripheral);
        info!("BLE transport connected");
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::NotConnected)?;
        let write_char = self.write_char.as_ref().ok_or(TransportError::NotConnected)?;
        trace!(bytes = data.len(), "ble write");
        peripheral
            .write(write_char, data, self.write_type)
            .await
            .map_err(ble_err)?;
        Ok(())
    }

    async fn read_until(
        &mut self,
        delimiter: u8,
        read_timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if self.peripheral.is_none() {
            return Err(TransportError::NotConnected);
        }
        let notifications = self
            .notifications
            .as_mut()
            .ok_or(TransportError::NotConnected)?;

        let deadline = tokio::time::Instant::now() + read_timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == delimiter) {
                return Ok(self.pending.drain(..=pos).collect());
            }

            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(TransportError::Timeout(read_timeout))?;

            match timeout(remaining, notifications.next()).await {
                Ok(Some(value)) => {
                    trace!(bytes = value.len(), "ble notification");
                    self.pending.extend(value);
                }
                Ok(None) => {
                    self.peripheral = None;
                    return Err(TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peripheral dropped the link",
                    )));
                }
                Err(_) => return Err(TransportError::Timeout(read_timeout)),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.notifications = None;
        self.write_char = None;
        if let Some(peripheral) = self.peripheral.take() {
            debug!("disconnecting BLE peripheral");
            let _ = peripheral.disconnect().await;
        }
        self.pending.clear();
        Ok(())
    }

    fn endpoint(&self) -> String {
        match &self.config.name_filter {
            Some(name) => format!("ble:{name}"),
            None => "ble".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid16_expands_to_sig_base() {
        assert_eq!(
            uuid16(0xFFE0).to_string(),
            "0000ffe0-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn known_profiles_cover_three_vendor_classes() {
        assert_eq!(KNOWN_PROFILES.len(), 3);
        // Veepeak uses one characteristic for both directions
        assert_eq!(KNOWN_PROFILES[0].write_char, KNOWN_PROFILES[0].notify_char);
        // OBDLink and VGate split the roles
        assert_ne!(KNOWN_PROFILES[1].write_char, KNOWN_PROFILES[1].notify_char);
        assert_ne!(KNOWN_PROFILES[2].write_char, KNOWN_PROFILES[2].notify_char);
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        let transport = BleTransport::new(BleTransportConfig {
            name_filter: Some("veepeak".into()),
            ..Default::default()
        });
        assert!(transport.name_matches(Some("VEEPeak BLE+")));
        assert!(!transport.name_matches(Some("IOS-Vlink")));
        assert!(!transport.name_matches(None));
    }
}
