//! High-level OBD-II client
//!
//! [`Obd::connect`] takes a transport and an immutable settings record,
//! brings the adapter up, negotiates the in-vehicle protocol, maps the
//! responding ECUs, reads the VIN and discovers the supported PIDs. The
//! connected client then serves one-shot commands, trouble-code scans and
//! continuous live-data polling over the single half-duplex link.
//!
//! ```no_run
//! use obd_client::{ConnectionSettings, Obd};
//! use obd_transport::{TcpTransport, TcpTransportConfig};
//!
//! # async fn demo() -> Result<(), obd_client::ObdError> {
//! let transport = TcpTransport::new(TcpTransportConfig::default()).unwrap();
//! let obd = Obd::connect(Box::new(transport), ConnectionSettings::default()).await?;
//! println!("VIN: {:?}", obd.info().vin);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod poller;

pub use config::{ConnectionSettings, PollStrategy, PollingConfig};
pub use error::ObdError;
pub use poller::{PollHandle, Snapshot};

pub use elm327::{EcuId, ObdProtocol};
pub use obd_pids::{
    CommandId, MeasurementResult, MonitorTest, Status, TroubleCode, TypedValue, Unit, UnitSystem,
};
pub use obd_transport::{ConnectionState, StateChannel, Transport};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn, Level};

use elm327::{
    build_ecu_map, detect_protocol, parse_messages, EcuMap, Elm327Session, Message, SessionError,
};
use obd_pids::decode::support_bits;
use obd_pids::Service;

/// Everything learned about the vehicle during `connect`
#[derive(Debug, Clone)]
pub struct ObdInfo {
    /// 17-character VIN, when the vehicle provided a valid one
    pub vin: Option<String>,
    /// `ATI` banner
    pub adapter_version: Option<String>,
    pub protocol: ObdProtocol,
    pub supported_pids: BTreeSet<CommandId>,
    pub ecu_map: EcuMap,
}

#[derive(Debug)]
pub(crate) struct ObdInner {
    pub(crate) session: Elm327Session,
    settings: ConnectionSettings,
    states: StateChannel,
    info: ObdInfo,
}

/// A connected OBD-II client
#[derive(Debug, Clone)]
pub struct Obd {
    inner: Arc<ObdInner>,
}

impl Obd {
    /// Connect with a private state channel
    pub async fn connect(
        transport: Box<dyn Transport>,
        settings: ConnectionSettings,
    ) -> Result<Self, ObdError> {
        Self::connect_with_states(transport, settings, StateChannel::new()).await
    }

    /// Connect, publishing lifecycle transitions into a caller-supplied
    /// channel so subscribers observe `Connecting` onward.
    pub async fn connect_with_states(
        transport: Box<dyn Transport>,
        settings: ConnectionSettings,
        states: StateChannel,
    ) -> Result<Self, ObdError> {
        let session = Elm327Session::new(transport, settings.session.clone());

        states.publish(ConnectionState::Connecting);
        if let Err(e) = session.connect_transport(settings.connect_timeout).await {
            states.publish(ConnectionState::Disconnected);
            return Err(ObdError::AdapterConnect(e));
        }

        let adapter_version = match session.initialize().await {
            Ok(banner) => (!banner.is_empty()).then_some(banner),
            Err(e) => {
                states.publish(ConnectionState::Disconnected);
                session.disconnect().await;
                return Err(ObdError::AdapterConnect(e));
            }
        };
        states.publish(ConnectionState::ConnectedToAdapter);

        let detection = match detect_protocol(&session, settings.preferred_protocol).await {
            Ok(detection) => detection,
            Err(e) => {
                // the adapter is still fine; only a dead link drops the state
                if matches!(e, elm327::ProtocolError::Session(ref s) if is_fatal(s)) {
                    states.publish(ConnectionState::Disconnected);
                }
                return Err(e.into());
            }
        };

        let ecu_map = build_ecu_map(detection.protocol, &detection.probe_lines);
        info!(protocol = ?detection.protocol, ecus = ecu_map.len(), "vehicle negotiated");

        let vin = read_vin(&session, detection.protocol, &ecu_map, &settings).await;
        let supported_pids =
            discover_supported(&session, detection.protocol, &ecu_map, &settings).await;
        states.publish(ConnectionState::ConnectedToVehicle);

        let info = ObdInfo {
            vin,
            adapter_version,
            protocol: detection.protocol,
            supported_pids,
            ecu_map,
        };
        Ok(Self {
            inner: Arc::new(ObdInner {
                session,
                settings,
                states,
                info,
            }),
        })
    }

    /// Lifecycle stream; the receiver observes every transition
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.states.subscribe()
    }

    /// Everything learned during connect
    pub fn info(&self) -> &ObdInfo {
        &self.inner.info
    }

    /// The PIDs the vehicle advertises; cached, so repeated calls agree
    pub fn supported_pids(&self) -> &BTreeSet<CommandId> {
        &self.inner.info.supported_pids
    }

    /// Close the link; idempotent
    pub async fn disconnect(&self) {
        self.inner.session.disconnect().await;
        self.inner.states.publish(ConnectionState::Disconnected);
    }

    /// Send one catalogued command and decode its response
    pub async fn send_command(&self, command: CommandId) -> Result<TypedValue, ObdError> {
        self.inner.send_command_typed(command).await
    }

    /// One-shot batched read of several Mode 01 PIDs
    pub async fn request_pids(
        &self,
        commands: &[CommandId],
    ) -> Result<HashMap<CommandId, MeasurementResult>, ObdError> {
        poller::poll_batched(&self.inner, commands).await
    }

    /// Stream live-data snapshots until the handle is stopped.
    ///
    /// Uses the connection's polling defaults unless `config` overrides
    /// them. Dropping the receiver also ends the stream.
    pub fn continuous_updates(
        &self,
        commands: &[CommandId],
        config: Option<PollingConfig>,
    ) -> (mpsc::Receiver<Snapshot>, PollHandle) {
        let config = config.unwrap_or_else(|| self.inner.settings.polling.clone());
        poller::spawn(Arc::clone(&self.inner), commands.to_vec(), config)
    }

    /// Mode 03: stored trouble codes per ECU
    pub async fn scan_trouble_codes(
        &self,
    ) -> Result<HashMap<EcuId, Vec<TroubleCode>>, ObdError> {
        let messages = match self.inner.query_wire("03").await {
            Ok(messages) => messages,
            Err(ObdError::NoData) => return Ok(HashMap::new()),
            Err(_) => return Err(ObdError::ScanFailed),
        };

        let mut codes = HashMap::new();
        for message in messages {
            if message.data.first() != Some(&0x43) {
                warn!(data = ?message.data, "unexpected Mode 03 response byte");
                continue;
            }
            // data[1] is the code count (synthesized on non-CAN buses)
            let payload = message.data.get(2..).unwrap_or_default();
            match CommandId::ScanDtcs.decode(payload, self.inner.units()) {
                Ok(TypedValue::TroubleCodes(list)) => {
                    codes.insert(message.ecu, list);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "DTC decode failed");
                    return Err(ObdError::ScanFailed);
                }
            }
        }
        Ok(codes)
    }

    /// Mode 04: clear stored codes and reset the readiness monitors
    pub async fn clear_trouble_codes(&self) -> Result<(), ObdError> {
        let messages = self
            .inner
            .query_wire("04")
            .await
            .map_err(|_| ObdError::ClearFailed)?;
        if messages.iter().any(|m| m.data.first() == Some(&0x44)) {
            info!("trouble codes cleared");
            Ok(())
        } else {
            Err(ObdError::ClearFailed)
        }
    }

    /// Mode 01 PID 01: MIL state, code count and readiness monitors
    pub async fn status(&self) -> Result<Status, ObdError> {
        match self.send_command(CommandId::Status).await? {
            TypedValue::Status(status) => Ok(status),
            _ => Err(ObdError::NoData),
        }
    }

    /// `ATRV`: adapter supply voltage, a proxy for the vehicle battery
    pub async fn battery_voltage(&self) -> Result<MeasurementResult, ObdError> {
        match self.send_command(CommandId::BatteryVoltage).await? {
            TypedValue::Measurement(m) => Ok(m),
            _ => Err(ObdError::NoData),
        }
    }

    /// Mode 06: on-board monitoring test results for the supported monitors
    pub async fn monitor_tests(&self) -> Result<Vec<MonitorTest>, ObdError> {
        let monitors: Vec<CommandId> = self
            .inner
            .info
            .supported_pids
            .iter()
            .copied()
            .filter(|c| c.service() == Service::Mode06 && !c.is_pid_getter())
            .collect();

        let mut tests = Vec::new();
        for command in monitors {
            match self.send_command(command).await {
                Ok(TypedValue::MonitorTests(mut list)) => tests.append(&mut list),
                Ok(_) => {}
                Err(ObdError::NoData) => {}
                Err(e) => {
                    warn!(command = command.spec().wire, error = %e, "monitor read failed");
                }
            }
        }
        Ok(tests)
    }
}

impl ObdInner {
    pub(crate) fn units(&self) -> UnitSystem {
        self.settings.unit_system
    }

    /// Send a raw OBD request and parse its response into messages
    pub(crate) async fn query_wire(&self, wire: &str) -> Result<Vec<Message>, ObdError> {
        let lines = match self.session.send_with_retries(wire).await {
            Ok(lines) => lines,
            Err(e) => {
                self.note_failure(&e);
                return Err(ObdError::Session(e));
            }
        };
        if lines.is_empty() {
            return Err(ObdError::NoData);
        }
        let messages = parse_messages(
            self.info.protocol,
            &lines,
            &self.info.ecu_map,
            self.settings.emulator_mode,
        )?;
        if messages.is_empty() {
            return Err(ObdError::NoData);
        }
        Ok(messages)
    }

    /// Send a catalogued command and decode the first ECU's answer
    pub(crate) async fn send_command_typed(
        &self,
        command: CommandId,
    ) -> Result<TypedValue, ObdError> {
        let spec = command.spec();

        // adapter-level commands answer in plain text, not OBD frames
        if matches!(command.service(), Service::General | Service::Protocols) {
            let lines = self
                .session
                .send_with_retries(spec.wire)
                .await
                .map_err(|source| ObdError::CommandFailed {
                    command: spec.wire,
                    source,
                })?;
            let first = lines.into_iter().next().ok_or(ObdError::NoData)?;
            return Ok(command.decode(first.as_bytes(), self.units())?);
        }

        let messages = self.query_wire(spec.wire).await?;
        let message = messages.first().ok_or(ObdError::NoData)?;

        let Some((mode, pid)) = command.mode_pid().or_else(|| {
            // the bare-mode commands (03, 04) carry no PID byte
            u8::from_str_radix(spec.wire, 16).ok().map(|m| (m, 0))
        }) else {
            return Err(ObdError::NoData);
        };

        if message.data.first() != Some(&(0x40 | mode)) {
            warn!(wire = spec.wire, data = ?message.data, "response mode mismatch");
            return Err(ObdError::CommandFailed {
                command: spec.wire,
                source: SessionError::InvalidResponse(format!("{:02X?}", message.data)),
            });
        }
        if spec.wire.len() == 4 && message.data.get(1) != Some(&pid) {
            warn!(wire = spec.wire, data = ?message.data, "response PID mismatch");
            return Err(ObdError::NoData);
        }

        let offset = payload_offset(command.service());
        let payload = message.data.get(offset..).unwrap_or_default();
        Ok(command.decode(payload, self.units())?)
    }

    /// Drop the link state on errors that mean the link itself is gone
    fn note_failure(&self, error: &SessionError) {
        if is_fatal(error) {
            self.states.publish(ConnectionState::Disconnected);
        }
    }
}

/// How many leading bytes of a message are echo rather than value
fn payload_offset(service: Service) -> usize {
    match service {
        // service byte + PID echo
        Service::Mode01 | Service::Mode09 => 2,
        // service byte + code count (synthesized for non-CAN)
        Service::Mode03 => 2,
        // service byte only; Mode 06 records start with their own MID echo
        Service::Mode04 | Service::Mode06 => 1,
        Service::General | Service::Protocols => 0,
    }
}

fn is_fatal(error: &SessionError) -> bool {
    use obd_transport::TransportError;
    matches!(
        error,
        SessionError::Link(_)
            | SessionError::Transport(TransportError::Io(_))
            | SessionError::Transport(TransportError::ConnectFailed { .. })
            | SessionError::Transport(TransportError::NotConnected)
    )
}

/// Mode 09 PID 02: collect every byte, strip the service/PID echo, keep
/// the VIN alphabet, demand exactly 17 characters. Anything else leaves
/// the VIN unknown; a vehicle without one is not an error.
async fn read_vin(
    session: &Elm327Session,
    protocol: ObdProtocol,
    ecu_map: &EcuMap,
    settings: &ConnectionSettings,
) -> Option<String> {
    let lines = match session.send_with_retries("0902").await {
        Ok(lines) if !lines.is_empty() => lines,
        Ok(_) => {
            debug!("vehicle does not report a VIN");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "VIN request failed");
            return None;
        }
    };

    let messages =
        match parse_messages(protocol, &lines, ecu_map, settings.emulator_mode) {
            Ok(messages) => messages,
            Err(e) => {
                debug!(error = %e, "VIN response did not parse");
                return None;
            }
        };

    let data = &messages.first()?.data;
    let tail = if data.len() > 2 { &data[2..] } else { &data[..] };
    let vin: String = tail
        .iter()
        .filter(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        .map(|&b| b as char)
        .collect();

    if vin.len() == 17 {
        info!(vin, "VIN read");
        Some(vin)
    } else {
        debug!(candidate = vin, "VIN candidate is not 17 characters");
        None
    }
}

/// Walk the chained supported-PID bitmaps for Modes 01, 06 and 09.
///
/// Bit `k` (MSB first) of a getter's 32-bit field marks PID
/// `base + k + 1`; a set last bit chains to the next getter. The union
/// over all responding ECUs is returned, getters excluded.
async fn discover_supported(
    session: &Elm327Session,
    protocol: ObdProtocol,
    ecu_map: &EcuMap,
    settings: &ConnectionSettings,
) -> BTreeSet<CommandId> {
    let mut supported = BTreeSet::new();

    let chains = [
        (0x01u8, CommandId::PidsSupported01),
        (0x06, CommandId::MidsSupportedA),
        (0x09, CommandId::PidsSupported09),
    ];

    for (mode, first_getter) in chains {
        let mut getter = Some(first_getter);
        while let Some(current) = getter.take() {
            let Some((_, base)) = current.mode_pid() else {
                break;
            };
            let lines = match session.send_with_retries(current.spec().wire).await {
                Ok(lines) if !lines.is_empty() => lines,
                Ok(_) => break,
                Err(e) => {
                    debug!(getter = current.spec().wire, error = %e, "getter failed");
                    break;
                }
            };
            let Ok(messages) = parse_messages(protocol, &lines, ecu_map, settings.emulator_mode)
            else {
                break;
            };

            let mut chain_continues = false;
            for message in &messages {
                if message.data.first() != Some(&(0x40 | mode)) || message.data.len() < 6 {
                    continue;
                }
                let bitmap = &message.data[2..6];
                for (k, set) in support_bits(bitmap).enumerate() {
                    if !set {
                        continue;
                    }
                    let pid = base + k as u8 + 1;
                    if let Some(command) = CommandId::from_mode_pid(mode, pid) {
                        if !command.is_pid_getter() {
                            supported.insert(command);
                        }
                    }
                }
                if bitmap[3] & 0x01 != 0 {
                    chain_continues = true;
                }
            }
            if chain_continues {
                getter = CommandId::from_mode_pid(mode, base + 0x20);
            }
        }
    }

    info!(count = supported.len(), "supported PIDs discovered");
    supported
}

/// Install a global `tracing` subscriber for binaries and examples
pub fn init_logging() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
