//! End-to-end scenarios over a scripted adapter
//!
//! Each test drives the whole stack -- session, protocol detection, frame
//! parsing, decoding -- against a mock transport playing the adapter side
//! of the dialogue.

use std::time::Duration;

use obd_client::{
    CommandId, ConnectionSettings, ConnectionState, EcuId, Obd, ObdError, PollStrategy,
    PollingConfig, StateChannel, Unit, UnitSystem,
};
use obd_transport::{MockHandle, MockTransport};

/// Settings with the waits tuned down for tests
fn fast_settings() -> ConnectionSettings {
    let mut settings = ConnectionSettings::default();
    settings.session.reset_delay = Duration::from_millis(1);
    settings.session.init_delay = Duration::from_millis(1);
    settings.session.retry_backoff = Duration::from_millis(1);
    settings
}

/// A CAN vehicle behind a well-behaved adapter
fn can_vehicle() -> (MockTransport, MockHandle) {
    let mock = MockTransport::with_default_init();
    mock.table_entry("0100", "SEARCHING...\r7E8 06 41 00 BE 3F A8 12\r\r>");
    mock.table_entry(
        "0902",
        "7E8 10 14 49 02 01 31 47 31 4A\r7E8 21 43 35 34 34 34 52 37\r7E8 22 32 35 32 33 36 37 00\r\r>",
    );
    mock.table_entry("0600", "NO DATA\r\r>");
    mock.table_entry("0900", "7E8 06 49 00 55 40 00 00\r\r>");
    let handle = mock.handle();
    (mock, handle)
}

async fn connect(mock: MockTransport) -> Obd {
    Obd::connect(Box::new(mock), fast_settings())
        .await
        .expect("connect should succeed")
}

#[tokio::test]
async fn connect_negotiates_and_learns_the_vehicle() {
    let (mock, handle) = can_vehicle();
    let obd = connect(mock).await;
    let info = obd.info();

    assert_eq!(info.protocol, obd_client::ObdProtocol::Can11Bit500K);
    assert_eq!(info.adapter_version.as_deref(), Some("ELM327 v1.5"));
    assert_eq!(info.vin.as_deref(), Some("1G1JC5444R7252367"));
    assert_eq!(info.ecu_map.get(&0x7E8), Some(&EcuId::Engine));

    // BE 3F A8 12 advertises RPM and speed, among others
    assert!(info.supported_pids.contains(&CommandId::Rpm));
    assert!(info.supported_pids.contains(&CommandId::Speed));
    assert!(!info.supported_pids.contains(&CommandId::PidsSupported01));

    // Mode 09 bitmap 55 40: VIN, CALID, CVN, ECU name
    assert!(info.supported_pids.contains(&CommandId::Vin));
    assert!(info.supported_pids.contains(&CommandId::Cvn));

    assert_eq!(*obd.state().borrow(), ConnectionState::ConnectedToVehicle);

    // the init ladder ran in adapter order before any OBD traffic
    let sent = handle.sent_commands();
    assert_eq!(
        &sent[..9],
        &["ATZ", "ATE0", "ATL0", "ATS0", "ATH1", "ATI", "ATSP0", "0100", "ATDPN"]
    );
}

#[tokio::test]
async fn state_stream_tracks_the_connection_lifecycle() {
    let (mock, _) = can_vehicle();
    let states = StateChannel::new();
    let mut rx = states.subscribe();
    assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);

    let connect = tokio::spawn(Obd::connect_with_states(
        Box::new(mock),
        fast_settings(),
        states,
    ));

    // watch the transitions while connect progresses
    let mut seen = Vec::new();
    loop {
        rx.changed().await.unwrap();
        let state = *rx.borrow_and_update();
        seen.push(state);
        if state == ConnectionState::ConnectedToVehicle {
            break;
        }
    }
    assert_eq!(seen.first(), Some(&ConnectionState::Connecting));
    assert_eq!(seen.last(), Some(&ConnectionState::ConnectedToVehicle));

    let obd = connect.await.unwrap().unwrap();
    obd.disconnect().await;
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn speed_single_frame_decodes_to_kmh() {
    let (mock, _) = can_vehicle();
    mock.table_entry("010D", "7E8 03 41 0D 32\r\r>");
    let obd = connect(mock).await;

    let value = obd
        .send_command(CommandId::Speed)
        .await
        .unwrap()
        .as_measurement()
        .unwrap();
    assert_eq!(value.value, 50.0);
    assert_eq!(value.unit, Unit::Kmh);
}

#[tokio::test]
async fn imperial_settings_convert_at_the_boundary() {
    let (mock, _) = can_vehicle();
    mock.table_entry("010D", "7E8 03 41 0D 64\r\r>");

    let mut settings = fast_settings();
    settings.unit_system = UnitSystem::Imperial;
    let obd = Obd::connect(Box::new(mock), settings).await.unwrap();

    let value = obd
        .send_command(CommandId::Speed)
        .await
        .unwrap()
        .as_measurement()
        .unwrap();
    assert_eq!(value.unit, Unit::Mph);
    assert!((value.value - 62.1371).abs() < 1e-3);
}

#[tokio::test]
async fn rpm_and_speed_batch_in_one_request() {
    let (mock, handle) = can_vehicle();
    mock.table_entry("010C0D", "7E8 04 41 0C 0F A0 0D 32\r\r>");
    let obd = connect(mock).await;

    let values = obd
        .request_pids(&[CommandId::Rpm, CommandId::Speed])
        .await
        .unwrap();

    assert_eq!(values[&CommandId::Rpm].value, 1000.0);
    assert_eq!(values[&CommandId::Speed].value, 50.0);
    assert!(handle.sent_commands().contains(&"010C0D".to_string()));
}

#[tokio::test]
async fn partial_batch_reply_skips_the_missing_pid() {
    let (mock, _) = can_vehicle();
    // vehicle answers the speed request only
    mock.table_entry("010C0D", "7E8 02 41 0D 32\r\r>");
    let obd = connect(mock).await;

    let values = obd
        .request_pids(&[CommandId::Rpm, CommandId::Speed])
        .await
        .unwrap();
    assert!(!values.contains_key(&CommandId::Rpm));
    assert_eq!(values[&CommandId::Speed].value, 50.0);
}

#[tokio::test]
async fn trouble_codes_scan_and_clear() {
    let (mock, _) = can_vehicle();
    mock.table_entry("03", "7E8 04 43 01 01 33\r\r>");
    mock.table_entry("04", "7E8 01 44\r\r>");
    let obd = connect(mock).await;

    let codes = obd.scan_trouble_codes().await.unwrap();
    let engine = &codes[&EcuId::Engine];
    assert_eq!(engine.len(), 1);
    assert_eq!(engine[0].code, "P0133");

    obd.clear_trouble_codes().await.unwrap();
}

#[tokio::test]
async fn readiness_status_reports_monitors() {
    let (mock, _) = can_vehicle();
    mock.table_entry("0101", "7E8 06 41 01 82 07 E5 00\r\r>");
    let obd = connect(mock).await;

    let status = obd.status().await.unwrap();
    assert!(status.mil);
    assert_eq!(status.dtc_count, 2);

    let misfire = status.monitor("misfire").unwrap();
    assert!(misfire.available);
    assert!(!misfire.complete);
}

#[tokio::test]
async fn battery_voltage_reads_the_adapter_rail() {
    let (mock, _) = can_vehicle();
    mock.table_entry("ATRV", "12.6V\r\r>");
    let obd = connect(mock).await;

    let voltage = obd.battery_voltage().await.unwrap();
    assert_eq!(voltage.value, 12.6);
    assert_eq!(voltage.unit, Unit::Volt);
}

#[tokio::test]
async fn failed_auto_search_walks_the_manual_ladder() {
    let mock = MockTransport::with_default_init()
        .expect("0100", "SEARCHING...\rUNABLE TO CONNECT\r\r>")
        .expect("0100", "NO DATA\r\r>")
        .expect("0100", "48 6B 10 41 00 BE 1F A8 10\r\r>");
    // VIN and discovery land on the legacy vehicle afterwards
    mock.table_entry("0902", "NO DATA\r\r>");
    mock.table_entry("0100", "48 6B 10 41 00 BE 1F A8 10\r\r>");
    mock.table_entry("0600", "NO DATA\r\r>");
    mock.table_entry("0900", "NO DATA\r\r>");
    let handle = mock.handle();

    let obd = connect(mock).await;
    assert_eq!(obd.info().protocol, obd_client::ObdProtocol::J1850Vpw);
    assert!(obd.info().vin.is_none());
    assert_eq!(obd.info().ecu_map.get(&0), Some(&EcuId::Engine));

    let sent = handle.sent_commands();
    let probes: Vec<&String> = sent.iter().filter(|c| c.as_str() == "0100").collect();
    assert!(probes.len() >= 3, "auto then two manual probes");
    assert!(sent.contains(&"ATSP1".to_string()));
    assert!(sent.contains(&"ATSP2".to_string()));
}

#[tokio::test]
async fn continuous_updates_stream_and_stop_cleanly() {
    let (mock, _) = can_vehicle();
    mock.table_entry("010C0D", "7E8 04 41 0C 0F A0 0D 32\r\r>");
    mock.table_entry("010D", "7E8 03 41 0D 32\r\r>");
    let obd = connect(mock).await;

    let config = PollingConfig {
        interval: Duration::from_millis(5),
        ..Default::default()
    };
    let (mut rx, handle) =
        obd.continuous_updates(&[CommandId::Rpm, CommandId::Speed], Some(config));

    let snapshot = rx.recv().await.expect("one snapshot");
    assert_eq!(snapshot[&CommandId::Rpm].value, 1000.0);
    assert_eq!(snapshot[&CommandId::Speed].value, 50.0);

    // cancellation must leave the adapter usable for the next command
    handle.stop().await;
    let value = obd
        .send_command(CommandId::Speed)
        .await
        .unwrap()
        .as_measurement()
        .unwrap();
    assert_eq!(value.value, 50.0);
}

#[tokio::test]
async fn sequential_strategy_polls_one_pid_per_request() {
    let (mock, handle) = can_vehicle();
    mock.table_entry("010C", "7E8 04 41 0C 0F A0\r\r>");
    mock.table_entry("010D", "7E8 03 41 0D 32\r\r>");
    let obd = connect(mock).await;

    let config = PollingConfig {
        interval: Duration::from_millis(5),
        strategy: PollStrategy::Sequential,
        ..Default::default()
    };
    let (mut rx, poll) =
        obd.continuous_updates(&[CommandId::Rpm, CommandId::Speed], Some(config));

    let snapshot = rx.recv().await.expect("one snapshot");
    assert_eq!(snapshot.len(), 2);
    poll.stop().await;

    let sent = handle.sent_commands();
    assert!(sent.contains(&"010C".to_string()));
    assert!(sent.contains(&"010D".to_string()));
}

#[tokio::test]
async fn supported_pids_are_idempotent() {
    let (mock, handle) = can_vehicle();
    let obd = connect(mock).await;

    let first = obd.supported_pids().clone();
    let commands_after_connect = handle.sent_commands().len();

    // a second read answers from the connect-time discovery
    let second = obd.supported_pids().clone();
    assert_eq!(first, second);
    assert_eq!(handle.sent_commands().len(), commands_after_connect);
}

#[tokio::test]
async fn dead_adapter_fails_connect_with_adapter_error() {
    // an adapter that never answers anything
    let mock = MockTransport::new();
    let err = Obd::connect(Box::new(mock), fast_settings())
        .await
        .unwrap_err();
    assert!(matches!(err, ObdError::AdapterConnect(_)));
}

#[tokio::test]
async fn vehicle_without_protocol_reports_no_protocol() {
    let mock = MockTransport::with_default_init();
    mock.table_entry("0100", "UNABLE TO CONNECT\r\r>");
    let err = Obd::connect(Box::new(mock), fast_settings())
        .await
        .unwrap_err();
    assert!(matches!(err, ObdError::NoProtocol(_)));
}
