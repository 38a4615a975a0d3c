//! Poll live engine data from a WiFi ELM327 dongle
//!
//! Usage: cargo run --example live_data [host] [port]

use std::time::Duration;

use obd_client::{CommandId, ConnectionSettings, Obd, PollingConfig};
use obd_transport::{TcpTransport, TcpTransportConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    obd_client::init_logging();

    let mut args = std::env::args().skip(1);
    let mut config = TcpTransportConfig::default();
    if let Some(host) = args.next() {
        config.host = host;
    }
    if let Some(port) = args.next() {
        config.port = port.parse()?;
    }

    let transport = TcpTransport::new(config)?;
    let obd = Obd::connect(Box::new(transport), ConnectionSettings::default()).await?;

    let info = obd.info();
    println!("protocol: {:?}", info.protocol);
    println!("adapter:  {:?}", info.adapter_version);
    println!("VIN:      {:?}", info.vin);
    println!("supported PIDs: {}", info.supported_pids.len());

    let voltage = obd.battery_voltage().await?;
    println!("battery:  {voltage}");

    let polling = PollingConfig {
        interval: Duration::from_millis(300),
        adaptive: true,
        ..Default::default()
    };
    let (mut snapshots, handle) = obd.continuous_updates(
        &[
            CommandId::Rpm,
            CommandId::Speed,
            CommandId::CoolantTemp,
            CommandId::EngineLoad,
        ],
        Some(polling),
    );

    for _ in 0..20 {
        let Some(snapshot) = snapshots.recv().await else {
            break;
        };
        let mut line = String::new();
        for (command, value) in &snapshot {
            line.push_str(&format!("{}: {}  ", command.spec().short_description, value));
        }
        println!("{line}");
    }

    handle.stop().await;
    obd.disconnect().await;
    Ok(())
}
