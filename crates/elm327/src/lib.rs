//! ELM327 adapter session and OBD-II frame parsing
//!
//! This crate drives the adapter side of the link: the prompt-delimited
//! command dialogue, the initialization ladder, protocol negotiation, and
//! the two wire-format parsers (legacy three-byte-header protocols and ISO
//! 15765 CAN) that turn response lines into per-ECU messages.

mod can;
mod detect;
mod error;
mod frame;
mod legacy;
mod protocol;
mod session;

pub use can::CanParser;
pub use detect::{detect_protocol, Detection};
pub use error::{LinkErrorKind, ParseError, ProtocolError, SessionError};
pub use frame::{clean_hex_lines, hex_to_bytes, min_hex, resolve_ecu, EcuId, EcuMap, Message};
pub use legacy::LegacyParser;
pub use protocol::ObdProtocol;
pub use session::{Elm327Session, SessionConfig};

use std::collections::HashMap;

/// Parse response lines with the parser matching `protocol`.
///
/// With no negotiated protocol yet (during detection) callers pick a
/// parser directly; afterwards this is the single entry point.
pub fn parse_messages(
    protocol: ObdProtocol,
    lines: &[String],
    ecu_map: &EcuMap,
    emulator_mode: bool,
) -> Result<Vec<Message>, ParseError> {
    if protocol.is_can() {
        CanParser::default().parse(lines, ecu_map)
    } else {
        LegacyParser {
            emulator_mode,
            ..Default::default()
        }
        .parse(lines, ecu_map)
    }
}

/// Build the transmitter-address to ECU mapping from a `0100` response.
///
/// A single responder is the engine. With several, address 0 (or the
/// conventional CAN engine id) wins; otherwise the ECU whose supported-PID
/// bitmap has the most set bits is taken for the engine and the rest for
/// the transmission.
pub fn build_ecu_map(protocol: ObdProtocol, probe_lines: &[String]) -> EcuMap {
    let mut map = EcuMap::new();

    let addressed: Vec<(u32, Vec<u8>)> = if protocol.is_can() {
        can_probe_addresses(probe_lines)
    } else {
        legacy_probe_addresses(probe_lines)
    };

    match addressed.as_slice() {
        [] => {}
        [(address, _)] => {
            map.insert(*address, EcuId::Engine);
        }
        many => {
            let zeroish = many
                .iter()
                .any(|(address, _)| matches!(*address, 0x0 | 0x7E8 | 0x18DAF110));
            if zeroish {
                for (address, _) in many {
                    let ecu = match *address {
                        0x0 | 0x7E8 | 0x18DAF110 => EcuId::Engine,
                        0x1 | 0x7E9 | 0x18DAF118 => EcuId::Transmission,
                        other => EcuId::Unknown(other),
                    };
                    map.insert(*address, ecu);
                }
            } else {
                // the richest PID bitmap marks the engine controller
                let engine = many
                    .iter()
                    .max_by_key(|(_, payload)| {
                        payload.iter().map(|b| b.count_ones()).sum::<u32>()
                    })
                    .map(|(address, _)| *address);
                for (address, _) in many {
                    let ecu = if Some(*address) == engine {
                        EcuId::Engine
                    } else {
                        EcuId::Transmission
                    };
                    map.insert(*address, ecu);
                }
            }
        }
    }

    map
}

/// Addresses and bitmap payloads from a CAN `0100` reply
fn can_probe_addresses(lines: &[String]) -> Vec<(u32, Vec<u8>)> {
    let mut seen: HashMap<u32, Vec<u8>> = HashMap::new();
    for line in clean_hex_lines(lines, min_hex::CAN, true) {
        let (id_len, rest_start) = if line.len() % 2 == 1 { (3, 3) } else { (8, 8) };
        if line.len() < rest_start + 2 {
            continue;
        }
        let Ok(address) = u32::from_str_radix(&line[..id_len], 16) else {
            continue;
        };
        let payload = hex_to_bytes(&line[rest_start..]);
        seen.entry(address).or_insert(payload);
    }
    let mut out: Vec<_> = seen.into_iter().collect();
    out.sort_by_key(|(address, _)| *address);
    out
}

/// Addresses and bitmap payloads from a legacy `0100` reply
fn legacy_probe_addresses(lines: &[String]) -> Vec<(u32, Vec<u8>)> {
    let mut seen: HashMap<u32, Vec<u8>> = HashMap::new();
    for line in clean_hex_lines(lines, min_hex::LEGACY, false) {
        let bytes = hex_to_bytes(&line);
        if bytes.len() < 4 {
            continue;
        }
        seen.entry((bytes[2] & 0x07) as u32)
            .or_insert_with(|| bytes[3..].to_vec());
    }
    let mut out: Vec<_> = seen.into_iter().collect();
    out.sort_by_key(|(address, _)| *address);
    out
}
