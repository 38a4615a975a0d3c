//! Shared frame types and response line cleanup

use std::collections::HashMap;

/// A bus endpoint, demultiplexed from response headers.
///
/// The address is the 3-bit transmitter id for legacy protocols and the
/// full arbitration id for CAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcuId {
    Engine,
    Transmission,
    Unknown(u32),
}

/// One reassembled logical response from a single ECU.
///
/// `data[0]` is the service response byte (request service + 0x40).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub ecu: EcuId,
    pub data: Vec<u8>,
}

/// Per-vehicle mapping from transmitter address to ECU identity,
/// established from the first valid `0100` response.
pub type EcuMap = HashMap<u32, EcuId>;

/// Resolve an address through the map, with the conventional CAN response
/// ids as a fallback before giving up.
pub fn resolve_ecu(map: &EcuMap, address: u32) -> EcuId {
    if let Some(&ecu) = map.get(&address) {
        return ecu;
    }
    match address {
        0x7E8 | 0x18DAF110 | 0x0 => EcuId::Engine,
        0x7E9 | 0x18DAF118 | 0x1 => EcuId::Transmission,
        other => EcuId::Unknown(other),
    }
}

/// Minimum hex-character counts per parser mode
pub mod min_hex {
    /// Sequence-less emulator frames can be as short as two byte pairs
    pub const EMULATOR: usize = 4;
    /// CAN: 3-char arbitration id plus at least PCI and one byte
    pub const CAN: usize = 6;
    /// Legacy: 3-byte header, service byte, data, checksum
    pub const LEGACY: usize = 12;
}

/// Clean raw adapter output lines into bare hex strings.
///
/// Lines are upper-cased and stripped of whitespace; `SEARCHING...` noise
/// and anything that is not a hex string of at least `min_len` characters
/// is dropped. Byte-aligned framing means even length, except that an
/// 11-bit CAN arbitration id prints as three characters and makes the
/// whole line odd; `allow_odd` admits those for the CAN parser.
pub fn clean_hex_lines(lines: &[String], min_len: usize, allow_odd: bool) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            line.to_ascii_uppercase()
                .replace("SEARCHING...", "")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        })
        .filter(|line| {
            line.len() >= min_len.max(2)
                && (line.len() % 2 == 0 || allow_odd)
                && line.chars().all(|c| c.is_ascii_hexdigit())
        })
        .collect()
}

/// Parse a cleaned hex string into bytes; the caller guarantees even length
pub fn hex_to_bytes(line: &str) -> Vec<u8> {
    line.as_bytes()
        .chunks_exact(2)
        .filter_map(|pair| u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cleanup_strips_spaces_and_noise() {
        let cleaned = clean_hex_lines(
            &lines(&["41 0D 32", "SEARCHING...", "NO DATA", ">"]),
            min_hex::EMULATOR,
            false,
        );
        assert_eq!(cleaned, vec!["410D32"]);
    }

    #[test]
    fn cleanup_admits_odd_length_only_for_can_headers() {
        let raw = lines(&["7E8 06 41 0C 0F A0 0D 32"]);
        assert_eq!(
            clean_hex_lines(&raw, min_hex::CAN, true),
            vec!["7E806410C0FA00D32"]
        );
        assert!(clean_hex_lines(&raw, min_hex::CAN, false).is_empty());
    }

    #[test]
    fn cleanup_enforces_minimum_length() {
        assert!(clean_hex_lines(&lines(&["410D32"]), min_hex::LEGACY, false).is_empty());
        assert_eq!(
            clean_hex_lines(&lines(&["410D32"]), min_hex::EMULATOR, false),
            vec!["410D32"]
        );
    }

    #[test]
    fn searching_prefix_on_data_line_is_removed() {
        let cleaned = clean_hex_lines(&lines(&["SEARCHING...4100BE3FA813"]), min_hex::CAN, true);
        assert_eq!(cleaned, vec!["4100BE3FA813"]);
    }

    #[test]
    fn hex_round_trip() {
        assert_eq!(hex_to_bytes("410D32"), vec![0x41, 0x0D, 0x32]);
    }

    #[test]
    fn ecu_resolution_prefers_the_map() {
        let mut map = EcuMap::new();
        map.insert(0x7E9, EcuId::Engine);
        assert_eq!(resolve_ecu(&map, 0x7E9), EcuId::Engine);
        assert_eq!(resolve_ecu(&map, 0x7E8), EcuId::Engine);
        assert_eq!(resolve_ecu(&map, 0x7EA), EcuId::Unknown(0x7EA));
    }
}
