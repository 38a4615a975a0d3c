//! ISO 15765-2 (CAN) frame parser
//!
//! With headers on, each line is an arbitration id (3 hex characters for
//! 11-bit, 8 for 29-bit) followed by the ISO-TP PCI byte and data. The PCI
//! high nibble classifies the frame: Single, First, Consecutive or Flow
//! Control. Frames are grouped by arbitration id and reassembled per ECU;
//! consecutive-frame sequence numbers wrap 0..F and must be contiguous.

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::frame::{clean_hex_lines, hex_to_bytes, min_hex, resolve_ecu, EcuMap, Message};

const PCI_SINGLE: u8 = 0x0;
const PCI_FIRST: u8 = 0x1;
const PCI_CONSECUTIVE: u8 = 0x2;
const PCI_FLOW_CONTROL: u8 = 0x3;

const MODE3_RESPONSE: u8 = 0x43;

/// One header-split CAN frame; `bytes[0]` is the PCI byte
#[derive(Debug, Clone)]
struct CanFrame {
    arb_id: u32,
    bytes: Vec<u8>,
}

/// Parser for the ISO 15765-4 wire format
#[derive(Debug, Clone, Copy)]
pub struct CanParser {
    /// Whether the adapter prefixes lines with the arbitration id (`ATH1`)
    pub headers: bool,
}

impl Default for CanParser {
    fn default() -> Self {
        Self { headers: true }
    }
}

impl CanParser {
    /// Parse cleaned response lines into per-ECU messages
    pub fn parse(&self, lines: &[String], ecu_map: &EcuMap) -> Result<Vec<Message>, ParseError> {
        let cleaned = clean_hex_lines(lines, min_hex::CAN, self.headers);

        if !self.headers {
            return self.parse_headerless(&cleaned);
        }

        let mut groups: Vec<(u32, Vec<CanFrame>)> = Vec::new();
        for line in &cleaned {
            let frame = split_header(line)?;
            if frame.bytes.is_empty() {
                return Err(ParseError::ShortFrame(0));
            }
            match groups.iter_mut().find(|(id, _)| *id == frame.arb_id) {
                Some((_, frames)) => frames.push(frame),
                None => groups.push((frame.arb_id, vec![frame])),
            }
        }

        let mut messages = Vec::new();
        for (arb_id, frames) in groups {
            let ecu = resolve_ecu(ecu_map, arb_id);
            for data in reassemble(&frames)? {
                messages.push(Message { ecu, data });
            }
        }
        Ok(messages)
    }

    /// With headers off only single frames are distinguishable; each line
    /// is a bare payload from the one responding ECU.
    fn parse_headerless(&self, cleaned: &[String]) -> Result<Vec<Message>, ParseError> {
        let mut messages = Vec::new();
        for line in cleaned {
            let bytes = hex_to_bytes(line);
            if bytes.len() < 2 {
                return Err(ParseError::ShortFrame(bytes.len()));
            }
            // the legacy bus has no count byte after 0x43; align the shape
            let data = if bytes[0] == MODE3_RESPONSE {
                let mut data = vec![MODE3_RESPONSE, 0x00];
                data.extend_from_slice(&bytes[1..]);
                data
            } else {
                bytes
            };
            messages.push(Message {
                ecu: crate::frame::EcuId::Engine,
                data,
            });
        }
        Ok(messages)
    }
}

/// Split the arbitration id off a cleaned line.
///
/// An odd-length line can only be a 3-character 11-bit id. Even-length
/// lines are read as 8-character 29-bit ids; firmwares differ on 29-bit
/// header widths, so a line that fits neither layout is rejected rather
/// than guessed.
fn split_header(line: &str) -> Result<CanFrame, ParseError> {
    if line.len() % 2 == 1 {
        if line.len() < 5 {
            return Err(ParseError::ShortFrame(line.len() / 2));
        }
        let arb_id = u32::from_str_radix(&line[..3], 16)
            .map_err(|_| ParseError::BadHeader(line.to_string()))?;
        return Ok(CanFrame {
            arb_id,
            bytes: hex_to_bytes(&line[3..]),
        });
    }

    if line.len() >= 10 {
        if let Ok(arb_id) = u32::from_str_radix(&line[..8], 16) {
            // 29-bit ids occupy the full four byte pairs
            if arb_id > 0x7FF {
                return Ok(CanFrame {
                    arb_id,
                    bytes: hex_to_bytes(&line[8..]),
                });
            }
        }
    }
    Err(ParseError::BadHeader(line.to_string()))
}

/// Reassemble one arbitration id's frames into complete payloads
fn reassemble(frames: &[CanFrame]) -> Result<Vec<Vec<u8>>, ParseError> {
    let mut complete = Vec::new();
    let mut assembly: Option<(usize, Vec<u8>)> = None;
    let mut expected_seq = 0u8;

    for frame in frames {
        let pci = frame.bytes[0] >> 4;
        match pci {
            PCI_SINGLE => {
                let declared = (frame.bytes[0] & 0x0F) as usize;
                if declared == 0 {
                    debug!(arb_id = frame.arb_id, "zero-length single frame skipped");
                    continue;
                }
                // padded adapters understate the batch length; keep every
                // byte after the PCI and let the decoders peel fixed widths
                complete.push(frame.bytes[1..].to_vec());
            }
            PCI_FIRST => {
                if frame.bytes.len() < 3 {
                    return Err(ParseError::ShortFrame(frame.bytes.len()));
                }
                let total =
                    (((frame.bytes[0] & 0x0F) as usize) << 8) | frame.bytes[1] as usize;
                let mut payload = Vec::with_capacity(total);
                payload.extend_from_slice(&frame.bytes[2..]);
                assembly = Some((total, payload));
                expected_seq = 1;
            }
            PCI_CONSECUTIVE => {
                let Some((total, payload)) = assembly.as_mut() else {
                    return Err(ParseError::BadSequence {
                        expected: 0,
                        got: frame.bytes[0] & 0x0F,
                    });
                };
                let seq = frame.bytes[0] & 0x0F;
                if seq != expected_seq {
                    return Err(ParseError::BadSequence {
                        expected: expected_seq,
                        got: seq,
                    });
                }
                expected_seq = (expected_seq + 1) % 0x10;
                payload.extend_from_slice(&frame.bytes[1..]);

                if payload.len() >= *total {
                    let (total, mut payload) = assembly.take().unwrap();
                    payload.truncate(total);
                    complete.push(payload);
                }
            }
            PCI_FLOW_CONTROL => {
                // the adapter handles flow control; nothing to do
            }
            other => {
                warn!(pci = other, "unknown PCI nibble, frame skipped");
            }
        }
    }

    if let Some((total, payload)) = assembly {
        if payload.len() < total {
            return Err(ParseError::ShortFrame(payload.len()));
        }
        let mut payload = payload;
        payload.truncate(total);
        complete.push(payload);
    }

    if complete.is_empty() {
        return Err(ParseError::NoData);
    }
    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EcuId;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn parse(raw: &[&str]) -> Result<Vec<Message>, ParseError> {
        CanParser::default().parse(&lines(raw), &EcuMap::new())
    }

    #[test]
    fn single_frame_with_header() {
        let messages = parse(&["7E8 03 41 0D 32"]).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].ecu, EcuId::Engine);
        assert_eq!(messages[0].data, vec![0x41, 0x0D, 0x32]);
    }

    #[test]
    fn batched_single_frame_keeps_all_data_bytes() {
        let messages = parse(&["7E8 04 41 0C 0F A0 0D 32"]).unwrap();
        assert_eq!(messages[0].data, vec![0x41, 0x0C, 0x0F, 0xA0, 0x0D, 0x32]);
    }

    #[test]
    fn vin_multi_frame_reassembles() {
        let messages = parse(&[
            "7E8 10 14 49 02 01 31 47 31",
            "7E8 21 4A 43 35 34 34 34 52",
            "7E8 22 37 32 35 32 33 36 37",
        ])
        .unwrap();
        assert_eq!(messages.len(), 1);
        let data = &messages[0].data;
        assert_eq!(data.len(), 0x14);
        assert_eq!(&data[..3], &[0x49, 0x02, 0x01]);
        let vin: String = data[3..].iter().map(|&b| b as char).collect();
        assert_eq!(vin, "1G1JC5444R7252367");
    }

    #[test]
    fn sequence_gap_is_rejected() {
        let err = parse(&[
            "7E8 10 14 49 02 01 31 47 31",
            "7E8 22 37 32 35 32 33 36 37",
        ])
        .unwrap_err();
        assert_eq!(err, ParseError::BadSequence { expected: 1, got: 2 });
    }

    #[test]
    fn sequence_wraps_past_fifteen() {
        // 16 consecutive frames force the 0xF -> 0x0 wrap: 6 + 16 * 7 = 0x76
        let mut raw = vec!["7E8 10 76 49 02 01 31 47 31".to_string()];
        for i in 1..=16 {
            raw.push(format!("7E8 2{:X} 41 41 41 41 41 41 41", i % 16));
        }
        let messages = CanParser::default().parse(&raw, &EcuMap::new()).unwrap();
        assert_eq!(messages[0].data.len(), 0x76);
    }

    #[test]
    fn shuffled_consecutive_frames_are_rejected() {
        // any permutation of the in-order sequence must fail
        let err = parse(&[
            "7E8 10 14 49 02 01 31 47 31",
            "7E8 22 37 32 35 32 33 36 37",
            "7E8 21 4A 43 35 34 34 34 52",
        ])
        .unwrap_err();
        assert!(matches!(err, ParseError::BadSequence { .. }));
    }

    #[test]
    fn incomplete_reassembly_is_an_error() {
        let err = parse(&["7E8 10 14 49 02 01 31 47 31"]).unwrap_err();
        assert!(matches!(err, ParseError::ShortFrame(_)));
    }

    #[test]
    fn surplus_bytes_past_declared_length_are_discarded() {
        let messages = parse(&[
            "7E8 10 0A 49 02 01 31 47 31",
            "7E8 21 4A 43 35 34 34 34 52",
        ])
        .unwrap();
        assert_eq!(messages[0].data.len(), 0x0A);
    }

    #[test]
    fn twenty_nine_bit_headers_parse() {
        let messages = parse(&["18DAF110 03 41 0D 32"]).unwrap();
        assert_eq!(messages[0].ecu, EcuId::Engine);
        assert_eq!(messages[0].data, vec![0x41, 0x0D, 0x32]);
    }

    #[test]
    fn unparseable_header_is_rejected_not_guessed() {
        // even length fits neither the 3- nor the 8-character id layout
        let err = parse(&["41 0D 32"]).unwrap_err();
        assert!(matches!(err, ParseError::BadHeader(_)));
    }

    #[test]
    fn flow_control_frames_are_ignored() {
        let messages = parse(&["7E8 30 00 00", "7E8 03 41 0D 32"]).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn two_ecus_answer_independently() {
        let mut map = EcuMap::new();
        map.insert(0x7E8, EcuId::Engine);
        map.insert(0x7E9, EcuId::Transmission);
        let messages = CanParser::default()
            .parse(
                &lines(&["7E8 06 41 00 BE 3F A8 13", "7E9 06 41 00 80 00 00 01"]),
                &map,
            )
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0].ecu, messages[1].ecu);
    }

    #[test]
    fn headerless_single_frame_is_engine() {
        let parser = CanParser { headers: false };
        let messages = parser
            .parse(&lines(&["41 0D 32"]), &EcuMap::new())
            .unwrap();
        assert_eq!(messages[0].ecu, EcuId::Engine);
        assert_eq!(messages[0].data, vec![0x41, 0x0D, 0x32]);
    }

    #[test]
    fn headerless_trouble_codes_get_placeholder_count() {
        let parser = CanParser { headers: false };
        let messages = parser
            .parse(&lines(&["43 01 33 00 00 00 00"]), &EcuMap::new())
            .unwrap();
        assert_eq!(
            messages[0].data,
            vec![0x43, 0x00, 0x01, 0x33, 0x00, 0x00, 0x00, 0x00]
        );
    }
}
