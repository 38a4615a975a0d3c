//! Frame parser for the pre-CAN protocols
//!
//! SAE J1850 (PWM/VPW), ISO 9141-2 and ISO 14230-4 responses share a
//! three-byte header: priority, receiver address, transmitter address. The
//! low three bits of the transmitter byte identify the ECU. Multi-frame
//! responses carry a one-based order byte inside the payload instead of a
//! transport-layer PCI.

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::frame::{clean_hex_lines, hex_to_bytes, min_hex, resolve_ecu, EcuMap, Message};

const MODE3_RESPONSE: u8 = 0x43;

/// One header-split legacy frame
#[derive(Debug, Clone)]
struct LegacyFrame {
    tx_addr: u8,
    payload: Vec<u8>,
}

/// Parser for the legacy (non-CAN) wire formats
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyParser {
    /// Accept the short sequence-less frames some software emulators emit
    pub emulator_mode: bool,
    /// The adapter appends the bus checksum byte to each line
    pub adapter_checksum: bool,
}

impl LegacyParser {
    /// Parse cleaned response lines into per-ECU messages
    pub fn parse(&self, lines: &[String], ecu_map: &EcuMap) -> Result<Vec<Message>, ParseError> {
        let min_len = if self.emulator_mode {
            min_hex::EMULATOR
        } else {
            min_hex::LEGACY
        };

        let mut groups: Vec<(u8, Vec<LegacyFrame>)> = Vec::new();
        for line in clean_hex_lines(lines, min_len, false) {
            let Some(frame) = self.split_frame(&line) else {
                continue;
            };
            match groups.iter_mut().find(|(tx, _)| *tx == frame.tx_addr) {
                Some((_, frames)) => frames.push(frame),
                None => groups.push((frame.tx_addr, vec![frame])),
            }
        }

        let mut messages = Vec::with_capacity(groups.len());
        for (tx_addr, frames) in groups {
            let data = self.reassemble(&frames)?;
            messages.push(Message {
                ecu: resolve_ecu(ecu_map, tx_addr as u32),
                data,
            });
        }
        Ok(messages)
    }

    /// Split one line into header and payload; out-of-bounds lines are noise
    fn split_frame(&self, line: &str) -> Option<LegacyFrame> {
        let mut bytes = hex_to_bytes(line);
        if !(4..=12).contains(&bytes.len()) {
            debug!(line, "legacy line outside frame bounds, skipped");
            return None;
        }
        if self.adapter_checksum {
            bytes.pop();
        }
        let tx_addr = bytes[2] & 0x07;
        Some(LegacyFrame {
            tx_addr,
            payload: bytes.split_off(3),
        })
    }

    fn reassemble(&self, frames: &[LegacyFrame]) -> Result<Vec<u8>, ParseError> {
        match frames {
            [] => Err(ParseError::NoData),
            [single] => Ok(self.single_frame(&single.payload)),
            many => self.multi_frame(many),
        }
    }

    fn single_frame(&self, payload: &[u8]) -> Vec<u8> {
        // Mode 03 responses have no count byte on the legacy bus; insert a
        // placeholder so the data layout matches the CAN shape
        if payload.first() == Some(&MODE3_RESPONSE) {
            let mut data = vec![MODE3_RESPONSE, 0x00];
            data.extend_from_slice(&payload[1..]);
            data
        } else {
            payload.to_vec()
        }
    }

    fn multi_frame(&self, frames: &[LegacyFrame]) -> Result<Vec<u8>, ParseError> {
        // trouble-code responses concatenate directly, no order bytes
        if frames[0].payload.first() == Some(&MODE3_RESPONSE) {
            let mut data = vec![MODE3_RESPONSE, 0x00];
            for frame in frames {
                data.extend_from_slice(frame.payload.get(1..).unwrap_or_default());
            }
            return Ok(data);
        }

        // some emulators send fixed 4- or 5-byte payloads with no order byte
        if self.emulator_mode && frames.iter().all(|f| matches!(f.payload.len(), 4 | 5)) {
            let mut data = Vec::new();
            for frame in frames {
                data.extend_from_slice(&frame.payload);
            }
            return Ok(data);
        }

        // order byte sits at payload index 2; frames must count up from 1
        let mut ordered: Vec<&LegacyFrame> = frames.iter().collect();
        for frame in &ordered {
            if frame.payload.len() < 4 {
                return Err(ParseError::ShortFrame(frame.payload.len()));
            }
        }
        ordered.sort_by_key(|f| f.payload[2]);

        let mut expected = 1u8;
        for frame in &ordered {
            let got = frame.payload[2];
            if got != expected {
                warn!(expected, got, "legacy multi-frame order violation");
                return Err(ParseError::BadSequence { expected, got });
            }
            expected = expected.wrapping_add(1);
        }

        let mut data = ordered[0].payload[..2].to_vec();
        for frame in &ordered {
            data.extend_from_slice(&frame.payload[3..]);
        }
        Ok(data)
    }
}
