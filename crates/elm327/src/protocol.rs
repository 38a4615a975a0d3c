//! OBD-II protocol identifiers
//!
//! The ELM327 numbers the in-vehicle protocols 1 through 9 (0 for
//! auto-select, A-C for vendor extensions). Protocols 6-9 are CAN and use
//! the ISO 15765 parser; everything below is "legacy" three-byte-header
//! framing.

use serde::{Deserialize, Serialize};

/// An in-vehicle diagnostic protocol as the ELM327 numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObdProtocol {
    /// Let the adapter search (`ATSP0`)
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (5 baud init)
    Kwp5Baud,
    /// ISO 14230-4 KWP (fast init)
    KwpFast,
    /// ISO 15765-4 CAN, 11-bit id, 500 kbaud
    Can11Bit500K,
    /// ISO 15765-4 CAN, 29-bit id, 500 kbaud
    Can29Bit500K,
    /// ISO 15765-4 CAN, 11-bit id, 250 kbaud
    Can11Bit250K,
    /// ISO 15765-4 CAN, 29-bit id, 250 kbaud
    Can29Bit250K,
    /// Adapter reported something outside the standard set
    Unknown,
}

impl ObdProtocol {
    /// The single hex digit the ELM327 uses for this protocol
    pub fn elm_id(&self) -> Option<char> {
        Some(match self {
            ObdProtocol::Auto => '0',
            ObdProtocol::J1850Pwm => '1',
            ObdProtocol::J1850Vpw => '2',
            ObdProtocol::Iso9141_2 => '3',
            ObdProtocol::Kwp5Baud => '4',
            ObdProtocol::KwpFast => '5',
            ObdProtocol::Can11Bit500K => '6',
            ObdProtocol::Can29Bit500K => '7',
            ObdProtocol::Can11Bit250K => '8',
            ObdProtocol::Can29Bit250K => '9',
            ObdProtocol::Unknown => return None,
        })
    }

    /// Parse an `ATDPN` reply digit; a leading `A` means the adapter
    /// auto-selected and is stripped by the caller.
    pub fn from_elm_id(id: char) -> Option<Self> {
        Some(match id {
            '0' => ObdProtocol::Auto,
            '1' => ObdProtocol::J1850Pwm,
            '2' => ObdProtocol::J1850Vpw,
            '3' => ObdProtocol::Iso9141_2,
            '4' => ObdProtocol::Kwp5Baud,
            '5' => ObdProtocol::KwpFast,
            '6' => ObdProtocol::Can11Bit500K,
            '7' => ObdProtocol::Can29Bit500K,
            '8' => ObdProtocol::Can11Bit250K,
            '9' => ObdProtocol::Can29Bit250K,
            _ => return None,
        })
    }

    /// The `ATSP` command selecting this protocol
    pub fn select_command(&self) -> Option<String> {
        self.elm_id().map(|id| format!("ATSP{id}"))
    }

    /// Whether responses use ISO 15765 (CAN) framing
    pub fn is_can(&self) -> bool {
        matches!(
            self,
            ObdProtocol::Can11Bit500K
                | ObdProtocol::Can29Bit500K
                | ObdProtocol::Can11Bit250K
                | ObdProtocol::Can29Bit250K
        )
    }

    /// Whether the protocol uses 29-bit CAN arbitration ids
    pub fn is_extended_can(&self) -> bool {
        matches!(self, ObdProtocol::Can29Bit500K | ObdProtocol::Can29Bit250K)
    }

    /// The candidates tried during manual fallback, in ELM327 numbering order
    pub fn manual_candidates() -> &'static [ObdProtocol] {
        &[
            ObdProtocol::J1850Pwm,
            ObdProtocol::J1850Vpw,
            ObdProtocol::Iso9141_2,
            ObdProtocol::Kwp5Baud,
            ObdProtocol::KwpFast,
            ObdProtocol::Can11Bit500K,
            ObdProtocol::Can29Bit500K,
            ObdProtocol::Can11Bit250K,
            ObdProtocol::Can29Bit250K,
        ]
    }
}

impl Default for ObdProtocol {
    fn default() -> Self {
        ObdProtocol::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elm_ids_round_trip() {
        for &protocol in ObdProtocol::manual_candidates() {
            let id = protocol.elm_id().unwrap();
            assert_eq!(ObdProtocol::from_elm_id(id), Some(protocol));
        }
    }

    #[test]
    fn select_commands_follow_numbering() {
        assert_eq!(ObdProtocol::Auto.select_command().unwrap(), "ATSP0");
        assert_eq!(ObdProtocol::Can11Bit500K.select_command().unwrap(), "ATSP6");
        assert!(ObdProtocol::Unknown.select_command().is_none());
    }

    #[test]
    fn can_split_is_six_through_nine() {
        assert!(!ObdProtocol::KwpFast.is_can());
        assert!(ObdProtocol::Can11Bit500K.is_can());
        assert!(ObdProtocol::Can29Bit250K.is_extended_can());
        assert!(!ObdProtocol::Can11Bit250K.is_extended_can());
    }
}
