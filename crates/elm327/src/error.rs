//! Session, protocol and parse error types

use obd_transport::TransportError;
use thiserror::Error;

/// Link-level failures reported by the adapter itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkErrorKind {
    /// `STOPPED`: the adapter aborted the request
    Stopped,
    /// `BUS INIT: ERROR`: the vehicle bus did not initialize
    BusInit,
    /// `CAN ERROR`: wire-level CAN failure
    Can,
}

/// Errors from the adapter dialogue
#[derive(Debug, Error)]
pub enum SessionError {
    /// A command is already in flight on this adapter
    #[error("adapter busy: a command is already in flight")]
    AdapterBusy,

    /// The adapter answered with something no retry will fix
    #[error("invalid adapter response: {0:?}")]
    InvalidResponse(String),

    /// The adapter reported a bus failure
    #[error("link error: {0:?}")]
    Link(LinkErrorKind),

    /// An init step did not get its expected acknowledgement
    #[error("adapter initialization failed at {0}")]
    AdapterInitFailed(String),

    /// The in-flight command was cancelled by the caller
    #[error("command cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Whether resending the same command can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Link(_) | SessionError::Transport(TransportError::Timeout(_))
        )
    }
}

/// Errors from protocol negotiation
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Every candidate protocol was probed without a valid `0100` reply
    #[error("no OBD-II protocol found after exhausting candidates")]
    NoProtocolFound,

    /// `ATDPN` returned a protocol id outside the known set
    #[error("adapter reported unknown protocol id {0:?}")]
    UnknownProtocol(char),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors from frame parsing and reassembly
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A frame is too short to carry its declared structure
    #[error("frame too short: {0} bytes")]
    ShortFrame(usize),

    /// Consecutive-frame sequence numbers are not contiguous
    #[error("bad frame sequence: expected {expected}, got {got}")]
    BadSequence { expected: u8, got: u8 },

    /// A line could not be split into header and payload under any known layout
    #[error("unparseable frame header: {0:?}")]
    BadHeader(String),

    /// The response carried no frames at all
    #[error("no data in response")]
    NoData,
}
