//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by byte-level adapter transports
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation attempted before `connect` succeeded
    #[error("transport is not connected")]
    NotConnected,

    /// Connection establishment failed
    #[error("connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// The host suspended the link (BLE central moved to background)
    #[error("transport suspended by host")]
    Backgrounded,

    /// No delimiter arrived within the allotted time
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// Underlying I/O failure
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad transport configuration
    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Whether the error leaves the link unusable
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Timeout(_))
    }
}
