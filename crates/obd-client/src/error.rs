//! Client-level error types

use elm327::{ParseError, ProtocolError, SessionError};
use obd_pids::DecodeError;
use thiserror::Error;

/// Errors surfaced by the public operations
#[derive(Debug, Error)]
pub enum ObdError {
    /// The adapter never became usable
    #[error("adapter connection failed: {0}")]
    AdapterConnect(#[source] SessionError),

    /// Protocol negotiation exhausted its candidates
    #[error(transparent)]
    NoProtocol(#[from] ProtocolError),

    /// A specific command could not be completed
    #[error("command {command} failed: {source}")]
    CommandFailed {
        command: &'static str,
        #[source]
        source: SessionError,
    },

    /// The vehicle answered the request with nothing
    #[error("vehicle returned no data")]
    NoData,

    /// Mode 03 scan did not produce a usable response
    #[error("trouble code scan failed")]
    ScanFailed,

    /// Mode 04 clear was not acknowledged
    #[error("trouble code clear failed")]
    ClearFailed,

    /// The operation was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
