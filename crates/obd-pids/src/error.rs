//! Decoder error types

use thiserror::Error;

/// Errors from turning response payload bytes into typed values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// Payload shorter than the decoder's fixed width
    #[error("insufficient payload: need {needed} bytes, got {got}")]
    InsufficientBytes { needed: usize, got: usize },

    /// Decoded value violates the command's declared range
    #[error("value {value} out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// The command's decoder id has no implementation for this payload
    #[error("decoder not applicable to this response")]
    UnsupportedDecoder,

    /// Payload bytes contradict the encoding (bad flag byte, odd pair count)
    #[error("malformed payload: {0}")]
    Invalid(&'static str),
}
