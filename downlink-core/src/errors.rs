//! Downlink error types with granular categories

use thiserror::Error;

/// Top-level error type for all downlink operations
#[derive(Debug, Error)]
pub enum DownlinkError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transmit error: {0}")]
    Transmit(#[from] TransmitError),
}

/// Pixel codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("continuous-mode stream too short: need {need} bytes, got {got}")]
    TruncatedContinuousStream { need: usize, got: usize },

    #[error("header mode found only {found} of {required} markers")]
    InsufficientHeaders { found: usize, required: usize },
}

/// Transmitter-side errors. Surfaced upward; the transmitter aborts the
/// frame in progress but survives to the next tick.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("raw frame source I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("raw frame source yielded a short read of {got} bytes (expected {expected})")]
    ShortFrame { got: usize, expected: usize },

    #[error("datagram sink disconnected")]
    SinkDisconnected,
}

/// Result type alias for downlink operations
pub type Result<T> = std::result::Result<T, DownlinkError>;
