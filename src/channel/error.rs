//! Channel error types
//!
//! These never escape the public channel API: every failure is absorbed into
//! a reconnect or a dropped frame. They exist for logging and for the
//! `Transport` seam.

use thiserror::Error;

/// Errors raised by a transport while opening or running a connection
#[derive(Error, Debug)]
pub enum TransportError {
    /// The endpoint could not be derived from the page URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The socket could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors raised while decoding or encoding a wire frame
#[derive(Error, Debug)]
pub enum FrameError {
    /// Frame is not a JSON envelope
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Binary frames are not part of the protocol
    #[error("Unexpected binary frame ({0} bytes)")]
    Binary(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");

        let err = FrameError::Binary(12);
        assert_eq!(err.to_string(), "Unexpected binary frame (12 bytes)");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let frame_err: FrameError = json_err.into();
        assert!(matches!(frame_err, FrameError::InvalidJson(_)));
    }
}
