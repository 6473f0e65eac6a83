//! Error types for alu-uart.
//!
//! Three layers:
//! - [`ParseError`]: bad user input, always recoverable, nothing touches the wire
//! - [`TransportError`]: failures on the byte stream during one request
//! - [`AluError`]: everything a caller of the crate can see

use thiserror::Error;

/// Rejection of a textual command before anything is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Operation name is not in the opcode table.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// Operand token is not a decimal, `0x`, `0b` or `0o` literal.
    #[error("invalid operand '{0}': expected a decimal or 0x-prefixed hex number")]
    InvalidOperand(String),

    /// Operand does not fit in 8 bits.
    #[error("operand {0} out of range (0-255)")]
    OutOfRange(u64),

    /// Shift count does not fit in the two packed bits.
    #[error("shift amount {0} out of range (0-3)")]
    ShiftAmountOutOfRange(u64),

    /// A command line did not have exactly three tokens.
    #[error("expected <operation> <operand_a> <operand_b>, got {0} token(s)")]
    WrongArity(usize),
}

/// Failure on the byte stream while sending a frame or waiting for the reply.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Write or flush failed. The session must be closed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// No reply byte arrived before the deadline.
    #[error("no response from device within {0:?}")]
    Timeout(std::time::Duration),

    /// Read failed for a reason other than the deadline.
    #[error("read failed: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed")]
    ConnectionClosed,

    /// A previous write failed; no further frames are accepted.
    #[error("session is broken after a failed write")]
    SessionBroken,
}

impl TransportError {
    /// Whether the session can carry another command after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Main error type for all alu-uart operations.
#[derive(Debug, Error)]
pub enum AluError {
    /// Bad command text.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Failure during a request on an open session.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The serial port could not be enumerated or opened.
    #[error("cannot open serial port: {0}")]
    Open(#[from] tokio_serial::Error),

    /// Port enumeration returned nothing.
    #[error("no serial ports found")]
    NoPorts,

    /// I/O error outside a request (console, shutdown).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (result output only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AluError {
    /// Whether the current session has to be torn down after this error.
    ///
    /// Parse errors and timeouts leave the session usable.
    pub fn is_fatal_for_session(&self) -> bool {
        match self {
            AluError::Parse(_) | AluError::Json(_) => false,
            AluError::Transport(e) => !e.is_recoverable(),
            _ => true,
        }
    }
}

/// Result type alias using AluError.
pub type Result<T> = std::result::Result<T, AluError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_error_messages() {
        assert_eq!(
            ParseError::UnknownOperation("foo".into()).to_string(),
            "unknown operation 'foo'"
        );
        assert_eq!(
            ParseError::ShiftAmountOutOfRange(5).to_string(),
            "shift amount 5 out of range (0-3)"
        );
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let err = AluError::from(TransportError::Timeout(Duration::from_secs(2)));
        assert!(!err.is_fatal_for_session());
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err = AluError::from(TransportError::WriteFailed(io));
        assert!(err.is_fatal_for_session());
        assert!(AluError::from(TransportError::SessionBroken).is_fatal_for_session());
    }

    #[test]
    fn test_parse_error_is_not_fatal() {
        let err = AluError::from(ParseError::OutOfRange(300));
        assert!(!err.is_fatal_for_session());
    }
}
