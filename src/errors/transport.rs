use thiserror::Error;

use super::{IoOperation, RtsError};

/// Failures from the underlying byte stream (serial port or TCP socket).
///
/// Worker code maps every variant here onto the wire-level [`super::ErrorKind`]
/// taxonomy before it reaches a callback or sync waiter — this type only ever
/// surfaces through `Result` returns from transport/construction code.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("serial port error on {port}: {details}")]
    Serial {
        port: String,
        details: String,
        #[source]
        source: Option<serialport::Error>,
    },

    #[error("I/O error: {operation} failed - {details}")]
    Io {
        operation: IoOperation,
        details: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TCP connection to {addr} failed: {details}")]
    Connect { addr: String, details: String },

    #[error("RTS error: {0}")]
    Rts(#[from] RtsError),
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Serial {
            port: String::new(),
            details: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io {
            operation: match err.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => IoOperation::Read,
                std::io::ErrorKind::WriteZero => IoOperation::Write,
                _ => IoOperation::Control,
            },
            details: err.to_string(),
            source: err,
        }
    }
}
