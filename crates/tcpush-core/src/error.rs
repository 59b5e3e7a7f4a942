//! Error types for tcpush transfers

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ByteCount, Endpoint, FileRole, IoDirection};

/// Terminal failure of one transfer session.
///
/// Every variant keeps the operation that was attempted and the OS error, so
/// the caller can log it without further context. None of them are retried.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("could not create a socket for {endpoint}: {source}")]
    Socket {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("could not bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("could not accept a connection on port {port}: {source}")]
    Accept {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("could not open {role} file {path:?}: {source}")]
    FileOpen {
        role: FileRole,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{direction} failed after {transferred} bytes: {source}")]
    TransferIo {
        direction: IoDirection,
        transferred: ByteCount,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// Caller-facing status code for this failure
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from(self)
    }

    /// Bytes already moved when the failure happened (zero before the data loop)
    pub fn transferred(&self) -> ByteCount {
        match self {
            TransferError::TransferIo { transferred, .. } => *transferred,
            _ => ByteCount::ZERO,
        }
    }
}

/// Numeric result codes reported by the command-line front end.
///
/// Codes `-1` to `-5` are the sender's; the receiver's start at `-6`.
/// These are local status signals and never travel over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,

    // Sender (-1..-5)
    SourceMissing = -1,
    SocketCreate = -2,
    Connect = -3,
    SourceOpen = -4,
    SendFailed = -5,

    // Receiver (-6..-9)
    Bind = -6,
    Accept = -7,
    DestinationOpen = -8,
    ReceiveFailed = -9,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Process exit status for this code (its absolute value)
    pub fn exit_status(self) -> u8 {
        (self as i32).unsigned_abs() as u8
    }
}

impl From<&TransferError> for StatusCode {
    fn from(e: &TransferError) -> Self {
        match e {
            TransferError::Socket { .. } => StatusCode::SocketCreate,
            TransferError::Connect { .. } => StatusCode::Connect,
            TransferError::Bind { .. } => StatusCode::Bind,
            TransferError::Accept { .. } => StatusCode::Accept,
            TransferError::FileOpen {
                role: FileRole::Source,
                source,
                ..
            } => {
                if source.kind() == io::ErrorKind::NotFound {
                    StatusCode::SourceMissing
                } else {
                    StatusCode::SourceOpen
                }
            }
            TransferError::FileOpen {
                role: FileRole::Destination,
                ..
            } => StatusCode::DestinationOpen,
            TransferError::TransferIo { direction, .. } => match direction {
                IoDirection::Send => StatusCode::SendFailed,
                IoDirection::Receive => StatusCode::ReceiveFailed,
            },
        }
    }
}

/// Endpoint parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("missing ':' between host and port in {0:?}")]
    MissingPort(String),

    #[error("empty host in {0:?}")]
    EmptyHost(String),

    #[error("invalid port {0:?} (expected 1-65535)")]
    InvalidPort(String),
}

/// Errors from the XOR transform
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("transform key must not be empty")]
    EmptyKey,

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
