//! tcpush Core - one-shot file pushes over a raw TCP stream
//!
//! A [`sender`] reads a local file in fixed-size chunks and writes them to a
//! connection; a [`receiver`] accepts exactly one connection and writes what
//! arrives to a destination file. The wire format is the file's bytes and
//! nothing else: end of transfer is the sender closing the connection.
//!
//! Everything is blocking I/O on the calling thread. There is no async
//! runtime, no framing, no acknowledgement and no retry.

pub mod auth;
pub mod config;
pub mod copy;
pub mod digest;
pub mod error;
pub mod io;
pub mod progress;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod transform;
pub mod types;

pub use auth::{AllowAll, CredentialVerifier, StaticCredentials};
pub use config::{AuthConfig, Config, ConfigError, ReceiverConfig, SenderConfig};
pub use error::*;
pub use receiver::{receive_file, ReceiveOptions, Receiver};
pub use sender::{send_file, SendOptions};
pub use session::{SessionState, TransferSession};
pub use transform::{transform_file, XorTransform};
pub use types::*;

/// Chunk size in bytes (8 KB), used for every read and write of a session
pub const CHUNK_SIZE: usize = 8192;

/// Default TCP port for both peers
pub const DEFAULT_PORT: u16 = 8080;

/// Listen backlog for the receiver's socket
pub const LISTEN_BACKLOG: i32 = 5;

/// Destination file used when the receiver is not given one
pub const DEFAULT_DESTINATION: &str = "received_file.txt";
