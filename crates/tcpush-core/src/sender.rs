//! Sending side: push one local file to a listening peer
//!
//! The file is opened before any network activity, so a missing or
//! unreadable source never produces a connection attempt. After that the
//! session connects, streams the file in fixed-size chunks and shuts down
//! its write half. The receiver is never asked how much it got; success here
//! only means the whole file was handed to the connection without an error.

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::SenderConfig;
use crate::error::TransferError;
use crate::io::{platform_transport, Transport};
use crate::progress::TransferProgressTracker;
use crate::session::{SessionState, StateTracker, TransferSession};
use crate::types::{deadline, ByteCount, Endpoint, FileRole, IoDirection, SendReport};
use crate::CHUNK_SIZE;

/// Sender settings. The defaults reproduce the plain blocking behaviour:
/// 8 KB chunks and no deadlines.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub chunk_size: usize,
    pub connect_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            connect_timeout: None,
            write_timeout: None,
        }
    }
}

impl From<&SenderConfig> for SendOptions {
    fn from(config: &SenderConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            connect_timeout: config.connect_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// Send the file at `path` to `endpoint` using the platform transport.
pub fn send_file(
    path: impl AsRef<Path>,
    endpoint: &Endpoint,
    options: &SendOptions,
) -> Result<SendReport, TransferError> {
    let transport = platform_transport();
    send_file_with(transport.as_ref(), path.as_ref(), endpoint, options)
}

/// Send the file at `path` to `endpoint` through `transport`.
pub fn send_file_with(
    transport: &dyn Transport,
    path: &Path,
    endpoint: &Endpoint,
    options: &SendOptions,
) -> Result<SendReport, TransferError> {
    let mut states = StateTracker::new("send");
    let result = run(transport, path, endpoint, options, &mut states);
    if let Err(e) = &result {
        warn!("send of {:?} to {} failed: {}", path, endpoint, e);
    }
    states.finish(result.is_ok());
    result
}

fn run(
    transport: &dyn Transport,
    path: &Path,
    endpoint: &Endpoint,
    options: &SendOptions,
    states: &mut StateTracker,
) -> Result<SendReport, TransferError> {
    let (file, size) = open_source(path)?;

    states.advance(SessionState::Connecting);
    info!("Connecting to {} ({})", endpoint, transport.name());
    let stream = transport.connect(endpoint, deadline(options.connect_timeout))?;
    let peer = stream
        .peer_addr()
        .map_err(|source| TransferError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

    // The connection is up from here on; failures belong to the transfer.
    stream
        .set_write_timeout(deadline(options.write_timeout))
        .map_err(|source| TransferError::TransferIo {
            direction: IoDirection::Send,
            transferred: ByteCount::ZERO,
            source,
        })?;
    info!("Connected to {}, sending {:?} ({} bytes)", peer, path, size);

    states.advance(SessionState::Transferring);
    let started = Instant::now();
    let mut tracker = TransferProgressTracker::new("send", Some(size));
    let session = TransferSession::new(transport, stream, file, peer, options.chunk_size);

    let bytes = session
        .send(&mut tracker)
        .map_err(|e| TransferError::TransferIo {
            direction: IoDirection::Send,
            transferred: e.copied(),
            source: e.into_io(),
        })?;

    if bytes.get() != size {
        warn!(
            "{:?} changed while sending: {} bytes at open, {} bytes sent",
            path, size, bytes
        );
    }

    let report = SendReport {
        endpoint: endpoint.clone(),
        bytes,
        chunks: tracker.chunks_done(),
        elapsed: started.elapsed(),
    };
    info!("{}", report.summary());
    Ok(report)
}

/// Open the source for reading and return it with its size.
///
/// The path is checked before opening: `open` on a FIFO or some device
/// nodes blocks until another process shows up. The open handle is checked
/// again in case the path was swapped in between.
fn open_source(path: &Path) -> Result<(File, u64), TransferError> {
    let open_err = |source: io::Error| TransferError::FileOpen {
        role: FileRole::Source,
        path: path.to_path_buf(),
        source,
    };
    let not_regular = || io::Error::new(io::ErrorKind::InvalidInput, "not a regular file");

    if !std::fs::metadata(path).map_err(open_err)?.is_file() {
        return Err(open_err(not_regular()));
    }

    let file = File::open(path).map_err(open_err)?;
    let metadata = file.metadata().map_err(open_err)?;
    if !metadata.is_file() {
        return Err(open_err(not_regular()));
    }
    Ok((file, metadata.len()))
}
