//! Receiving side: accept one connection and write it to a file
//!
//! A [`Receiver`] is single-shot. It binds, accepts the first queued
//! connection, closes the listener, and copies the stream into the
//! destination until the peer closes. Connections queued behind the first one
//! are never serviced; they are reset when the listener closes. Receiving
//! again needs a fresh bind.
//!
//! The stream carries no length and no end marker. A peer that finished and
//! a peer whose connection died with a plain EOF look the same, and both are
//! reported as success with whatever arrived. Only an explicit reset from the
//! transport is surfaced, as [`Completion::PeerReset`]; the partial file is
//! kept in that case too.

use std::fs::File;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::ReceiverConfig;
use crate::copy::CopyError;
use crate::error::TransferError;
use crate::io::{platform_transport, Transport};
use crate::progress::TransferProgressTracker;
use crate::session::{SessionState, StateTracker, TransferSession};
use crate::types::{deadline, ByteCount, Completion, FileRole, IoDirection, ReceiveReport};
use crate::{CHUNK_SIZE, LISTEN_BACKLOG};

/// Receiver settings
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Local address to bind (all interfaces by default)
    pub bind: IpAddr,
    pub backlog: i32,
    pub chunk_size: usize,
    /// Per-read deadline; `None` waits for the peer indefinitely
    pub read_timeout: Option<Duration>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            backlog: LISTEN_BACKLOG,
            chunk_size: CHUNK_SIZE,
            read_timeout: None,
        }
    }
}

impl From<&ReceiverConfig> for ReceiveOptions {
    fn from(config: &ReceiverConfig) -> Self {
        Self {
            bind: config.bind,
            backlog: config.backlog,
            chunk_size: config.chunk_size,
            read_timeout: config.read_timeout(),
        }
    }
}

/// Bind on `port`, receive one file into `destination`, and return.
pub fn receive_file(
    port: u16,
    destination: impl AsRef<Path>,
    options: &ReceiveOptions,
) -> Result<ReceiveReport, TransferError> {
    Receiver::bind(port, options.clone())?.receive_into(destination)
}

/// A bound, not yet used, single-shot receiver
pub struct Receiver {
    transport: Box<dyn Transport>,
    listener: TcpListener,
    port: u16,
    options: ReceiveOptions,
    states: StateTracker,
}

impl Receiver {
    /// Bind with the platform transport. Port 0 asks the OS for a free port.
    pub fn bind(port: u16, options: ReceiveOptions) -> Result<Self, TransferError> {
        Self::bind_with(platform_transport(), port, options)
    }

    pub fn bind_with(
        transport: Box<dyn Transport>,
        port: u16,
        options: ReceiveOptions,
    ) -> Result<Self, TransferError> {
        let mut states = StateTracker::new("receive");
        states.advance(SessionState::Listening);

        let addr = SocketAddr::new(options.bind, port);
        let listener = match transport.listen(addr, options.backlog) {
            Ok(listener) => listener,
            Err(source) => {
                states.finish(false);
                return Err(TransferError::Bind { port, source });
            }
        };

        let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
        info!("Listening on {}:{} ({})", options.bind, port, transport.name());

        Ok(Self {
            transport,
            listener,
            port,
            options,
            states,
        })
    }

    /// The port actually bound
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one connection and write what it sends into `destination`,
    /// truncating any previous content.
    pub fn receive_into(
        self,
        destination: impl AsRef<Path>,
    ) -> Result<ReceiveReport, TransferError> {
        let Receiver {
            transport,
            listener,
            port,
            options,
            mut states,
        } = self;
        let destination = destination.as_ref();

        let result = run(transport.as_ref(), listener, port, &options, destination, &mut states);
        if let Err(e) = &result {
            warn!("receive on port {} failed: {}", port, e);
        }
        states.finish(result.is_ok());
        result
    }
}

fn run(
    transport: &dyn Transport,
    listener: TcpListener,
    port: u16,
    options: &ReceiveOptions,
    destination: &Path,
    states: &mut StateTracker,
) -> Result<ReceiveReport, TransferError> {
    let accepted = transport.accept(&listener);
    // One client per invocation: stop listening before touching the data.
    drop(listener);
    let (stream, peer) = accepted.map_err(|source| TransferError::Accept { port, source })?;
    info!("Client {} connected, receiving into {:?}", peer, destination);

    // Accepted; failures from here on belong to the transfer.
    stream
        .set_read_timeout(deadline(options.read_timeout))
        .map_err(|source| TransferError::TransferIo {
            direction: IoDirection::Receive,
            transferred: ByteCount::ZERO,
            source,
        })?;

    let file = File::create(destination).map_err(|source| TransferError::FileOpen {
        role: FileRole::Destination,
        path: destination.to_path_buf(),
        source,
    })?;

    states.advance(SessionState::Transferring);
    let started = Instant::now();
    let mut tracker = TransferProgressTracker::new("receive", None);
    let session = TransferSession::new(transport, stream, file, peer, options.chunk_size);

    let (bytes, completion) = match session.receive(&mut tracker) {
        Ok(bytes) => (bytes, Completion::PeerClosed),
        Err(CopyError::Read { copied, source }) if is_reset(&source) => {
            warn!(
                "connection from {} was reset after {} bytes; keeping partial file {:?}",
                peer, copied, destination
            );
            (copied, Completion::PeerReset)
        }
        Err(e) => {
            return Err(TransferError::TransferIo {
                direction: IoDirection::Receive,
                transferred: e.copied(),
                source: e.into_io(),
            })
        }
    };

    let report = ReceiveReport {
        peer,
        bytes,
        chunks: tracker.chunks_done(),
        elapsed: started.elapsed(),
        completion,
    };
    info!("{} -> {:?}", report.summary(), destination);
    Ok(report)
}

fn is_reset(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use crate::sender::{send_file, SendOptions};
    use crate::types::Endpoint;
    use std::io::Write;
    use std::net::TcpStream;
    use std::path::PathBuf;
    use std::thread;
    use tempfile::TempDir;

    fn loopback_options() -> ReceiveOptions {
        ReceiveOptions {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..ReceiveOptions::default()
        }
    }

    /// Start a receiver on an ephemeral port, writing to `destination`
    fn spawn_receiver(
        destination: PathBuf,
    ) -> (u16, thread::JoinHandle<Result<ReceiveReport, TransferError>>) {
        let receiver = Receiver::bind(0, loopback_options()).unwrap();
        let port = receiver.port();
        let handle = thread::spawn(move || receiver.receive_into(destination));
        (port, handle)
    }

    /// Full transfer of `data` through a sender and a receiver
    fn round_trip(dir: &TempDir, name: &str, data: &[u8]) -> (ReceiveReport, Vec<u8>) {
        let source = dir.path().join(format!("{}.src", name));
        let destination = dir.path().join(format!("{}.dst", name));
        std::fs::write(&source, data).unwrap();

        let (port, handle) = spawn_receiver(destination.clone());
        let sent = send_file(
            &source,
            &Endpoint::new("127.0.0.1", port),
            &SendOptions::default(),
        )
        .unwrap();
        let report = handle.join().unwrap().unwrap();

        assert_eq!(sent.bytes, ByteCount(data.len() as u64));
        (report, std::fs::read(&destination).unwrap())
    }

    #[test]
    fn test_round_trip_is_byte_exact() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..1_000_003u32).map(|i| (i.wrapping_mul(31) % 256) as u8).collect();

        let (report, received) = round_trip(&dir, "big", &data);

        assert_eq!(received, data);
        assert_eq!(report.bytes, ByteCount(data.len() as u64));
        assert!(report.is_clean());
    }

    #[test]
    fn test_empty_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let (report, received) = round_trip(&dir, "empty", &[]);

        assert!(received.is_empty());
        assert_eq!(report.bytes, ByteCount::ZERO);
        assert!(dir.path().join("empty.dst").exists());
    }

    #[test]
    fn test_byte_count_matches_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let (report, _) = round_trip(&dir, "count", &[9u8; 12_345]);

        let on_disk = std::fs::metadata(dir.path().join("count.dst")).unwrap().len();
        assert_eq!(report.bytes.get(), on_disk);
    }

    #[test]
    fn test_destination_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out.bin");
        std::fs::write(&destination, vec![1u8; 50_000]).unwrap();

        let (port, handle) = spawn_receiver(destination.clone());
        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(b"short").unwrap();
        drop(client);
        handle.join().unwrap().unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"short");
    }

    #[test]
    fn test_early_close_is_reported_as_success() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("partial.bin");
        let (port, handle) = spawn_receiver(destination.clone());

        // Promised 10_000 bytes, delivered 4_000, then a plain close
        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(&[7u8; 4_000]).unwrap();
        drop(client);

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.bytes, ByteCount(4_000));
        assert_eq!(report.completion, Completion::PeerClosed);
        assert_eq!(std::fs::read(&destination).unwrap().len(), 4_000);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reset_is_flagged_and_partial_file_kept() {
        use socket2::SockRef;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("reset.bin");
        let (port, handle) = spawn_receiver(destination.clone());

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(&[3u8; 4_000]).unwrap();
        // Linger of zero turns close into an RST
        SockRef::from(&client)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(client);

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.completion, Completion::PeerReset);
        assert!(!report.is_clean());
        assert!(report.bytes <= ByteCount(4_000));
        let on_disk = std::fs::metadata(&destination).unwrap().len();
        assert_eq!(report.bytes.get(), on_disk);
    }

    #[test]
    fn test_only_first_client_is_serviced() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("first.bin");
        let (port, handle) = spawn_receiver(destination.clone());

        let mut first = TcpStream::connect(("127.0.0.1", port)).unwrap();
        // Queued behind the first; may be refused or reset, never read
        if let Ok(mut second) = TcpStream::connect(("127.0.0.1", port)) {
            let _ = second.write_all(b"second client");
        }

        first.write_all(b"first client").unwrap();
        drop(first);

        let report = handle.join().unwrap().unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"first client");
        assert_eq!(report.bytes, ByteCount(12));

        // The invocation is over; nothing listens any more
        assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
    }

    #[test]
    fn test_bind_conflict() {
        let first = Receiver::bind(0, loopback_options()).unwrap();
        let err = match Receiver::bind(first.port(), loopback_options()) {
            Ok(_) => panic!("second bind on the same port should fail"),
            Err(e) => e,
        };

        assert!(matches!(err, TransferError::Bind { .. }));
        assert_eq!(err.status_code(), StatusCode::Bind);
    }

    #[test]
    fn test_destination_open_failure() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("no").join("such").join("dir.bin");
        let (port, handle) = spawn_receiver(destination.clone());

        let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let err = handle.join().unwrap().unwrap_err();
        drop(client);

        assert!(matches!(
            err,
            TransferError::FileOpen {
                role: FileRole::Destination,
                ..
            }
        ));
        assert_eq!(err.status_code(), StatusCode::DestinationOpen);
        assert!(!destination.exists());
    }

    #[test]
    fn test_zero_read_timeout_means_no_deadline() {
        let dir = TempDir::new().unwrap();
        let receiver = Receiver::bind(
            0,
            ReceiveOptions {
                read_timeout: Some(Duration::ZERO),
                ..loopback_options()
            },
        )
        .unwrap();
        let port = receiver.port();
        let destination = dir.path().join("zero.bin");
        let handle = thread::spawn({
            let destination = destination.clone();
            move || receiver.receive_into(destination)
        });

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(b"no deadline").unwrap();
        drop(client);

        let report = handle.join().unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(std::fs::read(&destination).unwrap(), b"no deadline");
    }

    #[test]
    fn test_read_timeout_is_a_receive_failure() {
        let dir = TempDir::new().unwrap();
        let receiver = Receiver::bind(
            0,
            ReceiveOptions {
                read_timeout: Some(Duration::from_millis(100)),
                ..loopback_options()
            },
        )
        .unwrap();
        let port = receiver.port();
        let destination = dir.path().join("stalled.bin");
        let handle = thread::spawn(move || receiver.receive_into(destination));

        // Connect and then say nothing
        let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let err = handle.join().unwrap().unwrap_err();
        drop(client);

        assert!(matches!(
            err,
            TransferError::TransferIo {
                direction: IoDirection::Receive,
                ..
            }
        ));
        assert_eq!(err.status_code(), StatusCode::ReceiveFailed);
    }

    #[test]
    fn test_connect_failure_leaves_no_artifact() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.bin");
        std::fs::write(&source, b"data").unwrap();
        let destination = dir.path().join("never.bin");

        let port = {
            let receiver = Receiver::bind(0, loopback_options()).unwrap();
            receiver.port()
        };

        let err = send_file(&source, &Endpoint::new("127.0.0.1", port), &SendOptions::default())
            .unwrap_err();
        assert!(matches!(err, TransferError::Connect { .. }));
        assert!(!destination.exists());
    }
}
