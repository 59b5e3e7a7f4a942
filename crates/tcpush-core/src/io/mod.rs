//! Platform transport for one-shot TCP file transfers.
//!
//! [`Transport`] is the single seam between the sender/receiver logic and the
//! operating system: `connect`, `listen`, `accept`, `send`, `receive` and
//! `close`. The implementation is picked at build time by
//! [`platform_transport`]; nothing outside this module branches on the target.
//!
//! Socket setup is portable (socket2 + std) and lives in the trait's provided
//! methods. Only the file-to-socket `send` path differs per platform:
//! Linux and macOS use `sendfile(2)`, everything else copies through a buffer.

use std::fs::File;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::copy::{copy_chunks, CopyError};
use crate::error::TransferError;
use crate::progress::TransferProgressTracker;
use crate::types::{ByteCount, Endpoint};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

pub mod fallback;

/// Blocking socket and file plumbing for one transfer session.
pub trait Transport: Send + Sync {
    /// Copy `file` to `stream` from its current position to EOF, at most
    /// `chunk_size` bytes per call.
    fn send(
        &self,
        file: &mut File,
        stream: &mut TcpStream,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError>;

    /// Name of this backend for logging
    fn name(&self) -> &'static str;

    /// Open a stream connection to `endpoint`, trying each resolved address in turn.
    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Option<Duration>,
    ) -> Result<TcpStream, TransferError> {
        let addrs = endpoint.resolve().map_err(|source| TransferError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
        connect_any(endpoint, addrs, timeout, stream_socket)
    }

    /// Bind and listen on `addr` with the given backlog
    fn listen(&self, addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
        let socket = stream_socket(addr)?;
        // Rebinding right after a previous one-shot receiver must not hit TIME_WAIT.
        // Not on Windows, where SO_REUSEADDR lets a second listener take the port.
        #[cfg(unix)]
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;
        Ok(socket.into())
    }

    /// Accept the next queued connection
    fn accept(&self, listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
        listener.accept()
    }

    /// Copy `stream` into `file` until the peer closes the connection
    fn receive(
        &self,
        stream: &mut TcpStream,
        file: &mut File,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError> {
        copy_chunks(stream, file, chunk_size, tracker)
    }

    /// Signal end of stream to the peer and release the connection
    fn close(&self, stream: TcpStream) -> io::Result<()> {
        let result = match stream.shutdown(Shutdown::Write) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        };
        drop(stream);
        result
    }
}

/// A fresh TCP socket for `addr`'s address family
fn stream_socket(addr: SocketAddr) -> io::Result<Socket> {
    Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
}

/// Try `addrs` in order and return the first connection that succeeds.
///
/// An address whose socket can't be created (say an IPv6 address on a host
/// without IPv6) is skipped. The result is `Socket` only when no address got
/// as far as a connect attempt; otherwise the last connect error wins.
fn connect_any<F>(
    endpoint: &Endpoint,
    addrs: Vec<SocketAddr>,
    timeout: Option<Duration>,
    mut new_socket: F,
) -> Result<TcpStream, TransferError>
where
    F: FnMut(SocketAddr) -> io::Result<Socket>,
{
    let mut socket_err = None;
    let mut connect_err = None;

    for addr in addrs {
        let socket = match new_socket(addr) {
            Ok(socket) => socket,
            Err(e) => {
                debug!("no socket for {}: {}", addr, e);
                socket_err = Some(e);
                continue;
            }
        };

        let result = match timeout {
            Some(timeout) => socket.connect_timeout(&addr.into(), timeout),
            None => socket.connect(&addr.into()),
        };

        match result {
            Ok(()) => return Ok(socket.into()),
            Err(e) => {
                debug!("connect to {} failed: {}", addr, e);
                connect_err = Some(e);
            }
        }
    }

    let endpoint = endpoint.clone();
    match (connect_err, socket_err) {
        (Some(source), _) => Err(TransferError::Connect { endpoint, source }),
        (None, Some(source)) => Err(TransferError::Socket { endpoint, source }),
        (None, None) => Err(TransferError::Connect {
            endpoint,
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to connect to"),
        }),
    }
}

/// Get the best available transport for the current platform.
pub fn platform_transport() -> Box<dyn Transport> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxTransport::new())
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacOSTransport::new())
    }

    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsTransport::new())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Box::new(fallback::FallbackTransport::new())
    }
}
