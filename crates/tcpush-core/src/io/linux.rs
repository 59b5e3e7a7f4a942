//! Linux transport.
//!
//! The send path uses sendfile(2), so file pages go to the socket without a
//! userspace copy. Each call moves at most one chunk and advances the file's
//! own offset, the same as a read/write loop would.
//!
//! `ssize_t sendfile(int out_fd, int in_fd, off_t *offset, size_t count);`

use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;

use tracing::debug;

use super::Transport;
use crate::copy::{copy_chunks, CopyError};
use crate::progress::TransferProgressTracker;
use crate::types::ByteCount;

/// Linux transport using sendfile for the send path.
///
/// `sendfile(2)` has no `MSG_NOSIGNAL` equivalent. When the peer has hung
/// up, a process that has not ignored `SIGPIPE` gets the signal instead of
/// an `EPIPE` error. Rust binaries ignore `SIGPIPE` at startup; hosts that
/// restore the default disposition should use `FallbackTransport`, whose
/// socket writes go through `send` with `MSG_NOSIGNAL`.
pub struct LinuxTransport;

impl LinuxTransport {
    pub fn new() -> Self {
        Self
    }

    /// One sendfile call from the file's current offset.
    fn sendfile_sync(socket_fd: i32, file_fd: i32, len: usize) -> io::Result<usize> {
        let result = unsafe { libc::sendfile(socket_fd, file_fd, std::ptr::null_mut(), len) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(result as usize)
        }
    }

    /// Drive `sendfile` (one call per chunk) until EOF. If the very first
    /// call says the file can't be sent this way, copy it through a buffer.
    fn send_with<F>(
        file: &mut File,
        stream: &mut TcpStream,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
        mut sendfile: F,
    ) -> Result<ByteCount, CopyError>
    where
        F: FnMut(usize) -> io::Result<usize>,
    {
        let chunk_size = chunk_size.max(1);
        let mut sent = ByteCount::ZERO;

        loop {
            match sendfile(chunk_size) {
                Ok(0) => return Ok(sent),
                Ok(n) => {
                    sent += n as u64;
                    tracker.record_chunk(n as u64);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if sent == ByteCount::ZERO && Self::unsupported(&e) => {
                    debug!("sendfile unsupported for this file ({}), copying instead", e);
                    return copy_chunks(file, stream, chunk_size, tracker);
                }
                Err(source) => return Err(CopyError::Write { copied: sent, source }),
            }
        }
    }

    /// sendfile refuses some inputs (pipes, some pseudo-files); those go through a buffer.
    fn unsupported(err: &io::Error) -> bool {
        matches!(err.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS))
    }
}

impl Default for LinuxTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LinuxTransport {
    fn send(
        &self,
        file: &mut File,
        stream: &mut TcpStream,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError> {
        let socket_fd = stream.as_raw_fd();
        let file_fd = file.as_raw_fd();
        Self::send_with(file, stream, chunk_size, tracker, |len| {
            Self::sendfile_sync(socket_fd, file_fd, len)
        })
    }

    fn name(&self) -> &'static str {
        "Linux (sendfile)"
    }
}
