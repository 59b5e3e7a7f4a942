//! macOS transport.
//!
//! Uses macOS's `sendfile()` for the send path. Unlike Linux, the macOS call
//! takes an explicit offset and does not move the file position, so the
//! offset is tracked here.
//!
//! ```c
//! int sendfile(int fd, int s, off_t offset, off_t *len,
//!              struct sf_hdtr *hdtr, int flags);
//! ```
//! `len` is both input (bytes to send) and output (bytes sent).

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;

use super::Transport;
use crate::copy::CopyError;
use crate::progress::TransferProgressTracker;
use crate::types::ByteCount;

/// macOS transport using sendfile for the send path.
pub struct MacOSTransport;

impl MacOSTransport {
    pub fn new() -> Self {
        Self
    }

    /// One sendfile call. Returns bytes sent, which may be non-zero even when
    /// the call was interrupted.
    fn sendfile_sync(file_fd: i32, socket_fd: i32, offset: i64, len: usize) -> io::Result<usize> {
        let mut sent: libc::off_t = len as libc::off_t;

        let result = unsafe {
            libc::sendfile(
                file_fd,
                socket_fd,
                offset,
                &mut sent,
                std::ptr::null_mut(),
                0,
            )
        };

        if result == -1 {
            let err = io::Error::last_os_error();
            let retriable = matches!(err.raw_os_error(), Some(libc::EINTR) | Some(libc::EAGAIN));
            if retriable && sent > 0 {
                return Ok(sent as usize);
            }
            return Err(err);
        }

        Ok(sent as usize)
    }
}

impl Default for MacOSTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MacOSTransport {
    fn send(
        &self,
        file: &mut File,
        stream: &mut TcpStream,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError> {
        let mut offset = file
            .stream_position()
            .map_err(|source| CopyError::Read {
                copied: ByteCount::ZERO,
                source,
            })?;
        let socket_fd = stream.as_raw_fd();
        let file_fd = file.as_raw_fd();
        let chunk_size = chunk_size.max(1);
        let mut sent = ByteCount::ZERO;

        loop {
            match Self::sendfile_sync(file_fd, socket_fd, offset as i64, chunk_size) {
                Ok(0) => break,
                Ok(n) => {
                    offset += n as u64;
                    sent += n as u64;
                    tracker.record_chunk(n as u64);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(CopyError::Write { copied: sent, source }),
            }
        }

        // Leave the file where a read loop would have left it
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| CopyError::Read { copied: sent, source })?;
        Ok(sent)
    }

    fn name(&self) -> &'static str {
        "macOS (sendfile)"
    }
}
