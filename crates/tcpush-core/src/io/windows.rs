//! Windows transport.
//!
//! Socket setup comes from the trait's portable methods; the send path
//! currently goes through the fallback copy.

use std::fs::File;
use std::net::TcpStream;

use super::fallback::FallbackTransport;
use super::Transport;
use crate::copy::CopyError;
use crate::progress::TransferProgressTracker;
use crate::types::ByteCount;

/// Windows transport.
pub struct WindowsTransport {
    fallback: FallbackTransport,
}

impl WindowsTransport {
    pub fn new() -> Self {
        Self {
            fallback: FallbackTransport::new(),
        }
    }
}

impl Default for WindowsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WindowsTransport {
    fn send(
        &self,
        file: &mut File,
        stream: &mut TcpStream,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError> {
        // TODO: Implement using TransmitFile
        self.fallback.send(file, stream, chunk_size, tracker)
    }

    fn name(&self) -> &'static str {
        "Windows (fallback)"
    }
}
