//! Fallback transport using standard Rust APIs.

use std::fs::File;
use std::net::TcpStream;

use super::Transport;
use crate::copy::{copy_chunks, CopyError};
use crate::progress::TransferProgressTracker;
use crate::types::ByteCount;

/// Portable transport: the send path is a buffered chunk copy.
pub struct FallbackTransport;

impl FallbackTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FallbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FallbackTransport {
    fn send(
        &self,
        file: &mut File,
        stream: &mut TcpStream,
        chunk_size: usize,
        tracker: &mut TransferProgressTracker,
    ) -> Result<ByteCount, CopyError> {
        copy_chunks(file, stream, chunk_size, tracker)
    }

    fn name(&self) -> &'static str {
        "Fallback (buffered copy)"
    }
}
