//! Repeating-key XOR byte transform
//!
//! **Not encryption.** XOR with a short repeating key is trivially broken
//! (known plaintext reveals the key, and repeated structure survives). It is
//! kept as an illustrative, self-inverse transform: applying it twice with
//! the same key restores the input. It provides no confidentiality and no
//! integrity, and nothing in tcpush relies on it for either.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::info;

use crate::error::TransformError;
use crate::types::ByteCount;
use crate::CHUNK_SIZE;

/// Streaming repeating-key XOR.
///
/// The key position carries over between calls to [`apply`](Self::apply),
/// so feeding a buffer in pieces gives the same output as feeding it whole.
#[derive(Debug, Clone)]
pub struct XorTransform {
    key: Vec<u8>,
    pos: usize,
}

impl XorTransform {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, TransformError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(TransformError::EmptyKey);
        }
        Ok(Self {
            key: key.to_vec(),
            pos: 0,
        })
    }

    /// XOR `buf` in place, continuing from where the previous call stopped
    pub fn apply(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte ^= self.key[self.pos];
            self.pos = (self.pos + 1) % self.key.len();
        }
    }

    /// Start again from the first key byte
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

/// Rewrite the file at `path` in place with the XOR transform.
///
/// Works chunk by chunk, so memory use does not depend on file size.
/// Running it again with the same key restores the original content.
pub fn transform_file(path: impl AsRef<Path>, key: &[u8]) -> Result<ByteCount, TransformError> {
    let path = path.as_ref();
    let mut xor = XorTransform::new(key)?;
    let io_err = |source: io::Error| TransformError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(io_err)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_err(e)),
        };

        xor.apply(&mut buf[..n]);
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        file.write_all(&buf[..n]).map_err(io_err)?;
        offset += n as u64;
    }
    file.flush().map_err(io_err)?;

    info!("Transformed {:?} ({} bytes)", path, offset);
    Ok(ByteCount(offset))
}
