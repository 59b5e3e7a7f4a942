//! BLAKE3 file digests for out-of-band comparison
//!
//! Nothing here travels over the wire. Operators can print the digest on
//! both ends and compare them by eye.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake3::Hasher;

use crate::CHUNK_SIZE;

/// Hex BLAKE3 digest of the file at `path`, read in chunks
pub fn file_digest(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}
