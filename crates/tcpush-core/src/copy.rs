//! Chunked copy shared by the send and receive paths
//!
//! Reads at most `chunk_size` bytes at a time and writes each chunk in full
//! before reading the next. A zero-length read ends the copy. Errors keep the
//! side they came from and how much had already been written, since the two
//! sides mean different things to the caller (a read error on a socket may be
//! a peer reset, a write error on a socket is a failed send).

use std::io::{self, Read, Write};

use crate::progress::TransferProgressTracker;
use crate::types::ByteCount;

/// Failure inside [`copy_chunks`]
#[derive(Debug)]
pub enum CopyError {
    Read { copied: ByteCount, source: io::Error },
    Write { copied: ByteCount, source: io::Error },
}

impl CopyError {
    pub fn copied(&self) -> ByteCount {
        match self {
            CopyError::Read { copied, .. } | CopyError::Write { copied, .. } => *copied,
        }
    }

    pub fn into_io(self) -> io::Error {
        match self {
            CopyError::Read { source, .. } | CopyError::Write { source, .. } => source,
        }
    }
}

/// Copy `reader` into `writer` one chunk at a time until `reader` reports EOF.
///
/// Returns the number of bytes written. Every chunk is recorded on `tracker`.
pub fn copy_chunks<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    tracker: &mut TransferProgressTracker,
) -> Result<ByteCount, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut copied = ByteCount::ZERO;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(CopyError::Read { copied, source }),
        };

        writer
            .write_all(&buf[..n])
            .map_err(|source| CopyError::Write { copied, source })?;

        copied += n as u64;
        tracker.record_chunk(n as u64);
    }

    writer
        .flush()
        .map_err(|source| CopyError::Write { copied, source })?;

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out data, then fails with `kind`
    struct FailingReader {
        data: Cursor<Vec<u8>>,
        kind: io::ErrorKind,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(self.kind, "injected"));
            }
            Ok(n)
        }
    }

    /// Writer that accepts `limit` bytes, then fails
    struct LimitedWriter {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for LimitedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() >= self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "full"));
            }
            let n = buf.len().min(self.limit - self.written.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn tracker() -> TransferProgressTracker {
        TransferProgressTracker::new("test", None)
    }

    #[test]
    fn test_copy_in_chunks() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut out = Vec::new();
        let mut tracker = tracker();

        let copied = copy_chunks(&mut Cursor::new(&data), &mut out, 8192, &mut tracker).unwrap();

        assert_eq!(copied, ByteCount(20_000));
        assert_eq!(out, data);
        // 8192 + 8192 + 3616
        assert_eq!(tracker.chunks_done(), 3);
    }

    #[test]
    fn test_copy_empty_input() {
        let mut out = Vec::new();
        let mut tracker = tracker();
        let copied = copy_chunks(&mut io::empty(), &mut out, 8192, &mut tracker).unwrap();
        assert_eq!(copied, ByteCount::ZERO);
        assert!(out.is_empty());
        assert_eq!(tracker.chunks_done(), 0);
    }

    #[test]
    fn test_read_error_keeps_copied_count() {
        let mut reader = FailingReader {
            data: Cursor::new(vec![7u8; 100]),
            kind: io::ErrorKind::ConnectionReset,
        };
        let mut out = Vec::new();

        let err = copy_chunks(&mut reader, &mut out, 64, &mut tracker()).unwrap_err();
        match err {
            CopyError::Read { copied, ref source } => {
                assert_eq!(copied, ByteCount(100));
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected read error, got {:?}", other),
        }
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn test_write_error_stops_copy() {
        let mut writer = LimitedWriter {
            written: Vec::new(),
            limit: 100,
        };
        let err = copy_chunks(
            &mut Cursor::new(vec![1u8; 1000]),
            &mut writer,
            64,
            &mut tracker(),
        )
        .unwrap_err();

        assert!(matches!(err, CopyError::Write { .. }));
        // First chunk of 64 landed; the second failed part-way
        assert_eq!(err.copied(), ByteCount(64));
        assert_eq!(err.into_io().kind(), io::ErrorKind::BrokenPipe);
    }
}
