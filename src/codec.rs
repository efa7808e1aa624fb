//! Streaming raw DEFLATE with CRC32, over fixed-size buffers.
//!
//! Payloads are bare DEFLATE streams with no zlib or gzip wrapper. Both
//! directions move data through an 8 KiB buffer, so memory use does not
//! depend on entry size.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::checksum::{HashingReader, HashingWriter};
use crate::error::{Error, Result};

/// Size of the copy buffer used by every streaming loop in the crate.
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Compression effort, 1 (fastest) to 9 (smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(u32);

impl Level {
    pub const FASTEST: Level = Level(1);
    pub const BEST: Level = Level(9);

    pub fn new(level: u32) -> Result<Self> {
        if (1..=9).contains(&level) {
            Ok(Level(level))
        } else {
            Err(Error::InvalidLevel(level))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Level(6)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Level> for Compression {
    fn from(level: Level) -> Self {
        Compression::new(level.0)
    }
}

/// Outcome of compressing one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressed {
    /// CRC32 of the bytes read from the source.
    pub crc32: u32,
    pub uncompressed_size: u64,
    /// Bytes the encoder pushed into the sink.
    pub compressed_size: u64,
}

/// Outcome of decompressing one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decompressed {
    pub crc32: u32,
    pub size: u64,
}

/// Writer adapter that counts the bytes passing through it.
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Largest entry the 32-bit size fields can describe.
pub const MAX_ENTRY_SIZE: u64 = u32::MAX as u64;

/// Compress `source` to EOF into `sink` as raw DEFLATE.
///
/// The source is hashed in the same pass, so it is read exactly once. The
/// sink is not flushed; that is left to the caller. Fails with
/// [`Error::TooLarge`] as soon as the source yields more than
/// [`MAX_ENTRY_SIZE`] bytes.
pub fn compress<R: Read, W: Write>(source: R, sink: W, level: Level) -> Result<Compressed> {
    compress_limited(source, sink, level, MAX_ENTRY_SIZE)
}

/// [`compress`] with an explicit bound on the number of source bytes.
///
/// A source that never reaches EOF (a device, a pipe that is never closed)
/// stops one byte past `limit` instead of running forever.
pub fn compress_limited<R: Read, W: Write>(
    source: R,
    sink: W,
    level: Level,
    limit: u64,
) -> Result<Compressed> {
    let mut source = HashingReader::new(source.take(limit.saturating_add(1)));
    let mut encoder = DeflateEncoder::new(CountingWriter::new(sink), level.into());
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if source.count() > limit {
            return Err(Error::TooLarge {
                size: source.count(),
            });
        }
        encoder.write_all(&buf[..n])?;
    }

    let counter = encoder.finish()?;
    Ok(Compressed {
        crc32: source.crc32(),
        uncompressed_size: source.count(),
        compressed_size: counter.count(),
    })
}

/// Inflate a raw DEFLATE stream into `sink`, expecting exactly
/// `expected_len` bytes of output.
///
/// `compressed` must already be limited to the payload (see
/// [`Read::take`]); the decoder reads until the stream signals its end or
/// the input runs out. Output beyond `expected_len` is never written.
pub fn decompress<R: Read, W: Write>(
    compressed: R,
    sink: W,
    expected_len: u64,
) -> Result<Decompressed> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut sink = HashingWriter::new(sink);
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let n = match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let size = sink.count() + n as u64;
        if size > expected_len {
            return Err(Error::SizeMismatch {
                expected: expected_len,
                actual: size,
            });
        }
        sink.write_all(&buf[..n])?;
    }

    if sink.count() != expected_len {
        return Err(Error::SizeMismatch {
            expected: expected_len,
            actual: sink.count(),
        });
    }
    Ok(Decompressed {
        crc32: sink.crc32(),
        size: sink.count(),
    })
}
