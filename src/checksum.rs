//! CRC32 over whole streams.
//!
//! [`HashingReader`] and [`HashingWriter`] hash every byte that passes
//! through them, so a copy loop gets its checksum without a second pass.
//! The codec wraps the source of each compression and the sink of each
//! decompression in one of these, which is how `create`, `extract` and
//! `test` all arrive at their CRCs.

use std::io::{self, Read, Write};

use crc32fast::Hasher;

/// Reader adapter that hashes and counts the bytes read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Hasher,
    count: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            count: 0,
        }
    }

    /// CRC32 of the bytes read so far.
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

/// Writer adapter that hashes and counts the bytes accepted by the inner
/// writer.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Hasher,
    count: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            count: 0,
        }
    }

    /// CRC32 of the bytes written so far.
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Only what the inner writer took; a short write is retried by the caller.
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Compute the CRC32 of everything `reader` yields, reading to EOF.
///
/// Useful for checking a stored checksum against a file on disk.
pub fn crc32<R: Read>(reader: R) -> io::Result<u32> {
    let mut reader = HashingReader::new(reader);
    io::copy(&mut reader, &mut io::sink())?;
    Ok(reader.crc32())
}
