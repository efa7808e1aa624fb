//! Sequential archive reader.
//!
//! Archives have no index and no end marker. Reading starts at the first
//! header and follows `compressed_size` from one entry to the next; the scan
//! ends at the first position that does not hold a complete header.
//! [`ArchiveReader::end`] reports whether that was a clean end of input,
//! a truncated entry, or unrelated bytes.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::codec::{self, Decompressed};
use crate::error::{Error, Result};

use super::structures::{ArchiveEnd, CompressionMethod, Entry, EntryHeader};

/// Walks the entries of an archive in the order they were written.
pub struct ArchiveReader<R> {
    inner: R,
    /// Total length of the input in bytes
    len: u64,
    /// Where the next header is expected
    next_header: u64,
    end: Option<ArchiveEnd>,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Start reading at the stream's current position.
    pub fn new(mut inner: R) -> Result<Self> {
        let start = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(start))?;

        Ok(Self {
            inner,
            len,
            next_header: start,
            end: None,
        })
    }

    /// Read the next entry's header and file name.
    ///
    /// The payload is not touched: the following call seeks straight over
    /// it, whether or not it was extracted in between.
    ///
    /// Returns `Ok(None)` once the scan has ended; see [`Self::end`]. An
    /// entry whose payload runs past the end of input is still returned,
    /// and ends the scan as truncated.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        if self.end.is_some() {
            return Ok(None);
        }

        let header_offset = self.next_header;
        let available = self.len.saturating_sub(header_offset);
        if available == 0 {
            return Ok(self.stop(ArchiveEnd::Clean));
        }

        self.inner.seek(SeekFrom::Start(header_offset))?;

        if available < EntryHeader::SIZE as u64 {
            let mut tail = vec![0u8; available as usize];
            self.inner.read_exact(&mut tail)?;
            let prefix = tail.len().min(EntryHeader::SIGNATURE.len());
            return Ok(if tail[..prefix] == EntryHeader::SIGNATURE[..prefix] {
                self.stop(ArchiveEnd::Truncated {
                    offset: header_offset,
                })
            } else {
                self.stop(ArchiveEnd::UnrecognizedData {
                    offset: header_offset,
                })
            });
        }

        let mut raw = [0u8; EntryHeader::SIZE];
        self.inner.read_exact(&mut raw)?;
        let Some(header) = EntryHeader::decode(&raw) else {
            return Ok(self.stop(ArchiveEnd::UnrecognizedData {
                offset: header_offset,
            }));
        };

        let data_offset = header_offset + EntryHeader::SIZE as u64 + header.variable_data_size();
        if data_offset > self.len {
            return Ok(self.stop(ArchiveEnd::Truncated {
                offset: header_offset,
            }));
        }

        let mut name = vec![0u8; header.filename_length as usize];
        self.inner.read_exact(&mut name)?;
        // Use lossy conversion so a bad name does not hide the entry
        let file_name = String::from_utf8_lossy(&name).into_owned();

        let entry = Entry {
            header,
            file_name,
            header_offset,
            data_offset,
        };

        self.next_header = entry.next_header_offset();
        if self.next_header > self.len {
            self.end = Some(ArchiveEnd::Truncated {
                offset: header_offset,
            });
        }

        Ok(Some(entry))
    }

    /// Read every remaining entry header.
    pub fn entries(&mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The compressed payload of `entry`, limited to exactly
    /// `compressed_size` bytes.
    pub fn payload(&mut self, entry: &Entry) -> Result<io::Take<&mut R>> {
        self.inner.seek(SeekFrom::Start(entry.data_offset))?;
        Ok((&mut self.inner).take(entry.compressed_size()))
    }

    /// Decompress `entry` into `sink`, checking its size and CRC32.
    ///
    /// On a CRC mismatch the data has already been written to `sink`.
    pub fn extract_to<W: Write>(&mut self, entry: &Entry, sink: W) -> Result<Decompressed> {
        let method = entry.header.compression_method;
        if method != CompressionMethod::Deflate {
            return Err(Error::UnsupportedMethod(method.as_u16()));
        }

        let expected_len = entry.uncompressed_size();
        let payload = self.payload(entry)?;
        let result = codec::decompress(payload, sink, expected_len)?;

        if result.crc32 != entry.header.crc32 {
            return Err(Error::CrcMismatch {
                expected: entry.header.crc32,
                computed: result.crc32,
            });
        }
        Ok(result)
    }

    /// Why the scan stopped, once it has.
    pub fn end(&self) -> Option<ArchiveEnd> {
        self.end
    }

    fn stop(&mut self, end: ArchiveEnd) -> Option<Entry> {
        self.end = Some(end);
        None
    }
}
