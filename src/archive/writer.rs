//! Sequential archive writer.
//!
//! The checksum and the sizes of an entry are only known once its payload
//! has gone through the compressor. With a seekable output the header is
//! written first with those fields zeroed, and patched in place afterwards.
//! Without one, [`ArchiveWriter::append_buffered`] compresses into memory
//! and writes the entry in a single forward pass.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::{self, Compressed, Level};
use crate::error::{Error, Result};

use super::structures::{Entry, EntryHeader};

/// Appends entries to an archive stream.
pub struct ArchiveWriter<W> {
    inner: W,
    level: Level,
    /// Offset just past the last complete entry.
    end: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W, level: Level) -> Self {
        Self {
            inner,
            level,
            end: 0,
        }
    }

    /// Add an entry without seeking: the payload is compressed into memory
    /// first, then header, name and payload are written in one go.
    ///
    /// A source failure leaves the stream untouched. A write failure leaves
    /// a partial entry behind that cannot be taken back, and is fatal.
    pub fn append_buffered<R: Read>(&mut self, name: &str, source: R) -> Result<Entry> {
        let filename_length = name_length(name)?;

        let mut payload = Vec::new();
        let summary = codec::compress(source, &mut payload, self.level)?;
        let header = finished_header(filename_length, &summary)?;

        let header_offset = self.end;
        self.inner
            .write_all(&header.encode())
            .and_then(|_| self.inner.write_all(name.as_bytes()))
            .and_then(|_| self.inner.write_all(&payload))
            .map_err(Error::Poisoned)?;

        let entry = written_entry(name, header, header_offset);
        self.end = entry.next_header_offset();
        Ok(entry)
    }

    /// Flush and hand back the stream together with the offset just past
    /// the last complete entry. Bytes beyond it, if any, belong to a failed
    /// entry and should be truncated away by the caller.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.inner.flush()?;
        Ok((self.inner, self.end))
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Add an entry, back-patching its header once the payload is written.
    ///
    /// On failure the stream is rewound to where the entry began, so the
    /// next entry overwrites whatever was partially written.
    pub fn append<R: Read>(&mut self, name: &str, source: R) -> Result<Entry> {
        let filename_length = name_length(name)?;
        let header_offset = self.inner.stream_position().map_err(Error::Poisoned)?;

        match self.write_patched(name, filename_length, header_offset, source) {
            Ok(entry) => {
                self.end = entry.next_header_offset();
                Ok(entry)
            }
            Err(e) => {
                self.inner
                    .seek(SeekFrom::Start(header_offset))
                    .map_err(Error::Poisoned)?;
                self.end = header_offset;
                Err(e)
            }
        }
    }

    fn write_patched<R: Read>(
        &mut self,
        name: &str,
        filename_length: u16,
        header_offset: u64,
        source: R,
    ) -> Result<Entry> {
        self.inner
            .write_all(&EntryHeader::provisional(filename_length).encode())?;
        self.inner.write_all(name.as_bytes())?;

        let summary = codec::compress(source, &mut self.inner, self.level)?;
        let header = finished_header(filename_length, &summary)?;
        let entry = written_entry(name, header, header_offset);

        self.inner
            .seek(SeekFrom::Start(header_offset + EntryHeader::PATCH_OFFSET))?;
        self.inner.write_all(&header.encode_patch())?;
        self.inner
            .seek(SeekFrom::Start(entry.next_header_offset()))?;

        Ok(entry)
    }
}

fn name_length(name: &str) -> Result<u16> {
    u16::try_from(name.len()).map_err(|_| Error::NameTooLong { len: name.len() })
}

fn finished_header(filename_length: u16, summary: &Compressed) -> Result<EntryHeader> {
    let size_field = |size: u64| u32::try_from(size).map_err(|_| Error::TooLarge { size });

    Ok(EntryHeader {
        crc32: summary.crc32,
        compressed_size: size_field(summary.compressed_size)?,
        uncompressed_size: size_field(summary.uncompressed_size)?,
        ..EntryHeader::provisional(filename_length)
    })
}

fn written_entry(name: &str, header: EntryHeader, header_offset: u64) -> Entry {
    Entry {
        header,
        file_name: name.to_string(),
        header_offset,
        data_offset: header_offset + EntryHeader::SIZE as u64 + header.variable_data_size(),
    }
}
