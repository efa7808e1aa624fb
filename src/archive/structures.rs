use byteorder::{ByteOrder, LittleEndian};

/// Payload compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Fixed-size header written in front of every entry's name and payload - 30 bytes
///
/// Every field is encoded at a fixed little-endian offset; the in-memory
/// layout of this struct has nothing to do with the bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub version: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
}

impl EntryHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;
    /// Format version written by this crate.
    pub const VERSION: u16 = 20;

    /// Start of the span rewritten once the payload is known:
    /// `crc32 | compressed_size | uncompressed_size`.
    pub const PATCH_OFFSET: u64 = 14;
    pub const PATCH_SIZE: usize = 12;

    /// Header for a new deflate entry whose checksum and sizes are not known yet.
    pub fn provisional(filename_length: u16) -> Self {
        Self {
            version: Self::VERSION,
            flags: 0,
            compression_method: CompressionMethod::Deflate,
            mod_time: 0,
            mod_date: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            filename_length,
            extra_field_length: 0,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.version);
        LittleEndian::write_u16(&mut buf[6..8], self.flags);
        LittleEndian::write_u16(&mut buf[8..10], self.compression_method.as_u16());
        LittleEndian::write_u16(&mut buf[10..12], self.mod_time);
        LittleEndian::write_u16(&mut buf[12..14], self.mod_date);
        buf[14..26].copy_from_slice(&self.encode_patch());
        LittleEndian::write_u16(&mut buf[26..28], self.filename_length);
        LittleEndian::write_u16(&mut buf[28..30], self.extra_field_length);
        buf
    }

    /// Encode only the back-patched span, to be written at `PATCH_OFFSET`.
    pub fn encode_patch(&self) -> [u8; Self::PATCH_SIZE] {
        let mut buf = [0u8; Self::PATCH_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.crc32);
        LittleEndian::write_u32(&mut buf[4..8], self.compressed_size);
        LittleEndian::write_u32(&mut buf[8..12], self.uncompressed_size);
        buf
    }

    /// Returns `None` when the bytes do not start with the entry signature.
    pub fn decode(data: &[u8; Self::SIZE]) -> Option<Self> {
        if &data[0..4] != Self::SIGNATURE {
            return None;
        }

        Some(Self {
            version: LittleEndian::read_u16(&data[4..6]),
            flags: LittleEndian::read_u16(&data[6..8]),
            compression_method: CompressionMethod::from_u16(LittleEndian::read_u16(&data[8..10])),
            mod_time: LittleEndian::read_u16(&data[10..12]),
            mod_date: LittleEndian::read_u16(&data[12..14]),
            crc32: LittleEndian::read_u32(&data[14..18]),
            compressed_size: LittleEndian::read_u32(&data[18..22]),
            uncompressed_size: LittleEndian::read_u32(&data[22..26]),
            filename_length: LittleEndian::read_u16(&data[26..28]),
            extra_field_length: LittleEndian::read_u16(&data[28..30]),
        })
    }

    /// Bytes between the end of this header and the start of the payload.
    pub fn variable_data_size(&self) -> u64 {
        self.filename_length as u64 + self.extra_field_length as u64
    }
}

/// One entry as found while scanning an archive
#[derive(Debug, Clone)]
pub struct Entry {
    pub header: EntryHeader,
    pub file_name: String,
    pub header_offset: u64,
    pub data_offset: u64,
}

impl Entry {
    pub fn compressed_size(&self) -> u64 {
        self.header.compressed_size as u64
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.header.uncompressed_size as u64
    }

    /// Offset where the following entry's header is expected.
    pub fn next_header_offset(&self) -> u64 {
        self.data_offset + self.compressed_size()
    }
}

/// Why a sequential scan stopped.
///
/// The format has no entry count or end marker, so the reader can only
/// tell these cases apart by what it finds where the next header should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEnd {
    /// End of input exactly on an entry boundary.
    Clean,
    /// Input ended inside a header, file name or payload that starts at `offset`.
    Truncated { offset: u64 },
    /// Bytes at `offset` are not an entry header.
    UnrecognizedData { offset: u64 },
}

impl ArchiveEnd {
    pub fn is_clean(&self) -> bool {
        matches!(self, ArchiveEnd::Clean)
    }
}
