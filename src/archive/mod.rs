//! Archive container format: writing and sequential reading.
//!
//! ## Architecture
//!
//! - [`structures`]: the fixed entry header and its byte-exact encoding
//! - [`writer`]: appends entries, back-patching each header after its payload
//! - [`reader`]: walks entries from the start of the stream
//!
//! ## Format Overview
//!
//! An archive is nothing but entries stored back to back:
//!
//! ```text
//! signature            4 bytes  "PK\x03\x04"
//! version              2 bytes
//! flags                2 bytes
//! compression_method   2 bytes  (8 = raw DEFLATE)
//! mod_time             2 bytes
//! mod_date             2 bytes
//! crc32                4 bytes
//! compressed_size      4 bytes
//! uncompressed_size    4 bytes
//! filename_length      2 bytes
//! extra_field_length   2 bytes
//! filename             filename_length bytes
//! extra_field          extra_field_length bytes
//! payload              compressed_size bytes
//! ```
//!
//! All integers are little-endian. There is no central directory and no end
//! marker; a reader keeps going until the bytes at the expected position are
//! not a header.
//!
//! ## Limitations
//!
//! - Entries and their compressed form are limited to 4 GiB - 1
//! - No timestamps, permissions or directory entries
//! - No random access: finding an entry means scanning from the start

mod reader;
mod structures;
mod writer;

pub use reader::ArchiveReader;
pub use structures::*;
pub use writer::ArchiveWriter;
