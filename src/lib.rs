//! # pzip
//!
//! A minimal archiver: files are compressed with raw DEFLATE and stored back
//! to back, each behind a small fixed header carrying its CRC32 and sizes.
//!
//! The container is a strict subset of the ZIP local-file layout with no
//! central directory, so an archive is read by scanning from the start.
//! Writing needs no index either: each header is written before its payload
//! and patched once the payload's compressed size is known.
//!
//! ## Features
//!
//! - Create archives on seekable files (header back-patching) or on pipes
//!   (per-entry buffering)
//! - List entries without decompressing
//! - Extract with size and CRC32 verification, refusing names that would
//!   escape the output directory
//! - Test archive integrity without writing files
//! - Reports whether a scan ended cleanly, on a truncated entry, or on
//!   unrecognized bytes
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use pzip::{CreateOptions, ExtractOptions, ops};
//!
//! fn main() -> pzip::Result<()> {
//!     let archive = Path::new("out.pz");
//!     let stats = ops::create(archive, &["a.txt", "b.txt"], &CreateOptions::default(), |_| {})?;
//!     println!("{} entries, {}% of original size", stats.entries, stats.ratio());
//!
//!     for entry in ops::list(archive)?.entries {
//!         println!("{} {}", entry.uncompressed_size(), entry.file_name);
//!     }
//!
//!     ops::extract(archive, &ExtractOptions::default(), |_| {})?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod checksum;
pub mod cli;
pub mod codec;
pub mod error;
pub mod ops;

pub use archive::{ArchiveEnd, ArchiveReader, ArchiveWriter, Entry, EntryHeader};
pub use cli::Cli;
pub use codec::Level;
pub use error::{Error, Result};
pub use ops::{CreateOptions, Event, ExtractOptions, Listing, Stats};
