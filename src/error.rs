//! Error type shared by the archive reader, writer and operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while creating, listing or extracting an archive.
///
/// Most variants describe a single entry and are recoverable: the operation
/// records them and moves on. [`Error::is_fatal`] tells the two apart.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive file itself could not be opened or created.
    #[error("cannot open archive {}: {source}", .path.display())]
    OpenArchive { path: PathBuf, source: io::Error },

    /// A source file could not be stat'ed, opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    Source { path: PathBuf, source: io::Error },

    /// An output file could not be created or written during extraction.
    #[error("cannot write {}: {source}", .path.display())]
    Output { path: PathBuf, source: io::Error },

    /// A source that is neither a regular file nor a directory.
    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("{size} bytes does not fit the 32-bit size fields")]
    TooLarge { size: u64 },

    #[error("file name is {len} bytes, the limit is {}", u16::MAX)]
    NameTooLong { len: usize },

    /// A name that would escape the extraction directory, or is empty.
    #[error("refusing unsafe entry name {0:?}")]
    UnsafeName(String),

    #[error("compression level {0} is outside 1..=9")]
    InvalidLevel(u32),

    #[error("unsupported compression method {0}")]
    UnsupportedMethod(u16),

    #[error("CRC mismatch (stored {expected:#010x}, computed {computed:#010x})")]
    CrcMismatch { expected: u32, computed: u32 },

    /// Decoded length differs from the header. When the payload decodes to
    /// more than expected, decoding stops early and `actual` is a lower bound.
    #[error("decoded {actual} bytes, header says {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// A failed entry could not be rolled back; the archive stream position
    /// is unknown and nothing more can be written.
    #[error("archive stream lost its position: {0}")]
    Poisoned(io::Error),
}

impl Error {
    /// Whether this error must abort the whole operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::OpenArchive { .. } | Error::Poisoned(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
