//! Error types for the archive crate.

use thiserror::Error;

/// Errors that can occur when working with DATA0/DATA1 archives and
/// chunked containers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error that is not a bounds failure.
    #[error("{0}")]
    Common(cethleann_common::Error),

    /// Index stream length is not a multiple of the record size.
    #[error("malformed index: {length} bytes is not a multiple of the {record_size}-byte record")]
    MalformedIndex { length: usize, record_size: usize },

    /// Logical id outside `[0, count)`.
    #[error("index {index} does not exist (archive has {count} entries)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Source could not be positioned or read.
    #[error("source is not readable: {0}")]
    UnreadableSource(String),

    /// A read or slice would run past the end of the buffer.
    #[error("truncated stream at offset {offset}: needed {needed} bytes but only {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Declared uncompressed size is at or above the 2 GiB guard.
    #[error("entry size {0:#x} exceeds the 2 GiB limit")]
    OversizedEntry(u64),

    /// Container header disagrees with the record's uncompressed size.
    #[error("container at offset {offset:#x} declares {declared} bytes but the record expects {expected}")]
    SizeMismatch {
        offset: u64,
        expected: u64,
        declared: u64,
    },

    /// Path would resolve outside its root directory.
    #[error("path escapes its root directory: {0}")]
    UnsafePath(String),

    /// Chunk size cannot be used for encoding.
    #[error("invalid chunk size {0:#x}: must be a non-zero multiple of 0x80")]
    InvalidChunkSize(u32),

    /// A chunk's deflate stream was rejected.
    #[error("corrupt chunk {chunk}: {reason}")]
    CorruptChunk { chunk: usize, reason: String },
}

impl From<cethleann_common::Error> for Error {
    fn from(err: cethleann_common::Error) -> Self {
        match err {
            cethleann_common::Error::UnexpectedEof {
                offset,
                needed,
                available,
            } => Self::TruncatedStream {
                offset,
                needed,
                available,
            },
            cethleann_common::Error::Io(e) => Self::Io(e),
            other => Self::Common(other),
        }
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
