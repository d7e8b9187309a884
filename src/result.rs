//! Error types that can be emitted from this library

use std::io;

use thiserror::Error;

/// Generic result type with FsError as its error variant
pub type FsResult<T> = Result<T, FsError>;

/// Error type for the virtual file system
#[derive(Debug, Error)]
pub enum FsError {
    /// An Error caused by I/O
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The archive was opened but its structure violates the format
    #[error("invalid pack archive: {0}")]
    InvalidArchive(&'static str),

    /// The archive uses a feature this library does not support
    #[error("unsupported pack archive: {0}")]
    UnsupportedArchive(&'static str),

    /// An entry name does not fit in a logical path
    #[error("file name in archive exceeds maximum allowed length")]
    NameTooLong,

    /// The DEFLATE decoder rejected a compressed entry mid-stream
    #[error("failed to inflate compressed entry")]
    InflateFailed,

    /// A search path referenced a pack id with no registered pack
    #[error("invalid pack id {0}")]
    InvalidPackId(usize),

    /// A seek or trim target lies outside the visible file region
    #[error("seek position out of range")]
    InvalidSeek,
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}
