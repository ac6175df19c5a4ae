//! Library-wide error and result types.
//!
//! Every fallible operation in romkit returns [`Result`]. Callers that need
//! the flat negative result codes used by shell-integration layers can get
//! them from [`Error::code`]; the mapping is stable across calls.

use std::io;

/// Result alias used throughout romkit.
pub type Result<T> = std::result::Result<T, Error>;

/// Negative errno-style codes returned by [`Error::code`].
pub mod code {
    /// Requested sub-resource is not present.
    pub const ENOENT: i32 = -2;
    /// Short read, failed seek, or structural validation failure.
    pub const EIO: i32 = -5;
    /// The backing source is closed or was never opened.
    pub const EBADF: i32 = -9;
    /// A declared structure size exceeds a sanity ceiling.
    pub const ENOMEM: i32 = -12;
    /// A directory was requested where a file was expected.
    pub const EISDIR: i32 = -21;
    /// An offset or length falls outside the valid region.
    pub const ERANGE: i32 = -34;
    /// The operation is not supported by this object.
    pub const ENOTSUP: i32 = -95;
}

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A magic/signature field did not match the expected value.
    #[error("bad magic value")]
    BadMagic,
    /// A format version is present in the data but not supported.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    /// The source ended before all expected bytes could be read.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// An offset or size field would read outside the valid region.
    #[error("invalid offset or size")]
    InvalidRange,
    /// A structural constraint was violated (message describes which one).
    #[error("parse error: {0}")]
    Parse(&'static str),
    /// An embedded checksum did not match the computed value.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// The source handle is closed or the reader never opened.
    #[error("bad file descriptor")]
    BadDescriptor,
    /// Detection failed for this object; it never became valid.
    #[error("invalid or unsupported format")]
    InvalidFormat,
    /// The requested sub-resource does not exist for this object.
    #[error("no such entry")]
    NotFound,
    /// A directory entry was found where a file was requested.
    #[error("is a directory")]
    IsDirectory,
    /// A declared size exceeds the sanity ceiling for that structure.
    #[error("declared size {size} exceeds limit {limit}")]
    TooLarge { size: u64, limit: u64 },
    /// The operation is not available for this object.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// LZ4 decompression failed.
    #[cfg(feature = "compression")]
    #[error("lz4 decompression failed")]
    Lz4,
}

impl Error {
    /// Stable negative result code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::BadDescriptor => code::EBADF,
            Error::NotFound => code::ENOENT,
            Error::IsDirectory => code::EISDIR,
            Error::TooLarge { .. } => code::ENOMEM,
            Error::InvalidRange => code::ERANGE,
            Error::Unsupported(_) => code::ENOTSUP,
            Error::Io(e) => e.raw_os_error().map_or(code::EIO, |c| -c.abs()),
            _ => code::EIO,
        }
    }

    /// Rebuild an equivalent error for re-reporting a recorded failure.
    ///
    /// `io::Error` is not `Clone`, so recorded I/O failures come back with
    /// their kind preserved and the message dropped.
    pub(crate) fn duplicate(&self) -> Error {
        match self {
            Error::BadMagic => Error::BadMagic,
            Error::UnsupportedVersion(v) => Error::UnsupportedVersion(*v),
            Error::UnexpectedEof => Error::UnexpectedEof,
            Error::InvalidRange => Error::InvalidRange,
            Error::Parse(s) => Error::Parse(s),
            Error::ChecksumMismatch => Error::ChecksumMismatch,
            Error::BadDescriptor => Error::BadDescriptor,
            Error::InvalidFormat => Error::InvalidFormat,
            Error::NotFound => Error::NotFound,
            Error::IsDirectory => Error::IsDirectory,
            Error::TooLarge { size, limit } => Error::TooLarge {
                size: *size,
                limit: *limit,
            },
            Error::Unsupported(s) => Error::Unsupported(s),
            Error::Io(e) => Error::Io(io::Error::from(e.kind())),
            #[cfg(feature = "compression")]
            Error::Lz4 => Error::Lz4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_codes_are_stable() {
        assert_eq!(Error::BadDescriptor.code(), code::EBADF);
        assert_eq!(Error::InvalidFormat.code(), code::EIO);
        assert_eq!(Error::ChecksumMismatch.code(), code::EIO);
        assert_eq!(Error::NotFound.code(), code::ENOENT);
        assert_eq!(
            Error::TooLarge {
                size: 1 << 30,
                limit: 16 << 20
            }
            .code(),
            code::ENOMEM
        );
        assert_eq!(Error::NotFound.code(), Error::NotFound.code());
    }

    #[test]
    fn io_errors_without_os_code_map_to_eio() {
        let e = Error::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(e.code(), code::EIO);
        assert_eq!(e.duplicate().code(), code::EIO);
    }
}
