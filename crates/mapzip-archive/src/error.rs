//! Error types for the archive crate.

use thiserror::Error;

/// Errors that can occur when opening or reading archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error (short reads, map construction).
    #[error("{0}")]
    Common(#[from] mapzip_common::Error),

    /// Invalid ZIP magic bytes.
    #[error("invalid ZIP signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// The file is not a ZIP archive at all.
    #[error("not a ZIP archive: {0}")]
    NotAnArchive(String),

    /// Could not find the end of central directory record.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// ZIP64 record not found when expected.
    #[error("ZIP64 end of central directory not found")]
    Zip64EocdNotFound,

    /// The archive exceeds the 32-bit offsets of the entry model.
    #[error("archive is too large: {0} bytes")]
    ArchiveTooLarge(u64),

    /// The embedded fast index is absent or malformed.
    ///
    /// The archive is still readable through its central directory.
    #[error("fast index missing or malformed: {0}")]
    IndexMissing(String),

    /// The entry is a directory and carries no payload.
    #[error("entry has no data: {0}")]
    NoData(String),

    /// The entry's payload extends past the end of the archive.
    #[error("truncated archive: entry {name} ends at {end} but archive is {archive_size} bytes")]
    Truncated {
        name: String,
        end: u64,
        archive_size: u64,
    },

    /// Unsupported compression method.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// The local header declares an implausibly long extra field.
    #[error("extra field of {name} is {length} bytes, limit is {limit}")]
    ExtraFieldTooLarge { name: String, length: u16, limit: u16 },

    /// An entry cannot be written (name or extra field too long).
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// The archive was used after `close()`.
    #[error("archive is closed")]
    Closed,
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
