//! On-disk ZIP records.
//!
//! Fixed-size records are `#[repr(C, packed)]` zerocopy structs that exclude
//! their 4-byte signature.

mod end;
mod records;

pub use end::{Eocd64Locator, Eocd64Record, EocdRecord};
pub use records::{CentralDirectoryHeader, LocalFileHeader, ZIP64_EXTRA_ID, ZIP64_SENTINEL};

/// Compression methods the engine can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store = 0,
    /// Raw DEFLATE compression.
    Deflate = 8,
}

impl TryFrom<u16> for CompressionMethod {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Store),
            8 => Ok(Self::Deflate),
            other => Err(other),
        }
    }
}
