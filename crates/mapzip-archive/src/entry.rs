//! Archive entries and locating their payloads.

use std::sync::atomic::{AtomicI64, Ordering};

use mapzip_common::BinaryReader;

use crate::decompress::Payload;
use crate::zip::{CompressionMethod, LocalFileHeader};
use crate::{Error, Result};

/// `uncompressed_size` of directory entries.
pub const DIRECTORY_SIZE: i32 = -2;

const UNRESOLVED: i64 = -1;

/// One member of an archive, as described by its central directory record.
///
/// Entries hold plain offsets, never a reference to the archive bytes. The
/// payload start is computed from the local header on first use and cached;
/// concurrent first uses may both compute it, and both store the same value.
#[derive(Debug)]
pub struct Entry {
    /// Name without the trailing `/` of directory records.
    name: String,
    compressed_size: i32,
    uncompressed_size: i32,
    method: u16,
    header_offset: i32,
    name_length: u16,
    data_offset: AtomicI64,
}

impl Entry {
    /// Create a file entry.
    pub(crate) fn new(
        name: String,
        compressed_size: i32,
        uncompressed_size: i32,
        method: u16,
        header_offset: i32,
        name_length: u16,
    ) -> Self {
        Self {
            name,
            compressed_size,
            uncompressed_size,
            method,
            header_offset,
            name_length,
            data_offset: AtomicI64::new(UNRESOLVED),
        }
    }

    /// Create a directory pseudo-entry.
    pub(crate) fn directory(name: String, header_offset: i32, name_length: u16) -> Self {
        Self::new(name, 0, DIRECTORY_SIZE, 0, header_offset, name_length)
    }

    /// Entry name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the stored bytes.
    #[inline]
    pub fn compressed_size(&self) -> i32 {
        self.compressed_size
    }

    /// Size after decompression; [`DIRECTORY_SIZE`] for directories.
    #[inline]
    pub fn uncompressed_size(&self) -> i32 {
        self.uncompressed_size
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.uncompressed_size == DIRECTORY_SIZE
    }

    /// Raw compression method from the central directory.
    #[inline]
    pub fn method(&self) -> u16 {
        self.method
    }

    /// Compression method, if it is one the engine can read.
    #[inline]
    pub fn compression_method(&self) -> Option<CompressionMethod> {
        CompressionMethod::try_from(self.method).ok()
    }

    /// Offset of the local file header.
    #[inline]
    pub fn header_offset(&self) -> i32 {
        self.header_offset
    }

    /// Cached payload offset, if already resolved.
    #[inline]
    pub fn resolved_data_offset(&self) -> Option<i64> {
        let offset = self.data_offset.load(Ordering::Relaxed);
        (offset != UNRESOLVED).then_some(offset)
    }

    /// Record a payload offset known without reading the local header.
    #[inline]
    pub(crate) fn set_data_offset(&self, offset: i64) {
        self.data_offset.store(offset, Ordering::Relaxed);
    }

    /// Offset where this entry's stored bytes begin.
    ///
    /// The local header's extra field may differ in length from the central
    /// directory's, so the local value is read. Lengths above
    /// `max_extra_field_length` are treated as corruption.
    pub fn data_offset(&self, region: &[u8], max_extra_field_length: u16) -> Result<i64> {
        if let Some(offset) = self.resolved_data_offset() {
            return Ok(offset);
        }

        let header = usize::try_from(self.header_offset)
            .map_err(|_| self.truncated(u32::MAX as usize, region.len()))?;
        let extra_length = BinaryReader::new(region)
            .u16_at(header + LocalFileHeader::EXTRA_LENGTH_OFFSET)
            .map_err(|_| self.truncated(header + LocalFileHeader::SIZE, region.len()))?;
        if extra_length > max_extra_field_length {
            return Err(Error::ExtraFieldTooLarge {
                name: self.name.clone(),
                length: extra_length,
                limit: max_extra_field_length,
            });
        }

        let offset =
            LocalFileHeader::payload_start(header as u64, self.name_length, extra_length) as i64;
        self.set_data_offset(offset);
        Ok(offset)
    }

    /// Locate this entry's payload inside `region`.
    pub fn payload<'a>(&self, region: &'a [u8], max_extra_field_length: u16) -> Result<Payload<'a>> {
        if self.uncompressed_size < 0 {
            return Err(Error::NoData(self.name.clone()));
        }

        let method = self
            .compression_method()
            .ok_or(Error::UnsupportedCompression(self.method))?;

        let start = self.data_offset(region, max_extra_field_length)? as usize;
        let end = usize::try_from(self.compressed_size)
            .map(|size| start + size)
            .unwrap_or(usize::MAX);
        if end > region.len() {
            return Err(self.truncated(end, region.len()));
        }

        Ok(Payload {
            bytes: &region[start..end],
            method,
            uncompressed_size: self.uncompressed_size as usize,
        })
    }

    fn truncated(&self, end: usize, archive_size: usize) -> Error {
        Error::Truncated {
            name: self.name.clone(),
            end: end as u64,
            archive_size: archive_size as u64,
        }
    }
}
