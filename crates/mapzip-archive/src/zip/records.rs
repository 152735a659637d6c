//! Per-member records: the local header in front of each payload and its
//! copy in the central directory.
//!
//! Both structs start after the 4-byte signature, which callers check on
//! their own.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Sentinel that moves a 32-bit size or offset into the ZIP64 extra field.
pub const ZIP64_SENTINEL: u32 = u32::MAX;

/// Extra field id of the ZIP64 extended information block.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Header written immediately before a member's payload.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    /// DOS time in the low half, DOS date in the high half.
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    /// May differ from the central directory's value for the same member.
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const MAGIC: [u8; 4] = *b"PK\x03\x04";
    pub const SIGNATURE: u32 = u32::from_le_bytes(Self::MAGIC);

    /// Fixed part, signature included.
    pub const SIZE: usize = 30;

    /// Position of `extra_field_length`, counted from the signature.
    pub const EXTRA_LENGTH_OFFSET: usize = 28;

    /// Where the payload of a member whose header sits at `header_offset`
    /// begins.
    #[inline]
    pub fn payload_start(header_offset: u64, name_length: u16, extra_length: u16) -> u64 {
        header_offset + Self::SIZE as u64 + name_length as u64 + extra_length as u64
    }

    /// Payload start for this header located at `header_offset`.
    pub fn payload_start_at(&self, header_offset: u64) -> u64 {
        Self::payload_start(header_offset, self.file_name_length, self.extra_field_length)
    }
}

/// One record of the central directory.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    /// Host-specific; bit 4 is the MS-DOS directory attribute.
    pub external_attrs: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    pub const MAGIC: [u8; 4] = *b"PK\x01\x02";
    pub const SIGNATURE: u32 = u32::from_le_bytes(Self::MAGIC);

    /// Fixed part, signature included. Name, extra field and comment follow.
    pub const SIZE: usize = 46;

    /// Mirror a local header, as a producer writes it into the directory.
    pub fn for_local(local: &LocalFileHeader, header_offset: u32, external_attrs: u32) -> Self {
        Self {
            version_made_by: local.version_needed.max(20),
            version_needed: local.version_needed,
            flags: local.flags,
            compression_method: local.compression_method,
            last_modified: local.last_modified,
            crc32: local.crc32,
            compressed_size: local.compressed_size,
            uncompressed_size: local.uncompressed_size,
            file_name_length: local.file_name_length,
            external_attrs,
            local_header_offset: header_offset,
            ..Default::default()
        }
    }

    /// Whether a size or the header offset has to be read from the ZIP64
    /// extra field.
    pub fn defers_to_zip64(&self) -> bool {
        let (compressed, uncompressed, offset) = (
            self.compressed_size,
            self.uncompressed_size,
            self.local_header_offset,
        );
        compressed == ZIP64_SENTINEL || uncompressed == ZIP64_SENTINEL || offset == ZIP64_SENTINEL
    }
}
