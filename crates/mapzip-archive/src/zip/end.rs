//! Records closing the archive: the classic end of central directory and
//! its ZIP64 counterparts.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// The classic end record. Counts of `0xFFFF` or offsets of `0xFFFFFFFF`
/// mean the real values live in an [`Eocd64Record`].
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EocdRecord {
    pub disk_number: u16,
    pub central_dir_disk: u16,
    pub central_dir_count_disk: u16,
    pub central_dir_count_total: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    /// Length of the archive comment that follows the record.
    pub comment_length: u16,
}

impl EocdRecord {
    pub const MAGIC: [u8; 4] = *b"PK\x05\x06";

    /// Fixed part, signature included, comment excluded.
    pub const SIZE: usize = 22;

    pub const MAX_COMMENT_LENGTH: usize = u16::MAX as usize;

    /// Describe a single-disk directory. Counts that do not fit are written
    /// as the ZIP64 sentinel.
    pub fn new(count: usize, size: u32, offset: u32, comment_length: u16) -> Self {
        let count = u16::try_from(count).unwrap_or(u16::MAX);
        Self {
            central_dir_count_disk: count,
            central_dir_count_total: count,
            central_dir_size: size,
            central_dir_offset: offset,
            comment_length,
            ..Default::default()
        }
    }

    pub fn is_zip64(&self) -> bool {
        let (count, size, offset) = (
            self.central_dir_count_total,
            self.central_dir_size,
            self.central_dir_offset,
        );
        count == u16::MAX || size == u32::MAX || offset == u32::MAX
    }
}

/// Sits right in front of the [`EocdRecord`] and points at the
/// [`Eocd64Record`].
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Eocd64Locator {
    pub zip64_eocd_disk: u32,
    pub zip64_eocd_offset: u64,
    pub total_disks: u32,
}

impl Eocd64Locator {
    pub const MAGIC: [u8; 4] = *b"PK\x06\x07";
    pub const SIGNATURE: u32 = u32::from_le_bytes(Self::MAGIC);
    pub const SIZE: usize = 20;

    pub fn pointing_at(record_offset: u64) -> Self {
        Self {
            zip64_eocd_disk: 0,
            zip64_eocd_offset: record_offset,
            total_disks: 1,
        }
    }
}

/// 64-bit end record.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Eocd64Record {
    /// Bytes after this field; 44 for a record without extensible data.
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub central_dir_disk: u32,
    pub central_dir_count_disk: u64,
    pub central_dir_count_total: u64,
    pub central_dir_size: u64,
    pub central_dir_offset: u64,
}

impl Eocd64Record {
    pub const MAGIC: [u8; 4] = *b"PK\x06\x06";
    pub const SIGNATURE: u32 = u32::from_le_bytes(Self::MAGIC);
    pub const SIZE: usize = 56;

    /// Version 4.5, the first to define ZIP64.
    const VERSION: u16 = 45;

    /// Describe a single-disk directory.
    pub fn new(count: u64, size: u64, offset: u64) -> Self {
        Self {
            record_size: (Self::SIZE - 12) as u64,
            version_made_by: Self::VERSION,
            version_needed: Self::VERSION,
            central_dir_count_disk: count,
            central_dir_count_total: count,
            central_dir_size: size,
            central_dir_offset: offset,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_overflow_to_sentinel() {
        let eocd = EocdRecord::new(70_000, 10, 20, 0);
        assert!(eocd.is_zip64());
        assert_eq!({ eocd.central_dir_count_total }, u16::MAX);

        let eocd = EocdRecord::new(3, 10, 20, 5);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn test_record_sizes_match_layout() {
        assert_eq!(std::mem::size_of::<EocdRecord>() + 4, EocdRecord::SIZE);
        assert_eq!(std::mem::size_of::<Eocd64Locator>() + 4, Eocd64Locator::SIZE);
        assert_eq!(std::mem::size_of::<Eocd64Record>() + 4, Eocd64Record::SIZE);
    }
}
