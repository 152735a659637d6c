//! Locating the end-of-central-directory record and what it points at.

use mapzip_common::BinaryReader;
use tracing::trace;

use crate::zip::{Eocd64Locator, Eocd64Record, EocdRecord};
use crate::{Error, Result};

/// First comment byte announcing an embedded fast index.
pub const FAST_INDEX_MARKER: u8 = 0x04;

/// Comment length carrying the marker plus the 4-byte index end offset.
pub const FAST_INDEX_COMMENT_LENGTH: usize = 5;

/// Everything the loader needs from the archive's tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTrailer {
    /// Offset of the EOCD signature.
    pub eocd_offset: usize,
    /// Total number of central directory records.
    pub entry_count: u32,
    /// Size of the central directory in bytes.
    pub central_dir_size: u32,
    /// Offset of the first central directory record.
    pub central_dir_offset: u32,
    /// Whether the counts came from a ZIP64 EOCD record.
    pub zip64: bool,
    /// End offset of the embedded fast index, if the comment announces one.
    pub fast_index_end: Option<u32>,
}

/// Build the comment that announces a fast index ending at `index_end`.
pub fn fast_index_comment(index_end: u32) -> [u8; FAST_INDEX_COMMENT_LENGTH] {
    let mut comment = [0u8; FAST_INDEX_COMMENT_LENGTH];
    comment[0] = FAST_INDEX_MARKER;
    comment[1..].copy_from_slice(&index_end.to_le_bytes());
    comment
}

/// Parse the archive trailer.
pub fn read_trailer(data: &[u8]) -> Result<ArchiveTrailer> {
    if data.len() < EocdRecord::SIZE {
        return Err(Error::NotAnArchive(format!(
            "{} bytes is shorter than an end of central directory record",
            data.len()
        )));
    }

    let eocd_offset = find_eocd(data)?;
    let mut reader = BinaryReader::new_at(data, eocd_offset + 4);
    let eocd: EocdRecord = reader.read_struct()?;

    let (entry_count, central_dir_size, central_dir_offset, zip64) =
        match read_zip64_eocd(data, eocd_offset)? {
            Some(eocd64) => {
                let count = eocd64.central_dir_count_total;
                let size = eocd64.central_dir_size;
                let offset = eocd64.central_dir_offset;
                (count, size, offset, true)
            }
            None if eocd.is_zip64() => return Err(Error::Zip64EocdNotFound),
            None => (
                eocd.central_dir_count_total as u64,
                eocd.central_dir_size as u64,
                eocd.central_dir_offset as u64,
                false,
            ),
        };

    if entry_count > i32::MAX as u64
        || central_dir_offset.saturating_add(central_dir_size) > eocd_offset as u64
    {
        return Err(Error::NotAnArchive(format!(
            "central directory of {} entries at {}+{} does not fit before {}",
            entry_count, central_dir_offset, central_dir_size, eocd_offset
        )));
    }

    let comment_start = eocd_offset + EocdRecord::SIZE;
    let comment_end = (comment_start + eocd.comment_length as usize).min(data.len());
    let fast_index_end = parse_fast_index_comment(&data[comment_start..comment_end]);

    let trailer = ArchiveTrailer {
        eocd_offset,
        entry_count: entry_count as u32,
        central_dir_size: central_dir_size as u32,
        central_dir_offset: central_dir_offset as u32,
        zip64,
        fast_index_end,
    };
    trace!("archive trailer: {:?}", trailer);
    Ok(trailer)
}

fn parse_fast_index_comment(comment: &[u8]) -> Option<u32> {
    if comment.len() < FAST_INDEX_COMMENT_LENGTH || comment[0] != FAST_INDEX_MARKER {
        return None;
    }
    Some(u32::from_le_bytes([
        comment[1], comment[2], comment[3], comment[4],
    ]))
}

/// Scan backwards for an EOCD signature whose comment fits the file.
fn find_eocd(data: &[u8]) -> Result<usize> {
    let last_candidate = data.len() - EocdRecord::SIZE;
    let search_start = last_candidate.saturating_sub(EocdRecord::MAX_COMMENT_LENGTH);
    let mut search_end = last_candidate + 4;

    while search_end > search_start {
        let window = &data[search_start..search_end];
        let Some(pos) = memchr::memmem::rfind(window, &EocdRecord::MAGIC) else {
            break;
        };
        let offset = search_start + pos;

        let comment_length = BinaryReader::new(data).u16_at(offset + 20)? as usize;
        if offset + EocdRecord::SIZE + comment_length <= data.len() {
            return Ok(offset);
        }
        search_end = offset + 3;
    }

    Err(Error::EocdNotFound)
}

/// Follow the ZIP64 locator in front of the EOCD, if there is one.
fn read_zip64_eocd(data: &[u8], eocd_offset: usize) -> Result<Option<Eocd64Record>> {
    if eocd_offset < Eocd64Locator::SIZE {
        return Ok(None);
    }

    let locator_offset = eocd_offset - Eocd64Locator::SIZE;
    let reader = BinaryReader::new(data);
    if reader.u32_at(locator_offset)? != Eocd64Locator::SIGNATURE {
        return Ok(None);
    }

    let mut reader = BinaryReader::new_at(data, locator_offset + 4);
    let locator: Eocd64Locator = reader.read_struct()?;

    let record_offset = usize::try_from(locator.zip64_eocd_offset)
        .ok()
        .filter(|&offset| offset + Eocd64Record::SIZE <= locator_offset)
        .ok_or(Error::Zip64EocdNotFound)?;

    let sig = BinaryReader::new(data).u32_at(record_offset)?;
    if sig != Eocd64Record::SIGNATURE {
        return Err(Error::InvalidSignature {
            expected: Eocd64Record::SIGNATURE,
            actual: sig,
        });
    }

    let mut reader = BinaryReader::new_at(data, record_offset + 4);
    Ok(Some(reader.read_struct()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    fn eocd_bytes(count: u16, cd_size: u32, cd_offset: u32, comment: &[u8]) -> Vec<u8> {
        let record = EocdRecord {
            central_dir_count_disk: count,
            central_dir_count_total: count,
            central_dir_size: cd_size,
            central_dir_offset: cd_offset,
            comment_length: comment.len() as u16,
            ..Default::default()
        };
        let mut out = EocdRecord::MAGIC.to_vec();
        out.extend_from_slice(record.as_bytes());
        out.extend_from_slice(comment);
        out
    }

    #[test]
    fn test_empty_archive_trailer() {
        let data = eocd_bytes(0, 0, 0, &[]);
        let trailer = read_trailer(&data).unwrap();
        assert_eq!(trailer.entry_count, 0);
        assert_eq!(trailer.eocd_offset, 0);
        assert_eq!(trailer.fast_index_end, None);
    }

    #[test]
    fn test_fast_index_comment() {
        let mut data = vec![0u8; 100];
        data.extend(eocd_bytes(0, 0, 0, &fast_index_comment(77)));
        let trailer = read_trailer(&data).unwrap();
        assert_eq!(trailer.eocd_offset, 100);
        assert_eq!(trailer.fast_index_end, Some(77));
    }

    #[test]
    fn test_foreign_comment_is_ignored() {
        let data = eocd_bytes(0, 0, 0, b"built by hand");
        assert_eq!(read_trailer(&data).unwrap().fast_index_end, None);
    }

    #[test]
    fn test_signature_inside_comment_is_skipped() {
        // A comment containing the EOCD magic must not be mistaken for the record.
        let mut comment = b"xx".to_vec();
        comment.extend_from_slice(&EocdRecord::MAGIC);
        comment.extend_from_slice(&[0u8; 16]);
        comment.extend_from_slice(&[0xFF, 0xFF]); // fake comment length overruns the file
        let data = eocd_bytes(0, 0, 0, &comment);
        assert_eq!(read_trailer(&data).unwrap().eocd_offset, 0);
    }

    #[test]
    fn test_not_an_archive() {
        assert!(matches!(read_trailer(b"short"), Err(Error::NotAnArchive(_))));
        assert!(matches!(
            read_trailer(&[0xAAu8; 300]),
            Err(Error::EocdNotFound)
        ));
    }

    #[test]
    fn test_zip64_sentinel_without_locator() {
        let data = eocd_bytes(0xFFFF, 0, 0, &[]);
        assert!(matches!(read_trailer(&data), Err(Error::Zip64EocdNotFound)));
    }

    #[test]
    fn test_central_directory_past_eocd() {
        let mut data = vec![0u8; 10];
        data.extend(eocd_bytes(1, 46, 8, &[]));
        assert!(matches!(read_trailer(&data), Err(Error::NotAnArchive(_))));
    }
}
