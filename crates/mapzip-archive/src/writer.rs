//! Builder for archives the reader understands, optionally carrying a fast
//! index.
//!
//! Entries are laid out back to back in insertion order, followed by the
//! package table and IKV index (when enabled), the central directory, and the
//! end records.
//!
//! # Example
//!
//! ```
//! use mapzip_archive::{Archive, ArchiveWriter, CompressionMethod, IndexMode, LoadOptions, ReadArchive};
//!
//! let mut writer = ArchiveWriter::new().with_index(IndexMode::SizeAware);
//! writer.add_file("a/b.txt", b"hello", CompressionMethod::Store)?;
//! writer.add_directory("a/c")?;
//!
//! let archive = Archive::from_bytes(writer.build()?, &LoadOptions::default())?;
//! assert_eq!(archive.get_data("a/b.txt")?.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), mapzip_archive::Error>(())
//! ```

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use mapzip_common::hash::hash_str;
use zerocopy::IntoBytes;

use crate::ikv::{encode_index, package_of, IkvValue, IndexMode, PackageIndex};
use crate::region::MAX_ARCHIVE_SIZE;
use crate::trailer::fast_index_comment;
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, Eocd64Locator, Eocd64Record, EocdRecord,
    LocalFileHeader,
};
use crate::{Error, Result};

const VERSION_STORED: u16 = 10;
const VERSION_DEFLATED: u16 = 20;

/// Names are UTF-8.
const FLAG_UTF8: u16 = 0x0800;

/// 1980-01-01 00:00:00, the DOS epoch.
const DOS_EPOCH: u32 = (1 << 21) | (1 << 16);

const DIRECTORY_ATTRIBUTES: u32 = 0x10;

/// Entry count from which the 16-bit EOCD counter overflows.
const ZIP64_ENTRY_THRESHOLD: usize = 0xFFFF;

#[derive(Debug)]
struct PendingEntry {
    /// Name as written; directories keep their slash.
    name: String,
    header: CentralDirectoryHeader,
    /// Index value; `None` for directories.
    value: Option<IkvValue>,
}

/// Builds an archive in memory.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    data: Vec<u8>,
    entries: Vec<PendingEntry>,
    index_mode: Option<IndexMode>,
    force_zip64: bool,
}

impl ArchiveWriter {
    /// Create a writer producing a plain archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed a fast index of the given encoding.
    ///
    /// Size-aware indexes point straight at payload bytes, so every file is
    /// stored uncompressed regardless of the method passed to
    /// [`add_file`](Self::add_file).
    pub fn with_index(mut self, mode: IndexMode) -> Self {
        self.index_mode = Some(mode);
        self
    }

    /// Always write the ZIP64 end records, even for small archives.
    pub fn with_zip64(mut self, force: bool) -> Self {
        self.force_zip64 = force;
        self
    }

    /// Number of entries added so far, directories included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a file. Adding a name twice writes two records; readers keep the
    /// first.
    pub fn add_file(&mut self, name: &str, contents: &[u8], method: CompressionMethod) -> Result<()> {
        self.add_file_with_extra(name, contents, method, &[])
    }

    /// Add a file whose local header carries `local_extra` as its extra
    /// field. The central record gets no extra field, as alignment tools do.
    pub fn add_file_with_extra(
        &mut self,
        name: &str,
        contents: &[u8],
        method: CompressionMethod,
        local_extra: &[u8],
    ) -> Result<()> {
        let method = match self.index_mode {
            Some(IndexMode::SizeAware) => CompressionMethod::Store,
            _ => method,
        };
        let stored: Cow<'_, [u8]> = match method {
            CompressionMethod::Store => Cow::Borrowed(contents),
            CompressionMethod::Deflate => Cow::Owned(deflate(contents)?),
        };

        let mut crc = Crc::new();
        crc.update(contents);

        let header_offset = self.data.len();
        let payload_offset = header_offset + LocalFileHeader::SIZE + name.len() + local_extra.len();
        check_size(payload_offset + stored.len())?;

        let local = LocalFileHeader {
            version_needed: match method {
                CompressionMethod::Store => VERSION_STORED,
                CompressionMethod::Deflate => VERSION_DEFLATED,
            },
            flags: FLAG_UTF8,
            compression_method: method as u16,
            last_modified: DOS_EPOCH,
            crc32: crc.sum(),
            compressed_size: stored.len() as u32,
            uncompressed_size: contents.len() as u32,
            file_name_length: field_length(name, name.len())?,
            extra_field_length: field_length(name, local_extra.len())?,
        };
        self.write_local(&local, name, local_extra, &stored);

        let value = match self.index_mode {
            Some(IndexMode::SizeAware) => IkvValue::Slice {
                offset: payload_offset as u32,
                size: stored.len() as u32,
            },
            _ => IkvValue::LocalHeader(header_offset as u32),
        };
        self.entries.push(PendingEntry {
            name: name.to_string(),
            header: CentralDirectoryHeader::for_local(&local, header_offset as u32, 0),
            value: Some(value),
        });
        Ok(())
    }

    /// Add a directory entry; a trailing `/` is appended when missing.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };

        let header_offset = self.data.len();
        check_size(header_offset + LocalFileHeader::SIZE + name.len())?;

        let local = LocalFileHeader {
            version_needed: VERSION_STORED,
            flags: FLAG_UTF8,
            last_modified: DOS_EPOCH,
            file_name_length: field_length(&name, name.len())?,
            ..Default::default()
        };
        self.write_local(&local, &name, &[], &[]);

        self.entries.push(PendingEntry {
            header: CentralDirectoryHeader::for_local(
                &local,
                header_offset as u32,
                DIRECTORY_ATTRIBUTES,
            ),
            name,
            value: None,
        });
        Ok(())
    }

    fn write_local(&mut self, header: &LocalFileHeader, name: &str, extra: &[u8], payload: &[u8]) {
        self.data.extend_from_slice(&LocalFileHeader::MAGIC);
        self.data.extend_from_slice(header.as_bytes());
        self.data.extend_from_slice(name.as_bytes());
        self.data.extend_from_slice(extra);
        self.data.extend_from_slice(payload);
    }

    /// Finish the archive and return its bytes.
    pub fn build(self) -> Result<Vec<u8>> {
        let mut data = self.data;

        let index_end = match self.index_mode {
            Some(mode) => {
                let files: Vec<(&str, IkvValue)> = self
                    .entries
                    .iter()
                    .filter_map(|e| e.value.map(|v| (e.name.as_str(), v)))
                    .collect();

                let (classes, resources): (Vec<&str>, Vec<&str>) =
                    files.iter().map(|(name, _)| *name).partition(|n| n.ends_with(".class"));
                let packages = PackageIndex::from_names(
                    classes.into_iter().map(package_of),
                    resources.into_iter().map(package_of),
                );
                data.extend(packages.encode());

                let keyed: Vec<(u64, IkvValue)> = files
                    .iter()
                    .map(|(name, value)| (hash_str(name), *value))
                    .collect();
                data.extend(encode_index(&keyed, mode));
                Some(check_size(data.len())? as u32)
            }
            None => None,
        };

        let central_dir_offset = data.len();
        for entry in &self.entries {
            data.extend_from_slice(&CentralDirectoryHeader::MAGIC);
            data.extend_from_slice(entry.header.as_bytes());
            data.extend_from_slice(entry.name.as_bytes());
        }
        let central_dir_size = data.len() - central_dir_offset;

        let count = self.entries.len();
        let zip64 = self.force_zip64 || count >= ZIP64_ENTRY_THRESHOLD;
        if zip64 {
            let record_offset = data.len();
            let record = Eocd64Record::new(
                count as u64,
                central_dir_size as u64,
                central_dir_offset as u64,
            );
            data.extend_from_slice(&Eocd64Record::MAGIC);
            data.extend_from_slice(record.as_bytes());

            let locator = Eocd64Locator::pointing_at(record_offset as u64);
            data.extend_from_slice(&Eocd64Locator::MAGIC);
            data.extend_from_slice(locator.as_bytes());
        }

        let comment = index_end.map(fast_index_comment);
        let comment: &[u8] = match &comment {
            Some(comment) => comment,
            None => &[],
        };
        // Readers take the real count from the ZIP64 record.
        let short_count = if zip64 { usize::MAX } else { count };
        let eocd = EocdRecord::new(
            short_count,
            central_dir_size as u32,
            central_dir_offset as u32,
            comment.len() as u16,
        );
        data.extend_from_slice(&EocdRecord::MAGIC);
        data.extend_from_slice(eocd.as_bytes());
        data.extend_from_slice(comment);

        check_size(data.len())?;
        Ok(data)
    }

    /// Finish the archive and write it to `path`.
    pub fn write_to_file<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let data = self.build()?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

fn deflate(contents: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(contents)?;
    Ok(encoder.finish()?)
}

fn field_length(name: &str, length: usize) -> Result<u16> {
    u16::try_from(length)
        .map_err(|_| Error::InvalidEntry(format!("{}: field of {} bytes", name, length)))
}

fn check_size(size: usize) -> Result<usize> {
    if size as u64 > MAX_ARCHIVE_SIZE {
        return Err(Error::ArchiveTooLarge(size as u64));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trailer::read_trailer;

    #[test]
    fn test_layout_of_single_stored_file() {
        let mut writer = ArchiveWriter::new();
        writer.add_file("a.txt", b"hello", CompressionMethod::Store).unwrap();
        let data = writer.build().unwrap();

        assert_eq!(&data[..4], &LocalFileHeader::MAGIC);
        assert_eq!(&data[35..40], b"hello");

        let trailer = read_trailer(&data).unwrap();
        assert_eq!(trailer.entry_count, 1);
        assert_eq!(trailer.central_dir_offset, 40);
        assert_eq!(trailer.central_dir_size, 46 + 5);
        assert!(!trailer.zip64);
        assert_eq!(trailer.fast_index_end, None);
    }

    #[test]
    fn test_index_end_is_announced() {
        let mut writer = ArchiveWriter::new().with_index(IndexMode::SizeUnaware);
        writer.add_file("x", b"1", CompressionMethod::Deflate).unwrap();
        let data = writer.build().unwrap();

        let trailer = read_trailer(&data).unwrap();
        assert_eq!(trailer.fast_index_end, Some(trailer.central_dir_offset));
    }

    #[test]
    fn test_size_aware_index_forces_store() {
        let mut writer = ArchiveWriter::new().with_index(IndexMode::SizeAware);
        writer
            .add_file("big.txt", &[b'a'; 1000], CompressionMethod::Deflate)
            .unwrap();
        assert_eq!({ writer.entries[0].header.compression_method }, 0);
        assert_eq!({ writer.entries[0].header.compressed_size }, 1000);
    }

    #[test]
    fn test_forced_zip64() {
        let mut writer = ArchiveWriter::new().with_zip64(true);
        writer.add_file("z", b"z", CompressionMethod::Store).unwrap();
        let data = writer.build().unwrap();

        let trailer = read_trailer(&data).unwrap();
        assert!(trailer.zip64);
        assert_eq!(trailer.entry_count, 1);
    }

    #[test]
    fn test_directory_gets_slash() {
        let mut writer = ArchiveWriter::new();
        writer.add_directory("a/c.txt").unwrap();
        assert_eq!(writer.entries[0].name, "a/c.txt/");
        assert!(writer.entries[0].value.is_none());
    }

    #[test]
    fn test_crc_matches_contents() {
        let mut writer = ArchiveWriter::new();
        writer.add_file("c", b"123456789", CompressionMethod::Deflate).unwrap();
        // CRC-32 check value of "123456789".
        assert_eq!({ writer.entries[0].header.crc32 }, 0xCBF4_3926);
    }
}
