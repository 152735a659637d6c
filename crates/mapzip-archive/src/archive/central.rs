//! Archives read through their central directory.

use std::borrow::Cow;

use mapzip_common::hash::hash_str;
use mapzip_common::BinaryReader;
use tracing::{debug, trace};

use super::{in_directory, ReadArchive};
use crate::config::LoadOptions;
use crate::entry::Entry;
use crate::pool::BufferPool;
use crate::region::MappedRegion;
use crate::resource::Resource;
use crate::trailer::ArchiveTrailer;
use crate::zip::{CentralDirectoryHeader, LocalFileHeader, ZIP64_EXTRA_ID, ZIP64_SENTINEL};
use crate::{Error, Result};

/// One central directory record, borrowed from the archive bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CentralRecord<'a> {
    /// Raw name, including the trailing `/` of directories.
    pub name: &'a [u8],
    pub header: CentralDirectoryHeader,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub header_offset: u64,
}

impl<'a> CentralRecord<'a> {
    /// Decoded name without the directory slash, and whether it had one.
    pub fn decoded_name(&self) -> (Cow<'a, str>, bool) {
        match String::from_utf8_lossy(self.name) {
            Cow::Borrowed(name) => match name.strip_suffix('/') {
                Some(stripped) => (Cow::Borrowed(stripped), true),
                None => (Cow::Borrowed(name), false),
            },
            Cow::Owned(mut name) => {
                let is_directory = name.ends_with('/');
                if is_directory {
                    name.pop();
                }
                (Cow::Owned(name), is_directory)
            }
        }
    }
}

/// Sequential walk over the central directory.
///
/// Stops after the first error.
pub(crate) struct CentralRecords<'a> {
    reader: BinaryReader<'a>,
    index: usize,
    count: usize,
}

impl<'a> CentralRecords<'a> {
    pub fn new(data: &'a [u8], trailer: &ArchiveTrailer) -> Self {
        Self {
            reader: BinaryReader::new_at(data, trailer.central_dir_offset as usize),
            index: 0,
            count: trailer.entry_count as usize,
        }
    }

    fn read_record(&mut self) -> Result<CentralRecord<'a>> {
        let sig = self.reader.read_u32()?;
        if sig != CentralDirectoryHeader::SIGNATURE {
            if self.index == 0 {
                return Err(Error::NotAnArchive(format!(
                    "no central directory record at offset {}",
                    self.reader.position() - 4
                )));
            }
            return Err(Error::InvalidSignature {
                expected: CentralDirectoryHeader::SIGNATURE,
                actual: sig,
            });
        }

        let header: CentralDirectoryHeader = self.reader.read_struct()?;
        let name = self.reader.read_bytes(header.file_name_length as usize)?;
        let extra = self.reader.read_bytes(header.extra_field_length as usize)?;
        self.reader.advance(header.file_comment_length as usize);

        let mut record = CentralRecord {
            name,
            header,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            header_offset: header.local_header_offset as u64,
        };
        apply_zip64_extra(&mut record, extra)?;
        Ok(record)
    }
}

impl<'a> Iterator for CentralRecords<'a> {
    type Item = Result<CentralRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let record = self.read_record();
        self.index = if record.is_err() { self.count } else { self.index + 1 };
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (0, Some(remaining))
    }
}

/// Replace sentinel sizes and offsets with their ZIP64 extra field values.
fn apply_zip64_extra(record: &mut CentralRecord<'_>, extra: &[u8]) -> Result<()> {
    let header = record.header;
    if !header.defers_to_zip64() {
        return Ok(());
    }

    let mut reader = BinaryReader::new(extra);
    while reader.remaining() >= 4 {
        let id = reader.read_u16()?;
        let size = reader.read_u16()? as usize;
        let field = reader.read_bytes(size)?;
        if id != ZIP64_EXTRA_ID {
            continue;
        }

        let mut field = BinaryReader::new(field);
        if header.uncompressed_size == ZIP64_SENTINEL {
            record.uncompressed_size = field.read_u64()?;
        }
        if header.compressed_size == ZIP64_SENTINEL {
            record.compressed_size = field.read_u64()?;
        }
        if header.local_header_offset == ZIP64_SENTINEL {
            record.header_offset = field.read_u64()?;
        }
        break;
    }
    Ok(())
}

/// Open-addressed name lookup over the entry list.
///
/// Slots hold `index + 1`; zero marks an empty slot. The table is kept at
/// most half full, so every probe sequence reaches an empty slot.
#[derive(Debug)]
struct NameTable {
    slots: Box<[u32]>,
    mask: usize,
}

impl NameTable {
    fn with_capacity(count: usize) -> Self {
        let size = count.saturating_mul(2).max(2).next_power_of_two();
        Self {
            slots: vec![0; size].into_boxed_slice(),
            mask: size - 1,
        }
    }

    /// The entry named `name`, or the free slot where it would go.
    fn probe(&self, entries: &[Entry], name: &str) -> std::result::Result<usize, usize> {
        let mut slot = hash_str(name) as usize & self.mask;
        loop {
            match self.slots[slot] {
                0 => return Err(slot),
                n => {
                    let index = n as usize - 1;
                    if entries[index].name() == name {
                        return Ok(index);
                    }
                }
            }
            slot = (slot + 1) & self.mask;
        }
    }
}

/// An archive whose entries were read from the central directory.
pub struct CentralDirectoryArchive {
    region: MappedRegion,
    entries: Vec<Entry>,
    table: NameTable,
    pool: BufferPool,
    max_extra_field_length: u16,
}

impl CentralDirectoryArchive {
    /// Parse the central directory of `region`.
    ///
    /// Duplicate names keep their first record. Names are stored without a
    /// trailing `/`, so a file `x` and a directory `x/` share one name and
    /// the later of the two is dropped like any other duplicate.
    ///
    /// When a record's local header
    /// starts exactly where the previous entry's payload would end, that
    /// payload offset is cached without touching the local header.
    pub(crate) fn load(
        region: MappedRegion,
        trailer: &ArchiveTrailer,
        options: &LoadOptions,
    ) -> Result<Self> {
        let data = region.bytes()?;
        let count = trailer.entry_count as usize;
        if count.saturating_mul(CentralDirectoryHeader::SIZE) > trailer.central_dir_size as usize {
            return Err(Error::NotAnArchive(format!(
                "{} entries do not fit in a {} byte central directory",
                count, trailer.central_dir_size
            )));
        }

        let mut entries: Vec<Entry> = Vec::with_capacity(count);
        let mut table = NameTable::with_capacity(count);
        let mut previous: Option<(usize, i64)> = None;
        let mut duplicates = 0usize;

        for record in CentralRecords::new(data, trailer) {
            let record = record?;
            let header_offset = record.header_offset as i32;

            if let Some((index, data_offset)) = previous.take() {
                let entry = &entries[index];
                if data_offset + entry.compressed_size() as i64 == header_offset as i64 {
                    entry.set_data_offset(data_offset);
                }
            }

            if record.uncompressed_size > i32::MAX as u64 {
                return Err(Error::ArchiveTooLarge(record.uncompressed_size));
            }

            let (name, is_directory) = record.decoded_name();
            let slot = match table.probe(&entries, &name) {
                Ok(_) => {
                    trace!("skipping duplicate entry {}", name);
                    duplicates += 1;
                    continue;
                }
                Err(slot) => slot,
            };

            let name_length = record.header.file_name_length;
            let entry = if is_directory {
                Entry::directory(name.into_owned(), header_offset, name_length)
            } else {
                previous = Some((
                    entries.len(),
                    LocalFileHeader::payload_start(
                        header_offset as u64,
                        name_length,
                        record.header.extra_field_length,
                    ) as i64,
                ));
                Entry::new(
                    name.into_owned(),
                    record.compressed_size as i32,
                    record.uncompressed_size as i32,
                    record.header.compression_method,
                    header_offset,
                    name_length,
                )
            };

            table.slots[slot] = entries.len() as u32 + 1;
            entries.push(entry);
        }

        debug!(
            "read central directory of {}: {} entries, {} duplicates skipped",
            region.label(),
            entries.len(),
            duplicates
        );

        Ok(Self {
            region,
            entries,
            table,
            pool: BufferPool::with_config(options.pool.clone()),
            max_extra_field_length: options.max_extra_field_length,
        })
    }

    /// Look up an entry by exact name (directories without their slash).
    pub fn entry(&self, name: &str) -> Result<Option<&Entry>> {
        self.region.bytes()?;
        Ok(self
            .table
            .probe(&self.entries, name)
            .ok()
            .map(|index| &self.entries[index]))
    }

    /// All entries in central directory order; empty after close.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Where the archive came from.
    pub fn label(&self) -> &str {
        self.region.label()
    }

    /// Whether the archive is served from a memory mapping.
    pub fn is_mapped(&self) -> bool {
        self.region.is_mapped()
    }
}

impl ReadArchive for CentralDirectoryArchive {
    fn get_resource(&self, path: &str) -> Result<Option<Resource<'_>>> {
        let data = self.region.bytes()?;
        Ok(self.table.probe(&self.entries, path).ok().map(|index| {
            Resource::from_entry(
                &self.entries[index],
                data,
                &self.pool,
                self.max_extra_field_length,
            )
        }))
    }

    fn process_resources<F, V>(&self, dir: &str, mut filter: F, mut visitor: V) -> Result<()>
    where
        F: FnMut(&str) -> bool,
        V: FnMut(Resource<'_>) -> Result<()>,
    {
        let data = self.region.bytes()?;
        for entry in &self.entries {
            if entry.is_directory() || !in_directory(entry.name(), dir) || !filter(entry.name()) {
                continue;
            }
            visitor(Resource::from_entry(
                entry,
                data,
                &self.pool,
                self.max_extra_field_length,
            ))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.region.close() {
            self.entries = Vec::new();
            self.table = NameTable::with_capacity(0);
        }
    }

    fn is_closed(&self) -> bool {
        self.region.is_closed()
    }
}

impl std::fmt::Debug for CentralDirectoryArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CentralDirectoryArchive")
            .field("region", &self.region)
            .field("entries", &self.entries.len())
            .finish()
    }
}
