//! Archives served through their embedded fast index.

use std::borrow::Cow;
use std::collections::HashSet;

use mapzip_common::hash::{hash, hash_str};
use tracing::{debug, trace};

use super::central::CentralRecords;
use super::{in_directory, ReadArchive};
use crate::config::LoadOptions;
use crate::decompress::{EntryBuffer, Payload};
use crate::ikv::{local_name, IkvIndex, IkvValue, IndexMode, PackageIndex};
use crate::pool::BufferPool;
use crate::region::MappedRegion;
use crate::resource::Resource;
use crate::trailer::ArchiveTrailer;
use crate::{Error, Result};

/// An archive whose lookups go through the IKV index.
///
/// Opening costs one pass over the index arrays. The central directory is
/// walked by [`process_resources`](ReadArchive::process_resources) and, in
/// size-unaware indexes, by lookups whose 32-bit key collides with another
/// member's. Directory entries are not indexed and are never found by path.
pub struct IndexedArchive {
    region: MappedRegion,
    trailer: ArchiveTrailer,
    index: IkvIndex,
    packages: PackageIndex,
    pool: BufferPool,
    max_extra_field_length: u16,
}

impl IndexedArchive {
    /// Parse the index and package table ending at `index_end`.
    ///
    /// Any failure is reported as [`Error::IndexMissing`].
    pub(crate) fn parse_index(data: &[u8], index_end: u32) -> Result<(IkvIndex, PackageIndex)> {
        let as_missing = |e: Error| match e {
            Error::IndexMissing(_) => e,
            other => Error::IndexMissing(other.to_string()),
        };
        let index = IkvIndex::load(data, index_end as usize).map_err(as_missing)?;
        let packages = PackageIndex::load(data, index.start()).map_err(as_missing)?;
        Ok((index, packages))
    }

    pub(crate) fn new(
        region: MappedRegion,
        trailer: ArchiveTrailer,
        index: IkvIndex,
        packages: PackageIndex,
        options: &LoadOptions,
    ) -> Self {
        debug!(
            "opened {} with fast index: {} keys, {:?}, {:?} packages",
            region.label(),
            index.len(),
            index.mode(),
            packages.counts()
        );
        Self {
            region,
            trailer,
            index,
            packages,
            pool: BufferPool::with_config(options.pool.clone()),
            max_extra_field_length: options.max_extra_field_length,
        }
    }

    /// The loaded index.
    pub fn index(&self) -> &IkvIndex {
        &self.index
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Where the archive came from.
    pub fn label(&self) -> &str {
        self.region.label()
    }

    /// Whether the archive is served from a memory mapping.
    pub fn is_mapped(&self) -> bool {
        self.region.is_mapped()
    }

    fn payload_by_key(&self, key: u64) -> Result<Option<Payload<'_>>> {
        let data = self.region.bytes()?;
        self.locate(data, key, None)
    }

    /// Payload stored under `key`.
    ///
    /// Size-unaware keys are truncated to 32 bits, so a hit only counts when
    /// the local header's name is `path` (or hashes to the full `key` when no
    /// path is known). A hit on another member means the slot was taken by a
    /// colliding name; the central directory is searched instead.
    fn locate<'a>(
        &'a self,
        data: &'a [u8],
        key: u64,
        path: Option<&str>,
    ) -> Result<Option<Payload<'a>>> {
        let Some(value) = self.index.get(key) else {
            return Ok(None);
        };
        let IkvValue::LocalHeader(header) = value else {
            return IkvIndex::payload(data, value, self.max_extra_field_length).map(Some);
        };

        let is_wanted = |name: &[u8]| match path {
            Some(path) => name == path.as_bytes(),
            None => hash(name) == key,
        };
        if is_wanted(local_name(data, header as usize)?) {
            return IkvIndex::payload(data, value, self.max_extra_field_length).map(Some);
        }

        trace!("index key {:#010x} collides, searching central directory", key as u32);
        for record in CentralRecords::new(data, &self.trailer) {
            let record = record?;
            if record.name.ends_with(b"/") || !is_wanted(record.name) {
                continue;
            }
            let value = IkvValue::LocalHeader(record.header_offset as u32);
            return IkvIndex::payload(data, value, self.max_extra_field_length).map(Some);
        }
        Ok(None)
    }

    /// Contents of the entry whose path hashes to `key`.
    pub fn get_data_by_key(&self, key: u64) -> Result<Option<Vec<u8>>> {
        self.payload_by_key(key)?.map(|p| p.to_vec()).transpose()
    }

    /// Contents of the entry whose path hashes to `key`, as a buffer.
    pub fn get_byte_buffer_by_key(&self, key: u64) -> Result<Option<EntryBuffer<'_>>> {
        self.payload_by_key(key)?
            .map(|p| p.to_buffer(&self.pool))
            .transpose()
    }

    /// Whether any `.class` entry lives directly in `package`.
    pub fn has_class_package(&self, package: &str) -> Result<bool> {
        self.region.bytes()?;
        Ok(self.packages.has_class_package(package))
    }

    /// Whether any other entry lives directly in `package`.
    pub fn has_resource_package(&self, package: &str) -> Result<bool> {
        self.region.bytes()?;
        Ok(self.packages.has_resource_package(package))
    }
}

impl ReadArchive for IndexedArchive {
    fn get_resource(&self, path: &str) -> Result<Option<Resource<'_>>> {
        let data = self.region.bytes()?;
        let Some(payload) = self.locate(data, hash_str(path), Some(path))? else {
            return Ok(None);
        };
        Ok(Some(Resource::from_payload(
            Cow::Owned(path.to_string()),
            payload,
            &self.pool,
        )))
    }

    fn process_resources<F, V>(&self, dir: &str, mut filter: F, mut visitor: V) -> Result<()>
    where
        F: FnMut(&str) -> bool,
        V: FnMut(Resource<'_>) -> Result<()>,
    {
        let data = self.region.bytes()?;
        let mut seen = HashSet::new();

        for record in CentralRecords::new(data, &self.trailer) {
            let record = record?;
            let (name, is_directory) = record.decoded_name();
            if is_directory || !in_directory(&name, dir) || !filter(&name) {
                continue;
            }
            if !seen.insert(name.clone()) {
                continue;
            }

            // 32-bit keys can collide; the central record's own header is exact.
            let value = match self.index.mode() {
                IndexMode::SizeAware => self.index.get_path(&name),
                IndexMode::SizeUnaware => None,
            }
            .unwrap_or(IkvValue::LocalHeader(record.header_offset as u32));

            let payload = IkvIndex::payload(data, value, self.max_extra_field_length)?;
            visitor(Resource::from_payload(name, payload, &self.pool))?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.region.close();
    }

    fn is_closed(&self) -> bool {
        self.region.is_closed()
    }
}

impl std::fmt::Debug for IndexedArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedArchive")
            .field("region", &self.region)
            .field("index", &self.index)
            .field("packages", &self.packages.counts())
            .finish()
    }
}
