//! The embedded fast index ("IKV") and the package table in front of it.
//!
//! Layout, little-endian, ending at the index end offset named in the archive
//! comment:
//!
//! ```text
//! [class package hashes   u64 * c]
//! [resource package hashes u64 * r]
//! [c: u32][r: u32]
//! [keys   (u64 | u32) * n]
//! [values (u64 | u32) * n]
//! [n: u32][has_size_field: u8]      <- index end
//! ```
//!
//! With the size field, keys are `xxh3(path)` and values pack
//! `offset << 32 | size` of a stored payload. Without it, keys are the low 32
//! bits of the hash and values are local header offsets.

use mapzip_common::hash::hash_str;
use mapzip_common::{BinaryReader, IntIntMap, LongLongMap};

use crate::decompress::Payload;
use crate::zip::{CompressionMethod, LocalFileHeader};
use crate::{Error, Result};

/// Bytes of the `[n][has_size_field]` trailer.
pub const INDEX_TRAILER_SIZE: usize = 5;

/// Bytes of the `[c][r]` package table trailer.
pub const PACKAGE_TRAILER_SIZE: usize = 8;

/// Which of the two index encodings to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// 64-bit keys, values pointing straight at stored payloads.
    SizeAware,
    /// 32-bit keys, values pointing at local headers.
    SizeUnaware,
}

impl IndexMode {
    fn word_size(self) -> usize {
        match self {
            Self::SizeAware => 8,
            Self::SizeUnaware => 4,
        }
    }
}

/// A decoded index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkvValue {
    /// Payload bytes at `offset..offset + size`, stored uncompressed.
    Slice { offset: u32, size: u32 },
    /// Offset of the entry's local file header.
    LocalHeader(u32),
}

impl IkvValue {
    /// Pack a slice location into a 64-bit value.
    #[inline]
    pub fn pack(offset: u32, size: u32) -> i64 {
        ((offset as i64) << 32) | size as i64
    }

    /// Decode a packed 64-bit value.
    #[inline]
    pub fn unpack(value: i64) -> Self {
        Self::Slice {
            offset: (value >> 32) as u32,
            size: value as i32 as u32,
        }
    }
}

enum IkvMap {
    SizeAware(LongLongMap),
    SizeUnaware(IntIntMap),
}

/// Loaded fast index.
pub struct IkvIndex {
    map: IkvMap,
    start: usize,
}

impl IkvIndex {
    /// Parse the index ending at `index_end`.
    ///
    /// Every structural problem is reported as [`Error::IndexMissing`]; the
    /// archive can still be read through its central directory.
    pub fn load(region: &[u8], index_end: usize) -> Result<Self> {
        if index_end > region.len() || index_end < INDEX_TRAILER_SIZE {
            return Err(Error::IndexMissing(format!(
                "index end {} outside of {} byte archive",
                index_end,
                region.len()
            )));
        }

        let trailer = index_end - INDEX_TRAILER_SIZE;
        let reader = BinaryReader::new(region);
        let entry_count = reader.u32_at(trailer)? as usize;
        let mode = match region[index_end - 1] {
            1 => IndexMode::SizeAware,
            0 => IndexMode::SizeUnaware,
            flag => {
                return Err(Error::IndexMissing(format!("unknown size flag {}", flag)));
            }
        };

        let data_size = entry_count
            .checked_mul(mode.word_size() * 2)
            .filter(|&size| size <= trailer)
            .ok_or_else(|| {
                Error::IndexMissing(format!(
                    "{} entries do not fit before offset {}",
                    entry_count, trailer
                ))
            })?;
        let start = trailer - data_size;

        let mut reader = BinaryReader::new_at(region, start);
        let map = match mode {
            IndexMode::SizeAware => {
                let keys = reader.read_i64_array(entry_count)?;
                let values = reader.read_i64_array(entry_count)?;
                IkvMap::SizeAware(LongLongMap::from_parallel(&keys, &values)?)
            }
            IndexMode::SizeUnaware => {
                let keys = reader.read_i32_array(entry_count)?;
                let values = reader.read_i32_array(entry_count)?;
                IkvMap::SizeUnaware(IntIntMap::from_parallel(&keys, &values)?)
            }
        };

        Ok(Self { map, start })
    }

    /// Offset of the first key, i.e. where the index proper begins.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        match &self.map {
            IkvMap::SizeAware(map) => map.len(),
            IkvMap::SizeUnaware(map) => map.len(),
        }
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The encoding this index was written with.
    pub fn mode(&self) -> IndexMode {
        match self.map {
            IkvMap::SizeAware(_) => IndexMode::SizeAware,
            IkvMap::SizeUnaware(_) => IndexMode::SizeUnaware,
        }
    }

    /// Raw packed value for a 64-bit key (size-aware indexes only).
    #[inline]
    pub fn get_packed(&self, key: u64) -> Option<i64> {
        match &self.map {
            IkvMap::SizeAware(map) => map.get(key as i64),
            IkvMap::SizeUnaware(_) => None,
        }
    }

    /// Look up the value for a path hash.
    #[inline]
    pub fn get(&self, key: u64) -> Option<IkvValue> {
        match &self.map {
            IkvMap::SizeAware(map) => map.get(key as i64).map(IkvValue::unpack),
            IkvMap::SizeUnaware(map) => map
                .get(key as u32 as i32)
                .map(|offset| IkvValue::LocalHeader(offset as u32)),
        }
    }

    /// Look up a path.
    #[inline]
    pub fn get_path(&self, path: &str) -> Option<IkvValue> {
        self.get(hash_str(path))
    }

    /// Bytes a packed value points at, zero-copy.
    pub fn slice_by_value(region: &[u8], value: i64) -> Result<&[u8]> {
        slice(region, (value >> 32) as u32, value as i32 as u32, value)
    }

    /// Copy of the bytes a packed value points at.
    pub fn bytes_by_value(region: &[u8], value: i64) -> Result<Vec<u8>> {
        Self::slice_by_value(region, value).map(<[u8]>::to_vec)
    }

    /// Locate the payload a value refers to.
    pub fn payload<'a>(
        region: &'a [u8],
        value: IkvValue,
        max_extra_field_length: u16,
    ) -> Result<Payload<'a>> {
        match value {
            IkvValue::Slice { offset, size } => Ok(Payload::stored(slice(
                region,
                offset,
                size,
                IkvValue::pack(offset, size),
            )?)),
            IkvValue::LocalHeader(offset) => {
                local_payload(region, offset as usize, max_extra_field_length)
            }
        }
    }
}

impl std::fmt::Debug for IkvIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IkvIndex")
            .field("mode", &self.mode())
            .field("len", &self.len())
            .field("start", &self.start)
            .finish()
    }
}

fn slice(region: &[u8], offset: u32, size: u32, value: i64) -> Result<&[u8]> {
    let start = offset as usize;
    let end = start + size as usize;
    if end > region.len() {
        return Err(Error::Truncated {
            name: format!("index value {:#018x}", value),
            end: end as u64,
            archive_size: region.len() as u64,
        });
    }
    Ok(&region[start..end])
}

fn local_truncated(region: &[u8], header: usize, end: usize) -> Error {
    Error::Truncated {
        name: format!("local header at {}", header),
        end: end as u64,
        archive_size: region.len() as u64,
    }
}

/// Read and check the local header at `header`.
fn read_local(region: &[u8], header: usize) -> Result<LocalFileHeader> {
    let sig = BinaryReader::new(region)
        .u32_at(header)
        .map_err(|_| local_truncated(region, header, header + LocalFileHeader::SIZE))?;
    if sig != LocalFileHeader::SIGNATURE {
        return Err(Error::InvalidSignature {
            expected: LocalFileHeader::SIGNATURE,
            actual: sig,
        });
    }

    BinaryReader::new_at(region, header + 4)
        .read_struct()
        .map_err(|_| local_truncated(region, header, header + LocalFileHeader::SIZE))
}

/// Raw name bytes stored in the local header at `header`.
///
/// Size-unaware keys are only 32 bits wide, so a hit must be confirmed
/// against the name before its payload is trusted.
pub fn local_name(region: &[u8], header: usize) -> Result<&[u8]> {
    let local = read_local(region, header)?;
    let start = header + LocalFileHeader::SIZE;
    let end = start + local.file_name_length as usize;
    region
        .get(start..end)
        .ok_or_else(|| local_truncated(region, header, end))
}

/// Read a local header and locate the payload following it.
fn local_payload(region: &[u8], header: usize, max_extra_field_length: u16) -> Result<Payload<'_>> {
    let local = read_local(region, header)?;

    let extra_length = local.extra_field_length;
    if extra_length > max_extra_field_length {
        return Err(Error::ExtraFieldTooLarge {
            name: format!("local header at {}", header),
            length: extra_length,
            limit: max_extra_field_length,
        });
    }

    let method = CompressionMethod::try_from(local.compression_method)
        .map_err(Error::UnsupportedCompression)?;
    let start = local.payload_start_at(header as u64) as usize;
    let end = start + local.compressed_size as usize;
    if end > region.len() {
        return Err(local_truncated(region, header, end));
    }

    Ok(Payload {
        bytes: &region[start..end],
        method,
        uncompressed_size: local.uncompressed_size as usize,
    })
}

/// Serialize an index. `entries` pairs a path hash with its value; values
/// must match `mode` (slices for size-aware, headers for size-unaware).
pub fn encode_index(entries: &[(u64, IkvValue)], mode: IndexMode) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * mode.word_size() * 2 + INDEX_TRAILER_SIZE);

    match mode {
        IndexMode::SizeAware => {
            for (key, _) in entries {
                out.extend_from_slice(&key.to_le_bytes());
            }
            for (_, value) in entries {
                let packed = match *value {
                    IkvValue::Slice { offset, size } => IkvValue::pack(offset, size),
                    IkvValue::LocalHeader(offset) => IkvValue::pack(offset, 0),
                };
                out.extend_from_slice(&packed.to_le_bytes());
            }
        }
        IndexMode::SizeUnaware => {
            for (key, _) in entries {
                out.extend_from_slice(&(*key as u32).to_le_bytes());
            }
            for (_, value) in entries {
                let offset = match *value {
                    IkvValue::Slice { offset, .. } | IkvValue::LocalHeader(offset) => offset,
                };
                out.extend_from_slice(&offset.to_le_bytes());
            }
        }
    }

    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    out.push(match mode {
        IndexMode::SizeAware => 1,
        IndexMode::SizeUnaware => 0,
    });
    out
}

/// Parent directory of an entry name; `""` for top-level entries.
pub fn package_of(name: &str) -> &str {
    name.rfind('/').map_or("", |i| &name[..i])
}

/// Coarse existence check for packages, read from the fast index.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    class_packages: Vec<u64>,
    resource_packages: Vec<u64>,
}

impl PackageIndex {
    /// Parse the package table ending at `end` (the start of the IKV keys).
    pub fn load(region: &[u8], end: usize) -> Result<Self> {
        let missing = || Error::IndexMissing(format!("no package table before offset {}", end));
        let trailer = end.checked_sub(PACKAGE_TRAILER_SIZE).ok_or_else(missing)?;

        let reader = BinaryReader::new(region);
        let class_count = reader.u32_at(trailer)? as usize;
        let resource_count = reader.u32_at(trailer + 4)? as usize;

        let start = class_count
            .checked_add(resource_count)
            .and_then(|n| n.checked_mul(8))
            .and_then(|size| trailer.checked_sub(size))
            .ok_or_else(missing)?;

        let mut reader = BinaryReader::new_at(region, start);
        let mut read_sorted = |count| -> Result<Vec<u64>> {
            let mut hashes: Vec<u64> = reader
                .read_i64_array(count)?
                .into_iter()
                .map(|h| h as u64)
                .collect();
            hashes.sort_unstable();
            Ok(hashes)
        };
        let class_packages = read_sorted(class_count)?;
        let resource_packages = read_sorted(resource_count)?;

        Ok(Self {
            class_packages,
            resource_packages,
        })
    }

    /// Build from package names.
    pub fn from_names<'a, I, J>(class_packages: I, resource_packages: J) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        J: IntoIterator<Item = &'a str>,
    {
        Self {
            class_packages: sorted_hashes(class_packages),
            resource_packages: sorted_hashes(resource_packages),
        }
    }

    /// Whether any `.class` entry lives directly in `package`.
    pub fn has_class_package(&self, package: &str) -> bool {
        self.class_packages.binary_search(&hash_str(package)).is_ok()
    }

    /// Whether any non-class entry lives directly in `package`.
    pub fn has_resource_package(&self, package: &str) -> bool {
        self.resource_packages.binary_search(&hash_str(package)).is_ok()
    }

    /// Number of distinct class and resource packages.
    pub fn counts(&self) -> (usize, usize) {
        (self.class_packages.len(), self.resource_packages.len())
    }

    /// Serialize the table.
    pub fn encode(&self) -> Vec<u8> {
        let hashes = self.class_packages.len() + self.resource_packages.len();
        let mut out = Vec::with_capacity(hashes * 8 + PACKAGE_TRAILER_SIZE);
        for hash in self.class_packages.iter().chain(&self.resource_packages) {
            out.extend_from_slice(&hash.to_le_bytes());
        }
        out.extend_from_slice(&(self.class_packages.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.resource_packages.len() as u32).to_le_bytes());
        out
    }
}

fn sorted_hashes<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<u64> {
    let mut hashes: Vec<u64> = names.into_iter().map(hash_str).collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes
}
