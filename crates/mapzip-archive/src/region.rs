//! Lifecycle of the read-only byte region an archive is served from.
//!
//! A region is normally a memory mapping of the whole file. When the platform
//! refuses to map it, or when [`MapMode::Buffered`] is requested, the file is
//! read into the heap instead; readers cannot tell the difference.
//!
//! Closing a region unmaps it right away. Some platforms refuse to replace or
//! delete a file while a mapping of it is alive, so release must not wait for
//! the owner to be dropped at some later point.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, warn};

use crate::config::MapMode;
use crate::{Error, Result};

/// Largest archive the 32-bit entry offsets can address.
pub const MAX_ARCHIVE_SIZE: u64 = i32::MAX as u64;

enum RegionBytes {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl RegionBytes {
    #[inline]
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Buffered(bytes) => bytes,
        }
    }
}

/// Exclusive owner of an archive's bytes.
pub struct MappedRegion {
    bytes: Option<RegionBytes>,
    label: String,
}

impl MappedRegion {
    /// Map (or read) the whole file at `path`.
    pub fn open(path: &Path, mode: MapMode) -> Result<Self> {
        let label = path.display().to_string();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        if size > MAX_ARCHIVE_SIZE {
            return Err(Error::ArchiveTooLarge(size));
        }

        // Zero-length mappings are rejected by most platforms.
        if size == 0 {
            return Ok(Self {
                bytes: Some(RegionBytes::Buffered(Vec::new())),
                label,
            });
        }

        let bytes = match mode {
            MapMode::Buffered => RegionBytes::Buffered(read_all(&mut file, size)?),
            // SAFETY: the mapping is read-only and the archive format is
            // write-once; callers must not modify the file while it is open.
            MapMode::Auto => match unsafe { Mmap::map(&file) } {
                Ok(mmap) => RegionBytes::Mapped(mmap),
                Err(e) => {
                    warn!("cannot map {}, reading into memory: {}", label, e);
                    RegionBytes::Buffered(read_all(&mut file, size)?)
                }
            },
        };

        debug!(
            "opened region {} ({} bytes, mapped: {})",
            label,
            size,
            matches!(bytes, RegionBytes::Mapped(_))
        );

        Ok(Self {
            bytes: Some(bytes),
            label,
        })
    }

    /// Wrap bytes that are already in memory.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() as u64 > MAX_ARCHIVE_SIZE {
            return Err(Error::ArchiveTooLarge(bytes.len() as u64));
        }
        Ok(Self {
            bytes: Some(RegionBytes::Buffered(bytes)),
            label: "<memory>".to_string(),
        })
    }

    /// The region's bytes, or [`Error::Closed`] once it has been released.
    #[inline]
    pub fn bytes(&self) -> Result<&[u8]> {
        self.bytes
            .as_ref()
            .map(RegionBytes::as_slice)
            .ok_or(Error::Closed)
    }

    /// Length in bytes; zero after close.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, |b| b.as_slice().len())
    }

    /// Check if the region holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the bytes come from a live memory mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self.bytes, Some(RegionBytes::Mapped(_)))
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.bytes.is_none()
    }

    /// Human-readable origin, used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Release the mapping or buffer now.
    ///
    /// Returns `false` when the region was already closed.
    pub fn close(&mut self) -> bool {
        match self.bytes.take() {
            Some(bytes) => {
                let mapped = matches!(bytes, RegionBytes::Mapped(_));
                drop(bytes);
                debug!("closed region {} (unmapped: {})", self.label, mapped);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("label", &self.label)
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn read_all(file: &mut File, size: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(size as usize);
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_map_and_close() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut region = MappedRegion::open(file.path(), MapMode::Auto).unwrap();
        assert_eq!(region.bytes().unwrap(), b"0123456789");
        assert_eq!(region.len(), 10);

        assert!(region.close());
        assert!(region.is_closed());
        assert!(matches!(region.bytes(), Err(Error::Closed)));
        assert_eq!(region.len(), 0);

        // Second close is a no-op.
        assert!(!region.close());
    }

    #[test]
    fn test_buffered_mode() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        let region = MappedRegion::open(file.path(), MapMode::Buffered).unwrap();
        assert!(!region.is_mapped());
        assert_eq!(region.bytes().unwrap(), b"abc");
    }

    #[test]
    fn test_zero_length_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let region = MappedRegion::open(file.path(), MapMode::Auto).unwrap();
        assert!(region.is_empty());
        assert!(!region.is_closed());
    }

    #[test]
    fn test_file_can_be_removed_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"payload").unwrap();

        let mut region = MappedRegion::open(&path, MapMode::Auto).unwrap();
        region.close();
        std::fs::remove_file(&path).unwrap();
        assert!(!path.exists());
    }
}
