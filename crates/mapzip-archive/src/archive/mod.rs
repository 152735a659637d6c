//! Archive variants and the loader that picks one.

mod central;
mod empty;
mod indexed;

use std::path::Path;

use tracing::{debug, warn};

pub use central::CentralDirectoryArchive;
pub use empty::EmptyArchive;
pub use indexed::IndexedArchive;

use crate::config::LoadOptions;
use crate::decompress::{EntryBuffer, EntryReader};
use crate::region::MappedRegion;
use crate::resource::Resource;
use crate::trailer::read_trailer;
use crate::Result;

/// Read access shared by every archive variant.
///
/// All lookups return `Ok(None)` for paths that are not in the archive and
/// fail with [`Error::Closed`](crate::Error::Closed) once the archive has
/// been closed.
pub trait ReadArchive {
    /// Locate a member without reading it.
    fn get_resource(&self, path: &str) -> Result<Option<Resource<'_>>>;

    /// Visit every file under `dir` (at any depth) whose name passes
    /// `filter`. Directories are never visited. An empty `dir` means the
    /// whole archive. The first visitor error stops the walk.
    fn process_resources<F, V>(&self, dir: &str, filter: F, visitor: V) -> Result<()>
    where
        F: FnMut(&str) -> bool,
        V: FnMut(Resource<'_>) -> Result<()>;

    /// Release the archive's mapping. Calling it again does nothing.
    fn close(&mut self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// Contents of `path` in a new vector.
    fn get_data(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.get_resource(path)?.map(|r| r.data()).transpose()
    }

    /// Contents of `path` as a buffer, zero-copy when stored.
    fn get_byte_buffer(&self, path: &str) -> Result<Option<EntryBuffer<'_>>> {
        self.get_resource(path)?.map(|r| r.byte_buffer()).transpose()
    }

    /// Contents of `path` as a stream.
    fn get_reader(&self, path: &str) -> Result<Option<EntryReader<'_>>> {
        self.get_resource(path)?.map(|r| r.reader()).transpose()
    }
}

/// Whether `name` lies somewhere below `dir`.
pub(crate) fn in_directory(name: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    dir.is_empty()
        || name
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Which variant the loader chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Served through the embedded fast index.
    Indexed,
    /// Served through a name table built from the central directory.
    CentralDirectory,
    /// No entries.
    Empty,
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Indexed => "indexed",
            Self::CentralDirectory => "central directory",
            Self::Empty => "empty",
        })
    }
}

/// An open archive.
///
/// # Example
///
/// ```no_run
/// use mapzip_archive::{Archive, ReadArchive};
///
/// let mut archive = Archive::open("app.jar")?;
/// if let Some(bytes) = archive.get_data("META-INF/MANIFEST.MF")? {
///     println!("{}", String::from_utf8_lossy(&bytes));
/// }
/// archive.close();
/// # Ok::<(), mapzip_archive::Error>(())
/// ```
#[derive(Debug)]
pub enum Archive {
    /// Archive carrying a usable fast index.
    Indexed(IndexedArchive),
    /// Archive read through its central directory.
    CentralDirectory(CentralDirectoryArchive),
    /// Archive without entries.
    Empty(EmptyArchive),
}

impl Archive {
    /// Open the archive at `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, &LoadOptions::default())
    }

    /// Open the archive at `path`.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        let region = MappedRegion::open(path.as_ref(), options.map_mode)?;
        Self::from_region(region, options)
    }

    /// Open an archive held in memory.
    pub fn from_bytes(bytes: Vec<u8>, options: &LoadOptions) -> Result<Self> {
        Self::from_region(MappedRegion::from_vec(bytes)?, options)
    }

    /// Pick the variant for `region`. The region is released on every error
    /// path by being dropped.
    fn from_region(mut region: MappedRegion, options: &LoadOptions) -> Result<Self> {
        if region.is_empty() {
            debug!("{} is empty", region.label());
            region.close();
            return Ok(Self::Empty(EmptyArchive::new()));
        }

        let data = region.bytes()?;
        let trailer = read_trailer(data)?;
        if trailer.entry_count == 0 {
            debug!("{} has no entries", region.label());
            region.close();
            return Ok(Self::Empty(EmptyArchive::new()));
        }

        if let Some(index_end) = trailer.fast_index_end.filter(|_| options.use_fast_index) {
            match IndexedArchive::parse_index(data, index_end) {
                Ok((index, packages)) => {
                    return Ok(Self::Indexed(IndexedArchive::new(
                        region, trailer, index, packages, options,
                    )));
                }
                Err(e) if options.fallback_on_bad_index => {
                    warn!(
                        "{}: {}, reading the central directory instead",
                        region.label(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        CentralDirectoryArchive::load(region, &trailer, options).map(Self::CentralDirectory)
    }

    /// The variant in use.
    pub fn kind(&self) -> ArchiveKind {
        match self {
            Self::Indexed(_) => ArchiveKind::Indexed,
            Self::CentralDirectory(_) => ArchiveKind::CentralDirectory,
            Self::Empty(_) => ArchiveKind::Empty,
        }
    }

    /// Number of entries: indexed keys, central directory entries
    /// (directories included), or zero.
    pub fn len(&self) -> usize {
        match self {
            Self::Indexed(a) => a.len(),
            Self::CentralDirectory(a) => a.len(),
            Self::Empty(_) => 0,
        }
    }

    /// Check if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the bytes come from a live memory mapping.
    pub fn is_mapped(&self) -> bool {
        match self {
            Self::Indexed(a) => a.is_mapped(),
            Self::CentralDirectory(a) => a.is_mapped(),
            Self::Empty(_) => false,
        }
    }

    /// The fast-index variant, if that is what was loaded.
    pub fn as_indexed(&self) -> Option<&IndexedArchive> {
        match self {
            Self::Indexed(a) => Some(a),
            _ => None,
        }
    }

    /// The central-directory variant, if that is what was loaded.
    pub fn as_central_directory(&self) -> Option<&CentralDirectoryArchive> {
        match self {
            Self::CentralDirectory(a) => Some(a),
            _ => None,
        }
    }

    /// Read several members in parallel.
    #[cfg(feature = "parallel")]
    pub fn read_parallel(&self, paths: &[&str]) -> Vec<Result<Option<Vec<u8>>>> {
        use rayon::prelude::*;

        paths.par_iter().map(|path| self.get_data(path)).collect()
    }
}

impl ReadArchive for Archive {
    fn get_resource(&self, path: &str) -> Result<Option<Resource<'_>>> {
        match self {
            Self::Indexed(a) => a.get_resource(path),
            Self::CentralDirectory(a) => a.get_resource(path),
            Self::Empty(a) => a.get_resource(path),
        }
    }

    fn process_resources<F, V>(&self, dir: &str, filter: F, visitor: V) -> Result<()>
    where
        F: FnMut(&str) -> bool,
        V: FnMut(Resource<'_>) -> Result<()>,
    {
        match self {
            Self::Indexed(a) => a.process_resources(dir, filter, visitor),
            Self::CentralDirectory(a) => a.process_resources(dir, filter, visitor),
            Self::Empty(a) => a.process_resources(dir, filter, visitor),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Indexed(a) => a.close(),
            Self::CentralDirectory(a) => a.close(),
            Self::Empty(a) => a.close(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Self::Indexed(a) => a.is_closed(),
            Self::CentralDirectory(a) => a.is_closed(),
            Self::Empty(a) => a.is_closed(),
        }
    }
}
