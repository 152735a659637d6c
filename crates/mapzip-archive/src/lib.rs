//! Read-only ZIP archives served from memory-mapped files.
//!
//! Archives are opened once and never modified. Three variants are chosen at
//! load time:
//!
//! - [`IndexedArchive`] - the archive comment announces an embedded fast index
//!   ("IKV"), so lookups are O(1) hash probes without parsing the central
//!   directory
//! - [`CentralDirectoryArchive`] - a name table is built from the central
//!   directory
//! - [`EmptyArchive`] - no entries, no mapping
//!
//! Stored entries are served as views into the mapping; deflated entries are
//! inflated straight from it. Closing an archive unmaps the file at once.
//!
//! # Example
//!
//! ```no_run
//! use mapzip_archive::{Archive, ReadArchive};
//!
//! let archive = Archive::open("app.jar")?;
//! println!("{} archive, {} entries", archive.kind(), archive.len());
//!
//! archive.process_resources("META-INF", |_| true, |resource| {
//!     println!("{}: {} bytes", resource.path(), resource.size());
//!     Ok(())
//! })?;
//! # Ok::<(), mapzip_archive::Error>(())
//! ```

mod archive;
mod config;
mod decompress;
mod entry;
mod error;
mod pool;
mod region;
mod resource;
mod trailer;
mod writer;

pub mod ikv;
pub mod zip;

pub use archive::{
    Archive, ArchiveKind, CentralDirectoryArchive, EmptyArchive, IndexedArchive, ReadArchive,
};
pub use config::{LoadOptions, MapMode, DEFAULT_MAX_EXTRA_FIELD_LENGTH};
pub use decompress::{inflate_sized, EntryBuffer, EntryReader, Payload};
pub use entry::{Entry, DIRECTORY_SIZE};
pub use error::{Error, Result};
pub use ikv::{IkvIndex, IkvValue, IndexMode, PackageIndex};
pub use pool::{BufferPool, PoolConfig, PooledBuffer};
pub use region::{MappedRegion, MAX_ARCHIVE_SIZE};
pub use resource::Resource;
pub use trailer::{read_trailer, ArchiveTrailer, FAST_INDEX_MARKER};
pub use writer::ArchiveWriter;
pub use zip::CompressionMethod;
