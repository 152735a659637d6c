//! mapzip - immutable, memory-mapped ZIP archives with O(1) lookups.
//!
//! # Crates
//!
//! - [`mapzip_common`] - Common utilities (binary reading, xxh3 hashing, open-addressing maps)
//! - [`mapzip_archive`] - Archive loading, reading, and writing
//!
//! # Example
//!
//! ```no_run
//! use mapzip::prelude::*;
//!
//! let mut archive = Archive::open("app.jar")?;
//! if let Some(buffer) = archive.get_byte_buffer("config/app.properties")? {
//!     println!("{} bytes, zero-copy: {}", buffer.len(), buffer.is_mapped());
//! }
//! archive.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use mapzip_archive as archive;
pub use mapzip_common as common;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use mapzip_archive::{
        Archive, ArchiveKind, ArchiveWriter, CompressionMethod, IndexMode, LoadOptions, MapMode,
        ReadArchive, Resource,
    };
    pub use mapzip_common::hash::{hash, hash_reader, hash_str};
    pub use mapzip_common::{BinaryReader, IntIntMap, LongLongMap};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
