//! A located archive member with lazy data accessors.

use std::borrow::Cow;

use crate::decompress::{EntryBuffer, EntryReader, Payload};
use crate::entry::Entry;
use crate::pool::BufferPool;
use crate::Result;

enum Source<'a> {
    Entry {
        entry: &'a Entry,
        region: &'a [u8],
        max_extra_field_length: u16,
    },
    Payload(Payload<'a>),
}

/// A member found by path, borrowed from its archive.
///
/// Nothing is read or inflated until one of the data accessors is called.
pub struct Resource<'a> {
    path: Cow<'a, str>,
    source: Source<'a>,
    pool: &'a BufferPool,
}

impl<'a> Resource<'a> {
    pub(crate) fn from_entry(
        entry: &'a Entry,
        region: &'a [u8],
        pool: &'a BufferPool,
        max_extra_field_length: u16,
    ) -> Self {
        Self {
            path: Cow::Borrowed(entry.name()),
            source: Source::Entry {
                entry,
                region,
                max_extra_field_length,
            },
            pool,
        }
    }

    pub(crate) fn from_payload(path: Cow<'a, str>, payload: Payload<'a>, pool: &'a BufferPool) -> Self {
        Self {
            path,
            source: Source::Payload(payload),
            pool,
        }
    }

    /// Path of the member inside the archive.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Uncompressed size; [`DIRECTORY_SIZE`](crate::DIRECTORY_SIZE) for directories.
    pub fn size(&self) -> i32 {
        match &self.source {
            Source::Entry { entry, .. } => entry.uncompressed_size(),
            Source::Payload(payload) => payload.uncompressed_size as i32,
        }
    }

    /// Check if this member is a directory.
    pub fn is_directory(&self) -> bool {
        match &self.source {
            Source::Entry { entry, .. } => entry.is_directory(),
            Source::Payload(_) => false,
        }
    }

    /// Locate the stored bytes.
    pub fn payload(&self) -> Result<Payload<'a>> {
        match self.source {
            Source::Entry {
                entry,
                region,
                max_extra_field_length,
            } => entry.payload(region, max_extra_field_length),
            Source::Payload(payload) => Ok(payload),
        }
    }

    /// Contents as a freshly allocated vector.
    pub fn data(&self) -> Result<Vec<u8>> {
        self.payload()?.to_vec()
    }

    /// Contents as a buffer: a view into the archive when stored, a pooled
    /// buffer when inflated.
    pub fn byte_buffer(&self) -> Result<EntryBuffer<'a>> {
        self.payload()?.to_buffer(self.pool)
    }

    /// Contents as a stream, inflated while reading.
    pub fn reader(&self) -> Result<EntryReader<'a>> {
        Ok(self.payload()?.reader())
    }
}

impl std::fmt::Debug for Resource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("size", &self.size())
            .finish()
    }
}
