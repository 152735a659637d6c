//! Turning a located payload into bytes, buffers, or streams.
//!
//! Compressed input is always read straight from the archive region; it is
//! never copied into an intermediate heap buffer first.

use std::io::{self, Read};
use std::ops::Deref;

use flate2::read::DeflateDecoder;
use flate2::{Decompress, FlushDecompress, Status};

use crate::pool::{BufferPool, PooledBuffer};
use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// The raw bytes of one entry inside the archive region.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    /// Bytes as stored in the archive (compressed when deflated).
    pub bytes: &'a [u8],
    /// How `bytes` are encoded.
    pub method: CompressionMethod,
    /// Size after decompression.
    pub uncompressed_size: usize,
}

impl<'a> Payload<'a> {
    /// A stored payload; its size is the slice length.
    pub fn stored(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            method: CompressionMethod::Store,
            uncompressed_size: bytes.len(),
        }
    }

    /// Materialize the payload into a freshly allocated vector.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        match self.method {
            CompressionMethod::Store => Ok(self.bytes.to_vec()),
            CompressionMethod::Deflate => inflate_sized(self.bytes, self.uncompressed_size),
        }
    }

    /// Zero-copy view for stored payloads, pooled inflate for deflated ones.
    pub fn to_buffer(&self, pool: &'a BufferPool) -> Result<EntryBuffer<'a>> {
        match self.method {
            CompressionMethod::Store => Ok(EntryBuffer::Mapped(self.bytes)),
            CompressionMethod::Deflate => {
                let mut buffer = pool.acquire(self.uncompressed_size);
                inflate_into(self.bytes, buffer.as_mut_vec(), self.uncompressed_size)?;
                Ok(EntryBuffer::Pooled(buffer))
            }
        }
    }

    /// A lazily decoding stream over the payload.
    pub fn reader(&self) -> EntryReader<'a> {
        match self.method {
            CompressionMethod::Store => EntryReader::Stored(self.bytes),
            CompressionMethod::Deflate => {
                EntryReader::Deflated(Box::new(DeflateDecoder::new(self.bytes)))
            }
        }
    }
}

/// Entry contents as a byte buffer.
#[derive(Debug)]
pub enum EntryBuffer<'a> {
    /// Read-only view into the archive region.
    Mapped(&'a [u8]),
    /// Inflated bytes in a buffer borrowed from the archive's pool.
    Pooled(PooledBuffer<'a>),
}

impl EntryBuffer<'_> {
    /// Whether the bytes are served directly from the archive region.
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl Deref for EntryBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(bytes) => bytes,
            Self::Pooled(buffer) => buffer,
        }
    }
}

/// Streaming reader over entry contents.
pub enum EntryReader<'a> {
    /// Stored bytes, read in place.
    Stored(&'a [u8]),
    /// Raw DEFLATE stream, inflated as it is read.
    Deflated(Box<DeflateDecoder<&'a [u8]>>),
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stored(bytes) => bytes.read(buf),
            Self::Deflated(decoder) => decoder.read(buf),
        }
    }
}

impl std::fmt::Debug for EntryReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stored(bytes) => f.debug_tuple("Stored").field(&bytes.len()).finish(),
            Self::Deflated(_) => f.debug_tuple("Deflated").finish(),
        }
    }
}

/// Inflate raw DEFLATE data into `output`, which ends up exactly
/// `expected_size` bytes long.
///
/// The whole compressed input is available up front, so a call that neither
/// consumes input nor produces output means the stream is broken.
pub fn inflate_into(input: &[u8], output: &mut Vec<u8>, expected_size: usize) -> Result<()> {
    output.clear();
    output.reserve_exact(expected_size);

    // Dropped on every exit path, which frees the inflater state.
    let mut inflater = Decompress::new(false);

    while output.len() < expected_size {
        let consumed = inflater.total_in() as usize;
        let produced = output.len();

        let status = inflater
            .decompress_vec(&input[consumed..], output, FlushDecompress::Finish)
            .map_err(|e| Error::Decompression(e.to_string()))?;

        if status == Status::StreamEnd {
            break;
        }
        if inflater.total_in() as usize == consumed && output.len() == produced {
            return Err(Error::Decompression(format!(
                "inflater stalled after {} of {} bytes",
                produced, expected_size
            )));
        }
    }

    if output.len() != expected_size {
        return Err(Error::Decompression(format!(
            "size mismatch: expected {}, inflated {}",
            expected_size,
            output.len()
        )));
    }
    Ok(())
}

/// Inflate raw DEFLATE data with known output size.
pub fn inflate_sized(input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);
    inflate_into(input, &mut output, expected_size)?;
    Ok(output)
}
