//! xxHash3 hashing of archive paths and content.
//!
//! The 64-bit xxh3 digest is the key of the embedded fast index: the writer
//! hashes every entry path and the reader hashes the requested path, so both
//! sides must produce the reference output bit for bit. This is a lookup hash,
//! not a security primitive.

use std::io::{self, Read};

use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed, Xxh3};

/// Block size used when hashing streamed input.
const STREAM_BLOCK_SIZE: usize = 64 * 1024;

/// Compute the 64-bit xxh3 hash of a byte slice.
#[inline]
pub fn hash(data: &[u8]) -> u64 {
    xxh3_64(data)
}

/// Compute the 64-bit xxh3 hash of a byte range.
///
/// Panics if the range is outside of `data`, like slice indexing.
#[inline]
pub fn hash_range(data: &[u8], offset: usize, length: usize) -> u64 {
    xxh3_64(&data[offset..offset + length])
}

/// Compute the 64-bit xxh3 hash of a byte slice with a seed value.
#[inline]
pub fn hash_with_seed(data: &[u8], seed: u64) -> u64 {
    xxh3_64_with_seed(data, seed)
}

/// Compute the 64-bit xxh3 hash of a string's UTF-8 bytes.
#[inline]
pub fn hash_str(s: &str) -> u64 {
    hash(s.as_bytes())
}

/// 32-bit key derived from [`hash_str`], used by size-unaware indexes.
#[inline]
pub fn hash32_str(s: &str) -> i32 {
    hash_str(s) as u32 as i32
}

/// Hash a sequence of blocks as if they were one contiguous buffer.
pub fn hash_blocks<'a, I>(blocks: I) -> u64
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut state = Xxh3::new();
    for block in blocks {
        state.update(block);
    }
    state.digest()
}

/// Hash everything a reader yields without materializing it.
///
/// The result equals [`hash`] over the concatenated bytes.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<u64> {
    let mut state = Xxh3::new();
    let mut block = vec![0u8; STREAM_BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        state.update(&block[..n]);
    }
    Ok(state.digest())
}
