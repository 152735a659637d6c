//! Little-endian reading over borrowed archive bytes.
//!
//! Archive structures are read both sequentially (the central directory walk,
//! index arrays) and at absolute offsets (trailers, local headers), so
//! [`BinaryReader`] is a cursor that also answers positional reads without
//! moving.

use zerocopy::FromBytes;

use crate::{Error, Result};

/// Cursor over a byte slice. Every read borrows from the slice; nothing is
/// copied except fixed-size scalars.
///
/// # Example
///
/// ```
/// use mapzip_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.u16_at(6).unwrap(), 0x0807);
/// assert_eq!(reader.read_u32().unwrap(), 0x08070605);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a reader over `data`, starting at its first byte.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self::new_at(data, 0)
    }

    /// Start reading at `position`, which may lie past the end; the first
    /// read then fails.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Current cursor offset.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Bytes left after the cursor.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if no bytes are left after the cursor.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Skip `count` bytes without checking them.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Borrow `len` bytes at an absolute offset.
    #[inline]
    pub fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(Error::OutOfBounds {
            position: offset,
            len: self.data.len(),
        })?;
        self.data.get(offset..end).ok_or(Error::UnexpectedEof {
            needed: len,
            available: self.data.len().saturating_sub(offset),
        })
    }

    /// Borrow the next `count` bytes.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.slice_at(self.position, count)?;
        self.position += count;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    #[inline]
    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice_at(offset, N)?);
        Ok(out)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Read `count` consecutive i32 values, as the 4-byte index arrays are
    /// stored.
    pub fn read_i32_array(&mut self, count: usize) -> Result<Vec<i32>> {
        let bytes = self.read_bytes(count.saturating_mul(4))?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Read `count` consecutive i64 values.
    pub fn read_i64_array(&mut self, count: usize) -> Result<Vec<i64>> {
        let bytes = self.read_bytes(count.saturating_mul(8))?;
        Ok(bytes
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }

    /// Read a fixed-layout record.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>())?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: std::mem::size_of::<T>(),
            available: bytes.len(),
        })
    }

    /// Positional u16; the cursor does not move.
    #[inline]
    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        self.array_at(offset).map(u16::from_le_bytes)
    }

    /// Positional u32; the cursor does not move.
    #[inline]
    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        self.array_at(offset).map(u32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let mut data = 0xBEEFu16.to_le_bytes().to_vec();
        data.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.remaining(), 8);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert!(reader.is_empty());
        assert!(reader.read_u16().is_err());
    }

    #[test]
    fn test_positional_reads_do_not_advance() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let reader = BinaryReader::new(&data);

        assert_eq!(reader.u32_at(1).unwrap(), 0x05040302);
        assert_eq!(reader.u16_at(4).unwrap(), 0x0605);
        assert_eq!(reader.position(), 0);
        assert!(reader.u32_at(3).is_err());
    }

    #[test]
    fn test_index_arrays() {
        let mut data = Vec::new();
        data.extend_from_slice(&7i64.to_le_bytes());
        data.extend_from_slice(&(-3i64).to_le_bytes());
        data.extend_from_slice(&42i32.to_le_bytes());

        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_i64_array(2).unwrap(), vec![7, -3]);
        assert_eq!(reader.read_i32_array(1).unwrap(), vec![42]);
        assert!(reader.read_i32_array(1).is_err());
    }

    #[test]
    fn test_out_of_range_offsets() {
        let data = [0u8; 4];
        let reader = BinaryReader::new(&data);
        assert!(matches!(
            reader.slice_at(usize::MAX, 2),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(reader.slice_at(2, 2).unwrap().len(), 2);

        let mut past_end = BinaryReader::new_at(&data, 10);
        assert!(past_end.is_empty());
        assert!(matches!(
            past_end.read_bytes(1),
            Err(Error::UnexpectedEof { needed: 1, available: 0 })
        ));
    }
}
