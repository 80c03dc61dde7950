//! Binary reader for bounds-checked parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! little-endian fields from a byte slice. Every read is checked against the
//! end of the buffer; nothing is reinterpreted in place.

use zerocopy::FromBytes;

use crate::{align_to, Error, Result};

/// A binary reader over a borrowed byte slice.
///
/// # Example
///
/// ```
/// use cethleann_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_u32().unwrap(), 0x08070605);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    ///
    /// Seeking past the end is allowed; the next read reports the shortfall.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Skip `count` bytes, failing if they are not all present.
    #[inline]
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Round the position up to the next multiple of `alignment`.
    ///
    /// Padding is not validated: aligning past the end is permitted so that a
    /// trailing pad region may be omitted by the writer.
    #[inline]
    pub fn align(&mut self, alignment: usize) {
        self.position = align_to(self.position, alignment);
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if available < count {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available,
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a fixed-size byte array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Read a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Read a little-endian u32 and interpret any non-zero value as `true`.
    #[inline]
    pub fn read_bool32(&mut self) -> Result<bool> {
        self.read_u32().map(|v| v != 0)
    }

    /// Read `count` consecutive little-endian u32 values.
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        let needed = count.checked_mul(4).ok_or(Error::UnexpectedEof {
            offset: self.position,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let bytes = self.read_bytes(needed)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Read a string from a fixed-size buffer, stopping at the first null.
    pub fn read_string_in_buffer(&mut self, buffer_size: usize) -> Result<&'a str> {
        let bytes = self.read_bytes(buffer_size)?;
        let null_pos = bytes.iter().position(|&b| b == 0).unwrap_or(buffer_size);
        std::str::from_utf8(&bytes[..null_pos]).map_err(Error::Utf8)
    }

    /// Read a struct using zerocopy.
    ///
    /// Only suitable for types whose every field is an explicit
    /// little-endian wrapper, so the copy is layout independent.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let offset = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }
}
