//! DATA0 entry records.

use cethleann_common::BinaryReader;

use crate::Result;

/// Uncompressed sizes at or above this value are treated as corrupt.
pub const MAX_ENTRY_SIZE: u64 = 0x7FFF_FFFF;

/// Descriptor for one file stored in the DATA1 blob.
///
/// This contains metadata about the file, not the file data itself.
/// Use [`BlobReader::read_entry`](crate::BlobReader::read_entry) to get the
/// actual contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryRecord {
    /// Byte position of the entry within the blob.
    offset: u64,
    /// Size of the stored bytes, excluding the container header.
    compressed_size: u64,
    /// Size of the decoded entry.
    uncompressed_size: u64,
    /// Whether the stored bytes are a chunked container.
    is_compressed: bool,
}

impl EntryRecord {
    /// On-disk size of one record.
    pub const SIZE: usize = 0x20;

    /// Create a new entry record.
    pub const fn new(
        offset: u64,
        compressed_size: u64,
        uncompressed_size: u64,
        is_compressed: bool,
    ) -> Self {
        Self {
            offset,
            compressed_size,
            uncompressed_size,
            is_compressed,
        }
    }

    /// Decode one record field by field.
    ///
    /// Layout: `offset: u64`, `uncompressed_size: u64`, `compressed_size: u64`,
    /// `is_compressed: u32`, then four reserved bytes.
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let offset = reader.read_u64()?;
        let uncompressed_size = reader.read_u64()?;
        let compressed_size = reader.read_u64()?;
        let is_compressed = reader.read_bool32()?;
        reader.skip(4)?;

        Ok(Self {
            offset,
            compressed_size,
            uncompressed_size,
            is_compressed,
        })
    }

    /// Encode the record in its on-disk layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..16].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        out[16..24].copy_from_slice(&self.compressed_size.to_le_bytes());
        out[24..28].copy_from_slice(&u32::from(self.is_compressed).to_le_bytes());
        out
    }

    /// Get the byte offset within the blob.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the stored size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the decoded size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Check if the entry is stored as a chunked container.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    /// Check if the entry has no data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size == 0
    }

    /// Check if the declared size trips the allocation guard.
    #[inline]
    pub fn is_oversized(&self) -> bool {
        self.uncompressed_size >= MAX_ENTRY_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_layout() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x1000u64.to_le_bytes());
        data.extend_from_slice(&0x300u64.to_le_bytes());
        data.extend_from_slice(&0x180u64.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&[0xAA; 4]);

        let mut reader = BinaryReader::new(&data);
        let record = EntryRecord::read(&mut reader).unwrap();

        assert_eq!(record.offset(), 0x1000);
        assert_eq!(record.uncompressed_size(), 0x300);
        assert_eq!(record.compressed_size(), 0x180);
        assert!(record.is_compressed());
        assert_eq!(reader.position(), EntryRecord::SIZE);
    }

    #[test]
    fn test_to_bytes_matches_read() {
        let record = EntryRecord::new(0x80, 0x40, 0x100, false);
        let bytes = record.to_bytes();
        let parsed = EntryRecord::read(&mut BinaryReader::new(&bytes)).unwrap();

        assert_eq!(parsed, record);
    }

    #[test]
    fn test_size_guards() {
        assert!(EntryRecord::new(0, 0, 0, false).is_empty());
        assert!(EntryRecord::new(0, 0, MAX_ENTRY_SIZE, false).is_oversized());
        assert!(!EntryRecord::new(0, 0, MAX_ENTRY_SIZE - 1, false).is_oversized());
    }

    #[test]
    fn test_short_record_fails() {
        let data = [0u8; EntryRecord::SIZE - 1];
        assert!(EntryRecord::read(&mut BinaryReader::new(&data)).is_err());
    }
}
