//! Chunked container header.

use cethleann_common::BinaryReader;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Result;

/// Wire form of the header. Every field is an explicit little-endian
/// wrapper, so reading it never depends on host layout.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct RawHeader {
    chunk_size: U32,
    chunk_count: U32,
    total_size: U32,
}

/// Header at the start of every chunked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionHeader {
    /// Logical chunk size the encoder used. Also doubles as the file-kind
    /// code (`0x10000` or `0x20000`) when the container is sniffed.
    pub chunk_size: u32,
    /// Number of entries in the chunk-size table.
    pub chunk_count: u32,
    /// Size of the decoded data.
    pub total_size: u32,
}

impl CompressionHeader {
    /// Encoded size of the header.
    pub const SIZE: usize = 12;

    /// Read a header from the current reader position.
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let raw: RawHeader = reader.read_struct()?;
        Ok(Self {
            chunk_size: raw.chunk_size.get(),
            chunk_count: raw.chunk_count.get(),
            total_size: raw.total_size.get(),
        })
    }

    /// Parse a header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::read(&mut BinaryReader::new(data))
    }

    /// Write the header into the first [`Self::SIZE`] bytes of `out`.
    ///
    /// Panics if `out` is shorter than the header.
    pub fn write_to(&self, out: &mut [u8]) {
        let raw = RawHeader {
            chunk_size: U32::new(self.chunk_size),
            chunk_count: U32::new(self.chunk_count),
            total_size: U32::new(self.total_size),
        };
        out[..Self::SIZE].copy_from_slice(raw.as_bytes());
    }

    /// Offset of the first chunk payload.
    pub fn payload_start(&self) -> usize {
        cethleann_common::align_to(
            Self::SIZE + 4 * self.chunk_count as usize,
            cethleann_common::CONTAINER_ALIGNMENT,
        )
    }
}
