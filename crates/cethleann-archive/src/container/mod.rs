//! Chunked deflate container.
//!
//! A container is laid out as:
//!
//! ```text
//! +0x00  header      chunk_size, chunk_count, total_size (u32 LE each)
//! +0x0C  size table  chunk_count x u32 LE, the stored length of each chunk
//!        padding     up to the next 0x80 boundary
//!        chunk 0     u32 self length, 0x78 0xDA, raw deflate stream
//!        padding     up to the next 0x80 boundary
//!        chunk 1     ...
//! ```
//!
//! The decoder has two branches per chunk. When a chunk's stored length
//! exactly fills the rest of the output it is copied verbatim; otherwise the
//! six-byte prefix is skipped and the remainder inflated. Inflated chunks
//! advance the output cursor to the next 0x80 boundary, so encoders must
//! pick chunk sizes that are multiples of 0x80.
//!
//! The encoder only ever stores the final chunk raw, as bare bytes whose
//! length is the table entry, which is the only shape the copy branch can
//! reproduce. Non-final chunks are always deflated even when that grows
//! them.

mod header;

use std::io::{ErrorKind, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use cethleann_common::{align_to, is_aligned, BinaryReader, CONTAINER_ALIGNMENT};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use tracing::{debug, trace, warn};

pub use header::CompressionHeader;

use crate::entry::MAX_ENTRY_SIZE;
use crate::{Error, Result};

/// Filler written between a chunk's self length and its deflate stream.
///
/// Looks like a zlib header but is never parsed as one.
pub const CHUNK_MARKER: [u8; 2] = [0x78, 0xDA];

/// Self length plus marker bytes.
pub const CHUNK_PREFIX_SIZE: usize = 4 + CHUNK_MARKER.len();

/// Default per-chunk inflate cap (64 KiB).
pub const DEFAULT_INFLATE_LIMIT: usize = 0x1_0000;

/// Chunk size conventions recognised by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkSize {
    /// 64 KiB chunks.
    #[default]
    Normal,
    /// 128 KiB chunks.
    Chonky,
}

impl ChunkSize {
    /// Size in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Normal => 0x1_0000,
            Self::Chonky => 0x2_0000,
        }
    }

    /// Map a header value back to a convention.
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0x1_0000 => Some(Self::Normal),
            0x2_0000 => Some(Self::Chonky),
            _ => None,
        }
    }
}

impl From<ChunkSize> for u32 {
    fn from(size: ChunkSize) -> Self {
        size.bytes()
    }
}

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum bytes a single inflated chunk may produce. Anything beyond
    /// this is dropped. Raise it to decode chonky containers completely.
    pub inflate_limit: usize,
}

impl DecodeOptions {
    /// Options with a custom inflate cap.
    pub const fn with_inflate_limit(inflate_limit: usize) -> Self {
        Self { inflate_limit }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            inflate_limit: DEFAULT_INFLATE_LIMIT,
        }
    }
}

/// Encoder and decoder for chunked containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkedCodec;

impl ChunkedCodec {
    /// Decode a container with the default inflate cap.
    pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
        Self::decode_with(data, &DecodeOptions::default())
    }

    /// Decode a container.
    pub fn decode_with(data: &[u8], options: &DecodeOptions) -> Result<Vec<u8>> {
        let mut reader = BinaryReader::new(data);
        let header = CompressionHeader::read(&mut reader)?;

        if u64::from(header.total_size) >= MAX_ENTRY_SIZE {
            return Err(Error::OversizedEntry(u64::from(header.total_size)));
        }

        let table = reader.read_u32_vec(header.chunk_count as usize)?;
        reader.align(CONTAINER_ALIGNMENT);

        debug!(
            chunk_size = header.chunk_size,
            chunk_count = header.chunk_count,
            total_size = header.total_size,
            "decoding chunked container"
        );

        let total = header.total_size as usize;
        let mut output = vec![0u8; total];
        let mut out_cursor = 0usize;
        let mut scratch = vec![0u8; options.inflate_limit];

        for (index, &stored) in table.iter().enumerate() {
            let stored = stored as usize;
            let chunk = reader.read_bytes(stored)?;

            if out_cursor.checked_add(stored) == Some(total) {
                output[out_cursor..].copy_from_slice(chunk);
                out_cursor = total;
            } else {
                let stream = chunk.get(CHUNK_PREFIX_SIZE..).ok_or_else(|| Error::CorruptChunk {
                    chunk: index,
                    reason: format!("stored length {stored} is shorter than the chunk prefix"),
                })?;
                let read = inflate_chunk(stream, &mut scratch, index)?;

                let dest = out_cursor
                    .checked_add(read)
                    .and_then(|end| output.get_mut(out_cursor..end))
                    .ok_or(Error::TruncatedStream {
                        offset: out_cursor,
                        needed: read,
                        available: total.saturating_sub(out_cursor),
                    })?;
                dest.copy_from_slice(&scratch[..read]);
                out_cursor = align_to(out_cursor + read, CONTAINER_ALIGNMENT);
            }

            reader.align(CONTAINER_ALIGNMENT);
        }

        Ok(output)
    }

    /// Encode `data` into a container using `chunk_size`-byte chunks.
    ///
    /// `chunk_size` must be a non-zero multiple of 0x80.
    pub fn encode(data: &[u8], chunk_size: impl Into<u32>) -> Result<Vec<u8>> {
        let chunk_size = chunk_size.into();
        if chunk_size == 0 || !is_aligned(chunk_size as usize, CONTAINER_ALIGNMENT) {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        if data.len() as u64 >= MAX_ENTRY_SIZE {
            return Err(Error::OversizedEntry(data.len() as u64));
        }

        let chunk_len = chunk_size as usize;
        let chunk_count = data.len().div_ceil(chunk_len);
        let header = CompressionHeader {
            chunk_size,
            chunk_count: chunk_count as u32,
            total_size: data.len() as u32,
        };

        let mut cursor = header.payload_start();
        let mut out = vec![0u8; cursor];
        header.write_to(&mut out);

        // Position the decoder's output cursor will be at for each chunk.
        let mut out_cursor = 0usize;

        for (index, chunk) in data.chunks(chunk_len).enumerate() {
            let is_last = index + 1 == chunk_count;
            let compressed = deflate_chunk(chunk)?;

            let stored = if is_last && compressed.len() >= chunk.len() {
                trace!(chunk = index, len = chunk.len(), "storing final chunk raw");
                out.extend_from_slice(chunk);
                chunk.len()
            } else {
                let mut self_len = compressed.len() + CHUNK_MARKER.len();
                // A stored length that exactly fills the remaining output
                // would be taken for a raw chunk; one trailing filler byte
                // after the deflate stream is ignored by inflate.
                if out_cursor + self_len + 4 == data.len() {
                    self_len += 1;
                }

                out.extend_from_slice(&(self_len as u32).to_le_bytes());
                out.extend_from_slice(&CHUNK_MARKER);
                out.extend_from_slice(&compressed);
                out.resize(cursor + self_len + 4, 0);
                self_len + 4
            };

            let entry = CompressionHeader::SIZE + 4 * index;
            LittleEndian::write_u32(&mut out[entry..entry + 4], stored as u32);

            cursor = align_to(cursor + stored, CONTAINER_ALIGNMENT);
            out.resize(cursor, 0);
            out_cursor = align_to(out_cursor + chunk.len(), CONTAINER_ALIGNMENT);
        }

        Ok(out)
    }

    /// Check whether `data` starts with a plausible container header.
    ///
    /// The chunk size must be one of the [`ChunkSize`] conventions and the
    /// chunk count must agree with the declared total.
    pub fn is_container(data: &[u8]) -> bool {
        let Ok(header) = CompressionHeader::parse(data) else {
            return false;
        };
        let Some(size) = ChunkSize::from_raw(header.chunk_size) else {
            return false;
        };

        let expected = header.total_size.div_ceil(size.bytes());
        expected == header.chunk_count
            && data.len() >= CompressionHeader::SIZE + 4 * header.chunk_count as usize
    }
}

fn deflate_chunk(chunk: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(chunk.len()), Compression::default());
    encoder.write_all(chunk)?;
    Ok(encoder.finish()?)
}

/// Inflate `stream` into `scratch`, stopping when the stream ends or the
/// buffer is full.
fn inflate_chunk(stream: &[u8], scratch: &mut [u8], index: usize) -> Result<usize> {
    let mut decoder = DeflateDecoder::new(stream);
    let mut filled = 0;

    while filled < scratch.len() {
        match decoder.read(&mut scratch[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::CorruptChunk {
                    chunk: index,
                    reason: e.to_string(),
                })
            }
        }
    }

    if filled == scratch.len() {
        let mut probe = [0u8; 1];
        if matches!(decoder.read(&mut probe), Ok(n) if n > 0) {
            warn!(
                chunk = index,
                limit = scratch.len(),
                "chunk inflates past the limit, output truncated"
            );
        }
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Deterministic bytes that deflate cannot shrink.
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    fn chunk_offsets(container: &[u8]) -> Vec<(usize, u32)> {
        let header = CompressionHeader::parse(container).unwrap();
        let mut reader = BinaryReader::new_at(container, CompressionHeader::SIZE);
        let table = reader.read_u32_vec(header.chunk_count as usize).unwrap();

        let mut offset = header.payload_start();
        table
            .into_iter()
            .map(|stored| {
                let at = offset;
                offset = align_to(offset + stored as usize, CONTAINER_ALIGNMENT);
                (at, stored)
            })
            .collect()
    }

    #[test]
    fn test_three_byte_input() {
        let data = [0x41, 0x42, 0x43];
        let encoded = ChunkedCodec::encode(&data, ChunkSize::Normal).unwrap();

        let header = CompressionHeader::parse(&encoded).unwrap();
        assert_eq!(header.chunk_size, 0x10000);
        assert_eq!(header.chunk_count, 1);
        assert_eq!(header.total_size, 3);

        assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_zeroes_chunk_count() {
        let data = vec![0u8; 200000];
        let encoded = ChunkedCodec::encode(&data, ChunkSize::Normal).unwrap();

        let header = CompressionHeader::parse(&encoded).unwrap();
        assert_eq!(header.chunk_count, 4);
        assert_eq!(header.total_size, 200000);
        assert!(encoded.len() < data.len());

        assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        let encoded = ChunkedCodec::encode(&[], ChunkSize::Normal).unwrap();
        let header = CompressionHeader::parse(&encoded).unwrap();

        assert_eq!(header.chunk_count, 0);
        assert_eq!(encoded.len(), CONTAINER_ALIGNMENT);
        assert!(ChunkedCodec::decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_payloads_are_aligned() {
        let mut data = pattern(0x1_0000 * 2);
        data.extend(noise(0x1234));
        let encoded = ChunkedCodec::encode(&data, ChunkSize::Normal).unwrap();

        assert!(is_aligned(encoded.len(), CONTAINER_ALIGNMENT));
        for (offset, _) in chunk_offsets(&encoded) {
            assert!(is_aligned(offset, CONTAINER_ALIGNMENT), "chunk at {offset:#x}");
        }
    }

    #[test]
    fn test_compressed_chunk_framing() {
        let data = pattern(0x1_0000);
        let encoded = ChunkedCodec::encode(&data, ChunkSize::Normal).unwrap();
        let (offset, stored) = chunk_offsets(&encoded)[0];

        let self_len = LittleEndian::read_u32(&encoded[offset..offset + 4]);
        assert_eq!(self_len + 4, stored);
        assert_eq!(&encoded[offset + 4..offset + 6], &CHUNK_MARKER);
    }

    #[test]
    fn test_incompressible_final_chunk_is_raw() {
        let mut data = pattern(0x1_0000);
        let tail = noise(40);
        data.extend_from_slice(&tail);
        let encoded = ChunkedCodec::encode(&data, ChunkSize::Normal).unwrap();

        let offsets = chunk_offsets(&encoded);
        let (offset, stored) = offsets[1];
        assert_eq!(stored as usize, tail.len());
        assert_eq!(&encoded[offset..offset + tail.len()], &tail[..]);

        assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_incompressible_middle_chunks_are_deflated() {
        let data = noise(0x80 * 3 + 5);
        let encoded = ChunkedCodec::encode(&data, 0x80u32).unwrap();

        let offsets = chunk_offsets(&encoded);
        for &(offset, _) in &offsets[..offsets.len() - 1] {
            assert_eq!(&encoded[offset + 4..offset + 6], &CHUNK_MARKER);
        }
        assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_stored_length_never_mimics_raw_copy() {
        // Sweeping the tail length crosses the point where a grown first
        // chunk's stored length equals the whole remaining output.
        for tail in 1..=48 {
            let data = noise(0x80 + tail);
            let encoded = ChunkedCodec::encode(&data, 0x80u32).unwrap();
            assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data, "tail {tail}");
        }
    }

    #[test]
    fn test_inflate_limit_truncates() {
        let data = pattern(0x2_0000);
        let encoded = ChunkedCodec::encode(&data, ChunkSize::Chonky).unwrap();

        let truncated = ChunkedCodec::decode(&encoded).unwrap();
        assert_eq!(truncated.len(), data.len());
        assert_eq!(&truncated[..DEFAULT_INFLATE_LIMIT], &data[..DEFAULT_INFLATE_LIMIT]);
        assert_ne!(truncated, data);

        let options = DecodeOptions::with_inflate_limit(ChunkSize::Chonky.bytes() as usize);
        assert_eq!(ChunkedCodec::decode_with(&encoded, &options).unwrap(), data);
    }

    #[test]
    fn test_decoder_accepts_any_chunk_size() {
        let data = pattern(0x300 + 17);
        let encoded = ChunkedCodec::encode(&data, 0x100u32).unwrap();

        assert_eq!(CompressionHeader::parse(&encoded).unwrap().chunk_size, 0x100);
        assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(matches!(
            ChunkedCodec::encode(b"abc", 0u32),
            Err(Error::InvalidChunkSize(0))
        ));
        assert!(matches!(
            ChunkedCodec::encode(b"abc", 100u32),
            Err(Error::InvalidChunkSize(100))
        ));
    }

    #[test]
    fn test_chunk_count_past_end() {
        let mut container = Vec::new();
        container.extend_from_slice(&0x1_0000u32.to_le_bytes());
        container.extend_from_slice(&4u32.to_le_bytes());
        container.extend_from_slice(&100u32.to_le_bytes());
        container.extend_from_slice(&100u32.to_le_bytes());

        assert!(matches!(
            ChunkedCodec::decode(&container),
            Err(Error::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_chunk_payload_past_end() {
        let mut container = vec![0u8; CONTAINER_ALIGNMENT + 10];
        CompressionHeader {
            chunk_size: 0x1_0000,
            chunk_count: 1,
            total_size: 64,
        }
        .write_to(&mut container);
        LittleEndian::write_u32(&mut container[12..16], 64);

        assert!(matches!(
            ChunkedCodec::decode(&container),
            Err(Error::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_hand_built_raw_copy() {
        let mut container = vec![0u8; CONTAINER_ALIGNMENT];
        CompressionHeader {
            chunk_size: 0x1_0000,
            chunk_count: 1,
            total_size: 5,
        }
        .write_to(&mut container);
        LittleEndian::write_u32(&mut container[12..16], 5);
        container.extend_from_slice(b"hello");

        assert_eq!(ChunkedCodec::decode(&container).unwrap(), b"hello");
    }

    #[test]
    fn test_oversized_total_rejected() {
        let mut container = vec![0u8; CompressionHeader::SIZE];
        CompressionHeader {
            chunk_size: 0x1_0000,
            chunk_count: 0,
            total_size: 0x7FFF_FFFF,
        }
        .write_to(&mut container);

        assert!(matches!(
            ChunkedCodec::decode(&container),
            Err(Error::OversizedEntry(0x7FFF_FFFF))
        ));
    }

    #[test]
    fn test_is_container() {
        let encoded = ChunkedCodec::encode(&pattern(1000), ChunkSize::Normal).unwrap();
        assert!(ChunkedCodec::is_container(&encoded));

        let odd = ChunkedCodec::encode(&pattern(1000), 0x100u32).unwrap();
        assert!(!ChunkedCodec::is_container(&odd));
        assert!(!ChunkedCodec::is_container(b"G1M_0000"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn chunk_size() -> impl Strategy<Value = u32> {
            prop_oneof![Just(0x80u32), Just(0x200), Just(0x1000), Just(0x1_0000)]
        }

        proptest! {
            #[test]
            fn round_trip(data in prop::collection::vec(any::<u8>(), 0..5000), size in chunk_size()) {
                let encoded = ChunkedCodec::encode(&data, size).unwrap();
                prop_assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
            }

            #[test]
            fn round_trip_compressible(len in 0usize..20000, size in chunk_size()) {
                let data = pattern(len);
                let encoded = ChunkedCodec::encode(&data, size).unwrap();
                prop_assert_eq!(ChunkedCodec::decode(&encoded).unwrap(), data);
            }
        }
    }
}
