//! DATA1 blob reading.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{trace, warn};

use crate::container::{ChunkedCodec, CompressionHeader, DecodeOptions};
use crate::entry::MAX_ENTRY_SIZE;
use crate::{EntryRecord, Error, Result};

/// Reads entries out of a seekable blob.
///
/// A `BlobReader` owns one cursor. Concurrent extraction needs one reader
/// per worker, each with its own source handle.
#[derive(Debug)]
pub struct BlobReader<R> {
    source: R,
    options: DecodeOptions,
    strict: bool,
}

impl BlobReader<BufReader<File>> {
    /// Open a blob file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::UnreadableSource(format!("{}: {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read + Seek> BlobReader<R> {
    /// Wrap a seekable source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            options: DecodeOptions::default(),
            strict: false,
        }
    }

    /// Report oversized entries as [`Error::OversizedEntry`] instead of
    /// returning an empty buffer.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Use custom container decode options.
    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Read and decode one entry.
    ///
    /// Empty entries return an empty buffer without touching the source.
    /// Entries whose declared size is at or above 2 GiB also come back empty
    /// unless the reader is [`strict`](Self::strict).
    pub fn read_entry(&mut self, record: &EntryRecord) -> Result<Vec<u8>> {
        if record.is_empty() {
            return Ok(Vec::new());
        }
        if record.is_oversized() {
            if self.strict {
                return Err(Error::OversizedEntry(record.uncompressed_size()));
            }
            warn!(
                offset = record.offset(),
                size = record.uncompressed_size(),
                "skipping entry with oversized length"
            );
            return Ok(Vec::new());
        }

        self.source
            .stream_position()
            .map_err(|e| Error::UnreadableSource(e.to_string()))?;
        self.source.seek(SeekFrom::Start(record.offset()))?;

        trace!(
            offset = record.offset(),
            compressed = record.is_compressed(),
            "reading entry"
        );

        read_stored(
            &mut self.source,
            record.offset(),
            record.is_compressed(),
            record.compressed_size(),
            record.uncompressed_size(),
            &self.options,
        )
    }
}

/// Read an entry's stored bytes from the current position and decode them.
///
/// Compressed entries read `compressed_size` plus one container header,
/// tolerating a short read at the end of the source; the decoder reports any
/// real shortfall. The container header must declare exactly
/// `uncompressed_size` bytes. Raw entries must be fully present.
pub(crate) fn read_stored<R: Read>(
    source: &mut R,
    offset: u64,
    is_compressed: bool,
    compressed_size: u64,
    uncompressed_size: u64,
    options: &DecodeOptions,
) -> Result<Vec<u8>> {
    if is_compressed {
        if compressed_size >= MAX_ENTRY_SIZE {
            return Err(Error::OversizedEntry(compressed_size));
        }
        let wanted = compressed_size + CompressionHeader::SIZE as u64;
        let mut stored = Vec::with_capacity(wanted as usize);
        source.take(wanted).read_to_end(&mut stored)?;

        let header = CompressionHeader::parse(&stored)?;
        if u64::from(header.total_size) != uncompressed_size {
            return Err(Error::SizeMismatch {
                offset,
                expected: uncompressed_size,
                declared: u64::from(header.total_size),
            });
        }
        return ChunkedCodec::decode_with(&stored, options);
    }

    let mut buffer = Vec::with_capacity(uncompressed_size as usize);
    source.take(uncompressed_size).read_to_end(&mut buffer)?;
    if (buffer.len() as u64) < uncompressed_size {
        return Err(Error::TruncatedStream {
            offset: offset as usize,
            needed: uncompressed_size as usize,
            available: buffer.len(),
        });
    }
    Ok(buffer)
}
