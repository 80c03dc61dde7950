//! DATA0 entry index.

use std::fs;
use std::io::{Read, Seek};
use std::path::Path;

use cethleann_common::BinaryReader;
use tracing::debug;

#[cfg(feature = "parallel")]
use crate::DecodeOptions;
use crate::{BlobReader, EntryRecord, Error, Result};

/// The DATA0 file table.
///
/// The table is a bare run of [`EntryRecord`]s; an entry's position is its
/// logical file id and the count is implied by the stream length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveIndex {
    entries: Vec<EntryRecord>,
}

impl ArchiveIndex {
    /// Read an index file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| Error::UnreadableSource(format!("{}: {e}", path.display())))?;
        Self::load(&data)
    }

    /// Parse a fully read index stream.
    pub fn load(data: &[u8]) -> Result<Self> {
        if data.len() % EntryRecord::SIZE != 0 {
            return Err(Error::MalformedIndex {
                length: data.len(),
                record_size: EntryRecord::SIZE,
            });
        }

        let count = data.len() / EntryRecord::SIZE;
        let mut reader = BinaryReader::new(data);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(EntryRecord::read(&mut reader)?);
        }

        debug!(entries = count, "loaded archive index");
        Ok(Self { entries })
    }

    /// Build an index from records already in memory.
    pub fn from_records(entries: Vec<EntryRecord>) -> Self {
        Self { entries }
    }

    /// Serialize the index back into its on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|e| e.to_bytes()).collect()
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in file-id order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &EntryRecord> + '_ {
        self.entries.iter()
    }

    /// Get entry by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&EntryRecord> {
        self.entries.get(index)
    }

    /// Look up the record for a logical file id.
    pub fn resolve(&self, index: usize) -> Result<&EntryRecord> {
        self.entries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.entries.len(),
        })
    }

    /// Read a logical file id out of the blob.
    ///
    /// Asking for the id one past the last entry returns an empty buffer
    /// rather than an error, which callers use to detect the end of the
    /// archive.
    pub fn read_entry<R: Read + Seek>(
        &self,
        blob: &mut BlobReader<R>,
        index: usize,
    ) -> Result<Vec<u8>> {
        if index == self.entries.len() {
            return Ok(Vec::new());
        }
        let record = self.resolve(index)?;
        blob.read_entry(record)
    }

    /// Extract entries in parallel from an in-memory blob.
    ///
    /// Every rayon worker reads through its own cursor over `blob`, so no
    /// seek position is shared. Compressed entries are decoded with
    /// `options`. `callback` is invoked once per index, in no particular
    /// order.
    #[cfg(feature = "parallel")]
    pub fn extract_parallel<F>(
        &self,
        blob: &[u8],
        indices: &[usize],
        options: DecodeOptions,
        callback: F,
    ) where
        F: Fn(usize, Result<Vec<u8>>) + Send + Sync,
    {
        use rayon::prelude::*;
        use std::io::Cursor;

        indices.par_iter().for_each_init(
            || BlobReader::new(Cursor::new(blob)).with_decode_options(options),
            |reader, &index| callback(index, self.read_entry(reader, index)),
        );
    }
}

impl<'a> IntoIterator for &'a ArchiveIndex {
    type Item = &'a EntryRecord;
    type IntoIter = std::slice::Iter<'a, EntryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
