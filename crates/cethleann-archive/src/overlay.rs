//! Patch RomFS overlay (INFO0/INFO2).
//!
//! Patches ship loose files in a RomFS directory instead of appending to the
//! DATA1 blob. INFO2 holds the record count and INFO0 maps logical file ids
//! to paths inside the RomFS. Each file is stored exactly like a DATA1
//! entry: raw, or as a chunked container.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use cethleann_common::BinaryReader;
use tracing::{debug, warn};

use crate::blob::read_stored;
use crate::container::DecodeOptions;
use crate::entry::MAX_ENTRY_SIZE;
use crate::{Error, Result};

/// Length of the mount prefix (`rom:/`) carried by every INFO0 path.
pub const MOUNT_PREFIX_LEN: usize = 5;

/// Size of the NUL-padded path field after each INFO0 record.
pub const PATH_FIELD_SIZE: usize = 0x100;

/// Header of the INFO2 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchCatalog {
    /// Number of INFO0 records.
    pub info0_count: u64,
}

impl PatchCatalog {
    /// Parse the INFO2 header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        Ok(Self {
            info0_count: reader.read_u64()?,
        })
    }
}

/// One INFO0 record plus its RomFS path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    /// Logical file id this entry overrides.
    pub index: u64,
    /// Decoded size in bytes.
    pub uncompressed_size: u64,
    /// Stored size in bytes, excluding the container header.
    pub compressed_size: u64,
    /// Whether the file is a chunked container.
    pub is_compressed: bool,
    /// Path including the mount prefix.
    pub path: String,
}

impl PatchEntry {
    /// Header size preceding the path field.
    pub const HEADER_SIZE: usize = 0x20;

    /// Total on-disk size of one record.
    pub const SIZE: usize = Self::HEADER_SIZE + PATH_FIELD_SIZE;

    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let index = reader.read_u64()?;
        let uncompressed_size = reader.read_u64()?;
        let compressed_size = reader.read_u64()?;
        let is_compressed = reader.read_bool32()?;
        reader.skip(4)?;
        let path = reader.read_string_in_buffer(PATH_FIELD_SIZE)?.to_string();

        Ok(Self {
            index,
            uncompressed_size,
            compressed_size,
            is_compressed,
            path,
        })
    }

    /// Encode the record in its on-disk layout.
    ///
    /// Paths longer than the field are cut to leave room for the terminator.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&u32::from(self.is_compressed).to_le_bytes());
        out.extend_from_slice(&[0; 4]);

        let path = self.path.as_bytes();
        let len = path.len().min(PATH_FIELD_SIZE - 1);
        out.extend_from_slice(&path[..len]);
        out.resize(Self::SIZE, 0);
        out
    }

    /// Path relative to the RomFS root, without the mount prefix.
    ///
    /// Returns `None` for empty or absolute paths and for paths with `.`
    /// or `..` components.
    pub fn relative_path(&self) -> Option<&Path> {
        let path = Path::new(self.path.get(MOUNT_PREFIX_LEN..)?);
        let mut components = path.components().peekable();
        let plain = components.peek().is_some()
            && components.all(|c| matches!(c, Component::Normal(_)));
        plain.then_some(path)
    }
}

/// Index over the patch RomFS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOverlayIndex {
    entries: Vec<PatchEntry>,
}

impl PatchOverlayIndex {
    /// Read INFO2 and INFO0 from disk.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(info2: P, info0: Q) -> Result<Self> {
        let info2 = read_file(info2.as_ref())?;
        let catalog = PatchCatalog::parse(&info2)?;
        let info0 = read_file(info0.as_ref())?;
        Self::load(catalog.info0_count as usize, &info0)
    }

    /// Parse `count` INFO0 records.
    pub fn load(count: usize, data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let mut entries = Vec::with_capacity(count.min(data.len() / PatchEntry::SIZE));
        for _ in 0..count {
            entries.push(PatchEntry::read(&mut reader)?);
        }

        debug!(entries = count, "loaded patch overlay index");
        Ok(Self { entries })
    }

    /// Build an overlay from entries already in memory.
    pub fn from_entries(entries: Vec<PatchEntry>) -> Self {
        Self { entries }
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the overlay has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in file order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PatchEntry> + '_ {
        self.entries.iter()
    }

    /// Find the entry overriding a logical file id.
    pub fn find(&self, index: u64) -> Option<&PatchEntry> {
        self.entries.iter().find(|e| e.index == index)
    }

    /// Resolve an entry against a RomFS root directory.
    ///
    /// Fails with [`Error::UnsafePath`] when the entry's path would land
    /// outside `romfs`.
    pub fn resolve_path(romfs: &Path, entry: &PatchEntry) -> Result<PathBuf> {
        entry
            .relative_path()
            .map(|relative| romfs.join(relative))
            .ok_or_else(|| Error::UnsafePath(entry.path.clone()))
    }

    /// Read a logical file id from the RomFS.
    pub fn read_entry<P: AsRef<Path>>(&self, romfs: P, index: u64) -> Result<Vec<u8>> {
        let entry = self.find(index).ok_or(Error::IndexOutOfRange {
            index: index as usize,
            count: self.entries.len(),
        })?;
        Self::read_file_entry(&Self::resolve_path(romfs.as_ref(), entry)?, entry)
    }

    /// Read an entry from an explicit file path.
    ///
    /// Empty entries, oversized entries and missing files yield an empty
    /// buffer.
    pub fn read_file_entry(path: &Path, entry: &PatchEntry) -> Result<Vec<u8>> {
        Self::read_file_entry_with(path, entry, &DecodeOptions::default())
    }

    /// Read an entry from an explicit file path with custom decode options.
    pub fn read_file_entry_with(
        path: &Path,
        entry: &PatchEntry,
        options: &DecodeOptions,
    ) -> Result<Vec<u8>> {
        if entry.uncompressed_size == 0 || !path.is_file() {
            return Ok(Vec::new());
        }
        if entry.uncompressed_size >= MAX_ENTRY_SIZE {
            warn!(
                path = %path.display(),
                size = entry.uncompressed_size,
                "skipping patch entry with oversized length"
            );
            return Ok(Vec::new());
        }

        let file = File::open(path)
            .map_err(|e| Error::UnreadableSource(format!("{}: {e}", path.display())))?;
        let mut source = BufReader::new(file);

        read_stored(
            &mut source,
            0,
            entry.is_compressed,
            entry.compressed_size,
            entry.uncompressed_size,
            options,
        )
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::UnreadableSource(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ChunkSize, ChunkedCodec, CompressionHeader};

    fn entry(index: u64, path: &str, size: u64) -> PatchEntry {
        PatchEntry {
            index,
            uncompressed_size: size,
            compressed_size: 0,
            is_compressed: false,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_record_layout() {
        let record = entry(42, "rom:/patch/0042.file", 12);
        let bytes = record.to_bytes();

        assert_eq!(bytes.len(), PatchEntry::SIZE);
        let overlay = PatchOverlayIndex::load(1, &bytes).unwrap();
        assert_eq!(overlay.find(42), Some(&record));
        assert_eq!(record.relative_path(), Some(Path::new("patch/0042.file")));
    }

    #[test]
    fn test_load_truncated() {
        let bytes = entry(1, "rom:/a", 1).to_bytes();
        assert!(matches!(
            PatchOverlayIndex::load(2, &bytes),
            Err(Error::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_read_entries_from_romfs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("patch")).unwrap();
        fs::write(dir.path().join("patch/raw.bin"), b"raw bytes").unwrap();

        let data: Vec<u8> = (0..70_000).map(|i| (i % 13) as u8).collect();
        let container = ChunkedCodec::encode(&data, ChunkSize::Normal).unwrap();
        fs::write(dir.path().join("patch/packed.bin"), &container).unwrap();

        let overlay = PatchOverlayIndex::from_entries(vec![
            entry(7, "rom:/patch/raw.bin", 9),
            PatchEntry {
                index: 9,
                uncompressed_size: data.len() as u64,
                compressed_size: (container.len() - CompressionHeader::SIZE) as u64,
                is_compressed: true,
                path: "rom:/patch/packed.bin".to_string(),
            },
            entry(11, "rom:/patch/missing.bin", 5),
        ]);

        assert_eq!(overlay.read_entry(dir.path(), 7).unwrap(), b"raw bytes");
        assert_eq!(overlay.read_entry(dir.path(), 9).unwrap(), data);
        assert!(overlay.read_entry(dir.path(), 11).unwrap().is_empty());
        assert!(matches!(
            overlay.read_entry(dir.path(), 8),
            Err(Error::IndexOutOfRange { index: 8, .. })
        ));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let info2 = dir.path().join("INFO2.bin");
        let info0 = dir.path().join("INFO0.bin");

        let mut catalog = 2u64.to_le_bytes().to_vec();
        catalog.extend_from_slice(&0u64.to_le_bytes());
        fs::write(&info2, catalog).unwrap();

        let mut records = entry(3, "rom:/x.bin", 1).to_bytes();
        records.extend(entry(5, "rom:/y.bin", 1).to_bytes());
        fs::write(&info0, records).unwrap();

        let overlay = PatchOverlayIndex::open(&info2, &info0).unwrap();
        assert_eq!(overlay.len(), 2);
        assert_eq!(
            overlay.find(5).unwrap().relative_path(),
            Some(Path::new("y.bin"))
        );
    }

    #[test]
    fn test_paths_stay_inside_romfs() {
        let escaping = [
            "rom://etc/hostname",
            "rom:/../secret.bin",
            "rom:/a/../../b",
            "rom:/",
            "rom:",
        ];
        for path in escaping {
            let record = entry(1, path, 4);
            assert_eq!(record.relative_path(), None, "{path}");
            assert!(matches!(
                PatchOverlayIndex::resolve_path(Path::new("/tmp/romfs"), &record),
                Err(Error::UnsafePath(p)) if p == path
            ));
        }

        let inside = entry(1, "rom:/a/b.bin", 4);
        assert_eq!(
            PatchOverlayIndex::resolve_path(Path::new("/tmp/romfs"), &inside).unwrap(),
            Path::new("/tmp/romfs/a/b.bin")
        );
    }

    #[test]
    fn test_read_entry_rejects_escaping_path() {
        let dir = tempfile::tempdir().unwrap();
        let romfs = dir.path().join("romfs");
        fs::create_dir_all(&romfs).unwrap();
        fs::write(dir.path().join("outside.bin"), b"secret").unwrap();

        let overlay = PatchOverlayIndex::from_entries(vec![entry(2, "rom:/../outside.bin", 6)]);
        assert!(matches!(
            overlay.read_entry(&romfs, 2),
            Err(Error::UnsafePath(_))
        ));
    }

    #[test]
    fn test_header_size_must_match_entry() {
        let dir = tempfile::tempdir().unwrap();
        let container = ChunkedCodec::encode(b"twelve bytes", ChunkSize::Normal).unwrap();
        fs::write(dir.path().join("packed.bin"), &container).unwrap();

        let overlay = PatchOverlayIndex::from_entries(vec![PatchEntry {
            index: 4,
            uncompressed_size: 5,
            compressed_size: (container.len() - CompressionHeader::SIZE) as u64,
            is_compressed: true,
            path: "rom:/packed.bin".to_string(),
        }]);
        assert!(matches!(
            overlay.read_entry(dir.path(), 4),
            Err(Error::SizeMismatch {
                expected: 5,
                declared: 12,
                ..
            })
        ));
    }
}
