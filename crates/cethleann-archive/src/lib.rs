//! DATA0/DATA1 archive reader for Koei Tecmo game files.
//!
//! Games built on this engine ship their assets as two files:
//!
//! - `DATA0.bin` - a flat table of fixed-size [`EntryRecord`]s
//! - `DATA1.bin` - the blob those records point into
//!
//! Entries are stored raw or as a chunked deflate container (see
//! [`ChunkedCodec`]). Patches add a RomFS directory described by
//! INFO0/INFO2 ([`PatchOverlayIndex`]) whose files use the same storage.
//!
//! # Example
//!
//! ```no_run
//! use cethleann_archive::{ArchiveIndex, BlobReader};
//!
//! let index = ArchiveIndex::open("DATA0.bin")?;
//! let mut blob = BlobReader::open("DATA1.bin")?;
//!
//! for id in 0..=index.len() {
//!     let data = index.read_entry(&mut blob, id)?;
//!     println!("{id}: {} bytes", data.len());
//! }
//! # Ok::<(), cethleann_archive::Error>(())
//! ```

mod blob;
mod container;
mod entry;
mod error;
mod index;
mod kind;
mod overlay;

pub use blob::BlobReader;
pub use container::{
    ChunkSize, ChunkedCodec, CompressionHeader, DecodeOptions, CHUNK_MARKER, CHUNK_PREFIX_SIZE,
    DEFAULT_INFLATE_LIMIT,
};
pub use entry::{EntryRecord, MAX_ENTRY_SIZE};
pub use error::{Error, Result};
pub use index::ArchiveIndex;
pub use kind::DataKind;
pub use overlay::{PatchCatalog, PatchEntry, PatchOverlayIndex, MOUNT_PREFIX_LEN, PATH_FIELD_SIZE};
