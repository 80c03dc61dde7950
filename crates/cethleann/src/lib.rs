//! Cethleann - Koei Tecmo game archive extraction library.
//!
//! This crate provides a unified interface to the Cethleann crates.
//!
//! # Crates
//!
//! - [`cethleann_common`] - Common utilities (binary reading, alignment)
//! - [`cethleann_archive`] - DATA0/DATA1 archives, the chunked container
//!   codec and the patch RomFS overlay
//!
//! # Example
//!
//! ```no_run
//! use cethleann::prelude::*;
//!
//! let index = ArchiveIndex::open("DATA0.bin")?;
//! let mut blob = BlobReader::open("DATA1.bin")?;
//!
//! let data = index.read_entry(&mut blob, 0)?;
//! if let Some(kind) = DataKind::sniff(&data) {
//!     println!("entry 0 is {kind:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use cethleann_archive as archive;
pub use cethleann_common as common;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use cethleann_archive::{
        ArchiveIndex, BlobReader, ChunkSize, ChunkedCodec, DataKind, DecodeOptions, EntryRecord,
        PatchOverlayIndex,
    };
    pub use cethleann_common::BinaryReader;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
