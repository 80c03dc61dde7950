//! Common utilities for Cethleann.
//!
//! This crate provides the foundational pieces shared by the archive crates:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`align_to`] - Rounding helper for the 128-byte container alignment

mod align;
mod error;
mod reader;

pub use align::{align_to, is_aligned, CONTAINER_ALIGNMENT};
pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
