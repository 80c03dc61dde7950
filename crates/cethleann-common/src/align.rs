//! Alignment helpers.

/// Boundary every chunk-table region and chunk payload is padded to.
pub const CONTAINER_ALIGNMENT: usize = 0x80;

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two. Values already on a boundary are
/// returned unchanged.
///
/// ```
/// use cethleann_common::align_to;
///
/// assert_eq!(align_to(12, 0x80), 0x80);
/// assert_eq!(align_to(0x80, 0x80), 0x80);
/// assert_eq!(align_to(0, 0x80), 0);
/// ```
#[inline]
pub const fn align_to(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Check whether `value` sits on an `alignment` boundary.
#[inline]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    value & (alignment - 1) == 0
}
