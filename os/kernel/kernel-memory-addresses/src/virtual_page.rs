use crate::{PAGE_SHIFT, PAGE_SIZE, VirtualAddress};
use core::fmt;

/// Index of a virtual page within one process's address space.
///
/// ### Semantics
/// - `base()` returns the first byte of the page as a [`VirtualAddress`].
/// - `join(off)` combines the page with a [`PageOffset`] to form a full
///   [`VirtualAddress`].
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let vpn = VirtualPageNumber::new(2);
/// assert_eq!(vpn.base().as_usize(), 2 * PAGE_SIZE);
/// assert_eq!(vpn.join(PageOffset::new(5)).as_usize(), 2 * PAGE_SIZE + 5);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPageNumber(pub(crate) u32);

impl VirtualPageNumber {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0 << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset) -> VirtualAddress {
        VirtualAddress((self.0 << PAGE_SHIFT) | off.0 as u32)
    }

    /// The page directly after this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for VirtualPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPageNumber({})", self.0)
    }
}

impl fmt::Display for VirtualPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vpn {}", self.0)
    }
}

/// Byte offset within a page (`0..PAGE_SIZE`).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset(pub(crate) u16);

impl PageOffset {
    /// Create from a raw value, asserting it is < `PAGE_SIZE` in debug.
    #[inline]
    #[must_use]
    pub const fn new(value: usize) -> Self {
        debug_assert!(value < PAGE_SIZE, "offset must be < page size");
        Self((value & (PAGE_SIZE - 1)) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Number of bytes from this offset to the end of the page.
    #[inline]
    #[must_use]
    pub const fn remaining(self) -> usize {
        PAGE_SIZE - self.0 as usize
    }
}

impl fmt::Debug for PageOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageOffset({:#X})", self.0)
    }
}
