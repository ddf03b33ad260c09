use crate::{PAGE_MASK, PAGE_SHIFT, PageOffset, VirtualPageNumber};
use core::fmt;

/// Virtual memory address of the simulated 32-bit processor.
///
/// A `VirtualAddress` only has meaning relative to one process's address
/// space; translation to a [`PhysicalAddress`](crate::PhysicalAddress) goes
/// through that process's page table.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x0000_0C10);
/// assert_eq!(va.page(), VirtualPageNumber::new(3));
/// assert_eq!(va.offset().as_usize(), 0x10);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(pub(crate) u32);

impl VirtualAddress {
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

    /// The virtual page that contains this address.
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPageNumber {
        VirtualPageNumber(self.0 >> PAGE_SHIFT)
    }

    /// The offset of this address within its page.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> PageOffset {
        PageOffset((self.0 & PAGE_MASK) as u16)
    }

    /// Split into (`VirtualPageNumber`, `PageOffset`).
    #[inline]
    #[must_use]
    pub const fn split(self) -> (VirtualPageNumber, PageOffset) {
        (self.page(), self.offset())
    }

    /// Add a byte count, returning `None` on 32-bit overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, bytes: u32) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualAddress(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self(v)
    }
}
