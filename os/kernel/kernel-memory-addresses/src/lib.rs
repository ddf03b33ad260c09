//! # Simulated Machine Address Types
//!
//! Strongly typed wrappers for the addresses and page indices used by the
//! virtual memory manager of the simulated machine.
//!
//! ## Overview
//!
//! The simulated processor uses 32-bit virtual addresses and a flat physical
//! memory made of fixed-size frames. Mixing a virtual page number with a
//! physical frame number is the classic paging bug, so every index gets its own
//! zero-cost type:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | A byte address in a process's virtual address space. |
//! | [`VirtualPageNumber`] | The index of a virtual page (`vaddr >> PAGE_SHIFT`). |
//! | [`PageOffset`] | A byte offset within one page (`0..PAGE_SIZE`). |
//! | [`FrameNumber`] | The index of a physical frame. |
//! | [`PhysicalAddress`] | A byte address in the flat physical memory buffer. |
//!
//! ## Page Size
//!
//! The page size is fixed for the whole machine at [`PAGE_SIZE`] bytes
//! (`1 << PAGE_SHIFT`). Physical address `frame * PAGE_SIZE + offset` selects
//! byte `offset` of frame `frame`.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(3 * PAGE_SIZE as u32 + 17);
//! let (vpn, off) = va.split();
//! assert_eq!(vpn.as_u32(), 3);
//! assert_eq!(off.as_usize(), 17);
//! assert_eq!(vpn.join(off), va);
//!
//! let pa = FrameNumber::new(5).join(off);
//! assert_eq!(pa.as_usize(), 5 * PAGE_SIZE + 17);
//! assert_eq!(pa.split(), (FrameNumber::new(5), off));
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys.
//! - All conversions are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod virtual_address;
mod virtual_page;

pub use physical_address::{FrameNumber, PhysicalAddress};
pub use virtual_address::VirtualAddress;
pub use virtual_page::{PageOffset, VirtualPageNumber};

/// log2 of the page size.
pub const PAGE_SHIFT: u32 = 10;

/// Size of a virtual page and of a physical frame, in bytes.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Mask selecting the in-page offset bits of an address.
pub const PAGE_MASK: u32 = (1 << PAGE_SHIFT) - 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_virtual() {
        let va = VirtualAddress::new(0x0001_2345);
        let (vpn, off) = va.split();
        assert_eq!(vpn.as_u32(), 0x0001_2345 >> PAGE_SHIFT);
        assert_eq!(off.as_usize(), 0x0001_2345 & PAGE_MASK as usize);
        assert_eq!(vpn.join(off), va);
    }

    #[test]
    fn split_and_join_physical() {
        let pa = PhysicalAddress::new(7 * PAGE_SIZE + 1000);
        let (frame, off) = pa.split();
        assert_eq!(frame, FrameNumber::new(7));
        assert_eq!(off.as_usize(), 1000);
        assert_eq!(frame.join(off), pa);
    }

    #[test]
    fn page_base_is_aligned() {
        let vpn = VirtualPageNumber::new(9);
        assert_eq!(vpn.base().as_u32() & PAGE_MASK, 0);
        assert_eq!(vpn.base().page(), vpn);
        assert_eq!(FrameNumber::new(4).base().as_usize(), 4 * PAGE_SIZE);
    }

    #[test]
    fn offset_remaining_counts_to_page_end() {
        assert_eq!(PageOffset::new(0).remaining(), PAGE_SIZE);
        assert_eq!(PageOffset::new(PAGE_SIZE - 1).remaining(), 1);
    }

    #[test]
    fn next_page_and_checked_add() {
        let vpn = VirtualPageNumber::new(1);
        assert_eq!(vpn.next(), VirtualPageNumber::new(2));
        let va = VirtualAddress::new(u32::MAX - 1);
        assert_eq!(va.checked_add(1), Some(VirtualAddress::new(u32::MAX)));
        assert_eq!(va.checked_add(2), None);
    }
}
