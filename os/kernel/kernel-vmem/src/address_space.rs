//! # Per-Process Address Space
//!
//! A flat, single-level page table covering virtual pages
//! `0..num_pages`, plus the map of pages currently held in swap.
//!
//! ## Highlights
//!
//! - `AddressSpace::translate` resolves a page to its frame only while the
//!   entry is valid.
//! - `AddressSpace::set_mapping` installs a frame; `AddressSpace::invalidate`
//!   takes it away again on eviction.
//! - `AddressSpace::record_swap` / `AddressSpace::take_swap` track which swap
//!   slot holds an evicted dirty page.
//!
//! ## Design
//!
//! - Every accessor locks, because the eviction path of one process mutates
//!   the table of another.
//! - Out-of-range pages read as `None` and writes to them are ignored;
//!   range checks belong to the caller, which reports them as errors.

use crate::page_entry_bits::PageEntryBits;
use crate::swap::SwapSlot;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use kernel_memory_addresses::{FrameNumber, VirtualPageNumber};
use kernel_sync::SpinMutex;

struct Inner {
    entries: Vec<PageEntryBits>,
    swapped: BTreeMap<VirtualPageNumber, SwapSlot>,
}

impl Inner {
    fn entry_mut(&mut self, vpn: VirtualPageNumber) -> Option<&mut PageEntryBits> {
        self.entries.get_mut(vpn.as_usize())
    }
}

pub struct AddressSpace {
    inner: SpinMutex<Inner>,
    num_pages: u32,
}

impl AddressSpace {
    /// A space of `num_pages` invalid, writable pages.
    #[must_use]
    pub fn new(num_pages: u32) -> Self {
        Self {
            inner: SpinMutex::new(Inner {
                entries: vec![PageEntryBits::new(); num_pages as usize],
                swapped: BTreeMap::new(),
            }),
            num_pages,
        }
    }

    #[inline]
    #[must_use]
    pub const fn num_pages(&self) -> u32 {
        self.num_pages
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, vpn: VirtualPageNumber) -> bool {
        vpn.as_u32() < self.num_pages
    }

    /// The frame backing `vpn`, if the entry is valid.
    pub fn translate(&self, vpn: VirtualPageNumber) -> Option<FrameNumber> {
        self.entry(vpn)?.resident_frame()
    }

    pub fn entry(&self, vpn: VirtualPageNumber) -> Option<PageEntryBits> {
        self.inner.lock().entries.get(vpn.as_usize()).copied()
    }

    pub fn is_read_only(&self, vpn: VirtualPageNumber) -> bool {
        self.entry(vpn).is_some_and(|e| e.read_only())
    }

    fn update(&self, vpn: VirtualPageNumber, f: impl FnOnce(&mut PageEntryBits)) {
        if let Some(e) = self.inner.lock().entry_mut(vpn) {
            f(e);
        }
    }

    pub fn mark_used(&self, vpn: VirtualPageNumber) {
        self.update(vpn, |e| e.set_used(true));
    }

    pub fn clear_used(&self, vpn: VirtualPageNumber) {
        self.update(vpn, |e| e.set_used(false));
    }

    pub fn mark_dirty(&self, vpn: VirtualPageNumber) {
        self.update(vpn, |e| e.set_dirty(true));
    }

    pub fn set_read_only(&self, vpn: VirtualPageNumber, read_only: bool) {
        self.update(vpn, |e| e.set_read_only(read_only));
    }

    /// Point `vpn` at `frame`. Clears the used and dirty bits.
    pub fn set_mapping(
        &self,
        vpn: VirtualPageNumber,
        frame: FrameNumber,
        valid: bool,
        read_only: bool,
    ) {
        self.update(vpn, |e| {
            *e = PageEntryBits::new()
                .with_frame(Some(frame))
                .with_valid(valid)
                .with_read_only(read_only);
        });
    }

    /// Mark `vpn` non-resident and return the entry as it was.
    ///
    /// The frame number and read-only bit are kept; used and dirty are
    /// cleared.
    pub fn invalidate(&self, vpn: VirtualPageNumber) -> Option<PageEntryBits> {
        let mut inner = self.inner.lock();
        let e = inner.entry_mut(vpn)?;
        let before = *e;
        e.set_valid(false);
        e.set_used(false);
        e.set_dirty(false);
        Some(before)
    }

    pub fn swap_slot(&self, vpn: VirtualPageNumber) -> Option<SwapSlot> {
        self.inner.lock().swapped.get(&vpn).copied()
    }

    pub fn record_swap(&self, vpn: VirtualPageNumber, slot: SwapSlot) {
        let previous = self.inner.lock().swapped.insert(vpn, slot);
        debug_assert!(previous.is_none(), "{vpn} was already in swap");
    }

    pub fn take_swap(&self, vpn: VirtualPageNumber) -> Option<SwapSlot> {
        self.inner.lock().swapped.remove(&vpn)
    }

    /// Remove and return every swap slot, for teardown.
    pub fn drain_swap(&self) -> Vec<SwapSlot> {
        let swapped = core::mem::take(&mut self.inner.lock().swapped);
        swapped.into_values().collect()
    }

    /// Pages currently in swap with their slots.
    pub fn swapped(&self) -> Vec<(VirtualPageNumber, SwapSlot)> {
        self.inner
            .lock()
            .swapped
            .iter()
            .map(|(&vpn, &slot)| (vpn, slot))
            .collect()
    }

    /// Valid pages with their frames, in page order.
    pub fn resident(&self) -> Vec<(VirtualPageNumber, FrameNumber)> {
        self.inner
            .lock()
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                #[allow(clippy::cast_possible_truncation)]
                let vpn = VirtualPageNumber::new(i as u32);
                e.resident_frame().map(|f| (vpn, f))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P0: VirtualPageNumber = VirtualPageNumber::new(0);
    const P1: VirtualPageNumber = VirtualPageNumber::new(1);

    #[test]
    fn translate_requires_valid() {
        let s = AddressSpace::new(2);
        assert_eq!(s.translate(P0), None);
        s.set_mapping(P0, FrameNumber::new(5), false, false);
        assert_eq!(s.translate(P0), None);
        s.set_mapping(P0, FrameNumber::new(5), true, false);
        assert_eq!(s.translate(P0), Some(FrameNumber::new(5)));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let s = AddressSpace::new(1);
        assert!(!s.contains(P1));
        s.mark_dirty(P1);
        s.set_mapping(P1, FrameNumber::new(0), true, false);
        assert_eq!(s.entry(P1), None);
        assert_eq!(s.invalidate(P1), None);
    }

    #[test]
    fn invalidate_keeps_frame_and_protection() {
        let s = AddressSpace::new(1);
        s.set_mapping(P0, FrameNumber::new(2), true, true);
        s.mark_used(P0);
        s.mark_dirty(P0);

        let before = s.invalidate(P0).unwrap();
        assert!(before.valid() && before.used() && before.dirty());

        let after = s.entry(P0).unwrap();
        assert!(!after.valid() && !after.used() && !after.dirty());
        assert!(after.read_only());
        assert_eq!(after.frame(), Some(FrameNumber::new(2)));
        assert!(s.resident().is_empty());
    }

    #[test]
    fn swap_map_tracks_slots() {
        let s = AddressSpace::new(2);
        s.record_swap(P0, SwapSlot::new(3));
        s.record_swap(P1, SwapSlot::new(1));
        assert_eq!(s.swap_slot(P0), Some(SwapSlot::new(3)));
        assert_eq!(s.take_swap(P0), Some(SwapSlot::new(3)));
        assert_eq!(s.swap_slot(P0), None);
        assert_eq!(s.drain_swap(), vec![SwapSlot::new(1)]);
        assert!(s.swapped().is_empty());
    }
}
