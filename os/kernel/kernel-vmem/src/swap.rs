//! Disk-backed swap store.
//!
//! The swap file is headerless: slot `i` occupies bytes
//! `[i * PAGE_SIZE, (i + 1) * PAGE_SIZE)`. Slots are handed out from a FIFO
//! free list first and from a growing high-water mark otherwise, so the file
//! only ever grows to the peak number of pages swapped out at once.

use crate::error::SwapError;
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;
use kernel_alloc::phys_mem::{FrameBytes, PhysicalMemory};
use kernel_fs::OpenFile;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE};
use kernel_sync::TicketMutex;
use log::{trace, warn};

/// Index of a page-sized cell in the swap file.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SwapSlot(u32);

impl SwapSlot {
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Byte offset of the slot in the swap file.
    #[inline]
    #[must_use]
    pub const fn file_offset(self) -> u64 {
        self.0 as u64 * PAGE_SIZE as u64
    }
}

impl fmt::Display for SwapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct SwapInner {
    file: Box<dyn OpenFile>,
    free: VecDeque<SwapSlot>,
    high_water: u32,
}

/// Page-granular storage on top of one open file.
///
/// One lock guards the free list, the high-water mark and the file
/// position, so reads and writes are serialized. The store applies no
/// policy; callers decide what to swap.
pub struct SwapStore {
    inner: TicketMutex<SwapInner>,
}

impl SwapStore {
    pub fn new(file: Box<dyn OpenFile>) -> Self {
        Self {
            inner: TicketMutex::new(SwapInner {
                file,
                free: VecDeque::new(),
                high_water: 0,
            }),
        }
    }

    /// Take the oldest recycled slot, or a fresh one past the high-water mark.
    pub fn alloc_slot(&self) -> SwapSlot {
        Self::alloc_locked(&mut self.inner.lock())
    }

    fn alloc_locked(inner: &mut SwapInner) -> SwapSlot {
        if let Some(slot) = inner.free.pop_front() {
            return slot;
        }
        let slot = SwapSlot(inner.high_water);
        inner.high_water += 1;
        slot
    }

    pub fn recycle_slot(&self, slot: SwapSlot) {
        let mut inner = self.inner.lock();
        debug_assert!(slot.0 < inner.high_water, "slot {slot} was never allocated");
        debug_assert!(!inner.free.contains(&slot), "slot {slot} recycled twice");
        inner.free.push_back(slot);
    }

    /// Write one page into `slot`.
    ///
    /// # Errors
    /// [`SwapError::ShortWrite`] if the file accepted fewer than
    /// [`PAGE_SIZE`] bytes.
    pub fn write_page(&self, slot: SwapSlot, bytes: &FrameBytes) -> Result<(), SwapError> {
        Self::write_locked(&mut self.inner.lock(), slot, bytes)
    }

    fn write_locked(
        inner: &mut SwapInner,
        slot: SwapSlot,
        bytes: &FrameBytes,
    ) -> Result<(), SwapError> {
        let written = inner.file.write_at(slot.file_offset(), bytes);
        if written == PAGE_SIZE {
            Ok(())
        } else {
            Err(SwapError::ShortWrite {
                slot,
                written,
                expected: PAGE_SIZE,
            })
        }
    }

    /// Read one page from `slot`.
    ///
    /// # Errors
    /// [`SwapError::ShortRead`] if the file returned fewer than
    /// [`PAGE_SIZE`] bytes.
    pub fn read_page(&self, slot: SwapSlot, bytes: &mut FrameBytes) -> Result<(), SwapError> {
        let read = self.inner.lock().file.read_at(slot.file_offset(), bytes);
        if read == PAGE_SIZE {
            Ok(())
        } else {
            Err(SwapError::ShortRead {
                slot,
                read,
                expected: PAGE_SIZE,
            })
        }
    }

    /// Copy `frame` into a newly allocated slot.
    ///
    /// On failure the slot goes straight back to the free list.
    ///
    /// # Errors
    /// Propagates [`SwapError::ShortWrite`].
    pub fn page_out(
        &self,
        frame: FrameNumber,
        memory: &PhysicalMemory,
    ) -> Result<SwapSlot, SwapError> {
        let bytes = memory.with_frame(frame, |b| *b);

        let mut inner = self.inner.lock();
        let slot = Self::alloc_locked(&mut inner);
        match Self::write_locked(&mut inner, slot, &bytes) {
            Ok(()) => {
                trace!("{frame} written to slot {slot}");
                Ok(slot)
            }
            Err(e) => {
                warn!("{e}");
                inner.free.push_back(slot);
                Err(e)
            }
        }
    }

    /// Fill `frame` from `slot` and recycle the slot.
    ///
    /// On failure the frame is left untouched and the slot stays allocated.
    ///
    /// # Errors
    /// Propagates [`SwapError::ShortRead`].
    pub fn page_in(
        &self,
        slot: SwapSlot,
        frame: FrameNumber,
        memory: &PhysicalMemory,
    ) -> Result<(), SwapError> {
        let mut bytes = [0u8; PAGE_SIZE];
        if let Err(e) = self.read_page(slot, &mut bytes) {
            warn!("{e}");
            return Err(e);
        }
        memory.with_frame_mut(frame, |b| *b = bytes);
        self.recycle_slot(slot);
        trace!("slot {slot} read into {frame}");
        Ok(())
    }

    /// Number of slots ever handed out.
    pub fn high_water(&self) -> u32 {
        self.inner.lock().high_water
    }

    /// Recycled slots in reuse order.
    pub fn free_slots(&self) -> Vec<SwapSlot> {
        self.inner.lock().free.iter().copied().collect()
    }

    /// Slots currently holding a page.
    pub fn slots_in_use(&self) -> usize {
        let inner = self.inner.lock();
        inner.high_water as usize - inner.free.len()
    }

    pub fn close(&self) {
        self.inner.lock().file.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_fs::{FileSystem, MemoryFileSystem};

    fn store(fs: &MemoryFileSystem) -> SwapStore {
        SwapStore::new(fs.open("swap", true).unwrap())
    }

    #[test]
    fn slots_are_reused_oldest_first() {
        let fs = MemoryFileSystem::new();
        let swap = store(&fs);
        let a = swap.alloc_slot();
        let b = swap.alloc_slot();
        let c = swap.alloc_slot();
        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));

        swap.recycle_slot(c);
        swap.recycle_slot(a);
        assert_eq!(swap.free_slots(), vec![c, a]);
        assert_eq!(swap.alloc_slot(), c);
        assert_eq!(swap.alloc_slot(), a);
        assert_eq!(swap.alloc_slot(), SwapSlot::new(3));
        assert_eq!(swap.high_water(), 4);
    }

    #[test]
    fn page_out_and_in_restore_the_frame() {
        let fs = MemoryFileSystem::new();
        let swap = store(&fs);
        let mem = PhysicalMemory::new(2);
        let (f0, f1) = (FrameNumber::new(0), FrameNumber::new(1));
        mem.with_frame_mut(f0, |b| b.fill(0x5A));

        let slot = swap.page_out(f0, &mem).unwrap();
        assert_eq!(fs.file_len("swap"), Some(PAGE_SIZE));
        assert_eq!(swap.slots_in_use(), 1);

        swap.page_in(slot, f1, &mem).unwrap();
        assert!(mem.with_frame(f1, |b| b.iter().all(|&x| x == 0x5A)));
        assert_eq!(swap.free_slots(), vec![slot]);
        assert_eq!(swap.slots_in_use(), 0);
    }

    #[test]
    fn pages_written_to_a_slot_read_back_unchanged() {
        let fs = MemoryFileSystem::new();
        let swap = store(&fs);
        let (a, b) = (swap.alloc_slot(), swap.alloc_slot());

        let mut page = [0u8; PAGE_SIZE];
        page[0] = 0x11;
        page[PAGE_SIZE - 1] = 0x22;
        swap.write_page(b, &page).unwrap();
        swap.write_page(a, &[0x33; PAGE_SIZE]).unwrap();
        assert_eq!(fs.file_len("swap"), Some(2 * PAGE_SIZE));

        let mut out = [0u8; PAGE_SIZE];
        swap.read_page(b, &mut out).unwrap();
        assert_eq!(out, page);
        swap.read_page(a, &mut out).unwrap();
        assert!(out.iter().all(|&x| x == 0x33));
        // raw page access leaves slot ownership alone
        assert_eq!(swap.slots_in_use(), 2);
    }

    #[test]
    fn short_write_recycles_the_slot() {
        let fs = MemoryFileSystem::with_capacity_limit(PAGE_SIZE + 10);
        let swap = store(&fs);
        let mem = PhysicalMemory::new(1);
        let f = FrameNumber::new(0);

        assert_eq!(swap.page_out(f, &mem), Ok(SwapSlot::new(0)));
        assert_eq!(
            swap.page_out(f, &mem),
            Err(SwapError::ShortWrite {
                slot: SwapSlot::new(1),
                written: 10,
                expected: PAGE_SIZE
            })
        );
        assert_eq!(swap.free_slots(), vec![SwapSlot::new(1)]);
    }

    #[test]
    fn short_read_keeps_the_slot_allocated() {
        let fs = MemoryFileSystem::new();
        let swap = store(&fs);
        let mem = PhysicalMemory::new(1);
        let slot = swap.alloc_slot();

        // nothing was ever written to the slot
        let err = swap.page_in(slot, FrameNumber::new(0), &mem).unwrap_err();
        assert!(matches!(err, SwapError::ShortRead { read: 0, .. }));
        assert!(swap.free_slots().is_empty());
    }
}
