//! Inverted page table: one descriptor per physical frame.

use crate::registry::ProcessId;
use alloc::boxed::Box;
use alloc::vec::Vec;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_memory_addresses::{FrameNumber, VirtualPageNumber};
use kernel_sync::{Condvar, SpinMutex, SpinMutexGuard};
use log::trace;

/// The page a frame currently holds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameOwner {
    pub pid: ProcessId,
    pub vpn: VirtualPageNumber,
}

/// State of one physical frame.
///
/// `pins` counts outstanding pins; the frame may not be chosen as a victim
/// while it is non-zero. `allocated` is clear while the frame sits in the
/// free pool.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FrameDescriptor {
    pub owner: Option<FrameOwner>,
    pub used: bool,
    pub pins: u16,
    pub allocated: bool,
}

impl FrameDescriptor {
    #[inline]
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pins > 0
    }
}

/// Kernel-wide frame ownership, fronting the free frame pool.
///
/// Every method is a point operation under one table-wide lock that is
/// never held across I/O. Unpinning wakes threads that found every frame
/// pinned.
pub struct FrameTable {
    descriptors: SpinMutex<Vec<FrameDescriptor>>,
    unpinned: Condvar,
    pool: Box<dyn FrameAlloc>,
}

impl FrameTable {
    pub fn new(frame_count: u32, pool: Box<dyn FrameAlloc>) -> Self {
        Self {
            descriptors: SpinMutex::new(alloc::vec![
                FrameDescriptor::default();
                frame_count as usize
            ]),
            unpinned: Condvar::new(),
            pool,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn frame_count(&self) -> u32 {
        self.descriptors.lock().len() as u32
    }

    fn with<R>(&self, frame: FrameNumber, f: impl FnOnce(&mut FrameDescriptor) -> R) -> R {
        let mut descriptors = self.descriptors.lock();
        let count = descriptors.len();
        let d = descriptors
            .get_mut(frame.as_usize())
            .unwrap_or_else(|| panic!("{frame} is outside the frame table ({count} frames)"));
        f(d)
    }

    /// Take a frame from the free pool. `None` means the caller must evict.
    pub fn allocate_free_frame(&self) -> Option<FrameNumber> {
        let frame = self.pool.allocate_frame()?;
        self.with(frame, |d| {
            debug_assert!(!d.allocated, "pool handed out allocated {frame}");
            *d = FrameDescriptor {
                allocated: true,
                ..FrameDescriptor::default()
            };
        });
        Some(frame)
    }

    /// Take `count` frames from the free pool, or none.
    pub fn allocate_frames(&self, count: usize) -> Option<Vec<FrameNumber>> {
        let frames = self.pool.allocate_frames(count)?;
        let mut descriptors = self.descriptors.lock();
        for frame in &frames {
            descriptors[frame.as_usize()] = FrameDescriptor {
                allocated: true,
                ..FrameDescriptor::default()
            };
        }
        Some(frames)
    }

    /// Forget the frame's owner and pins and return it to the free pool.
    pub fn release(&self, frame: FrameNumber) {
        let was_pinned = self.with(frame, |d| {
            let pinned = d.is_pinned();
            *d = FrameDescriptor::default();
            pinned
        });
        self.pool.recycle_frame(frame);
        if was_pinned {
            self.unpinned.notify_all();
        }
    }

    pub fn is_free_pool_empty(&self) -> bool {
        self.pool.is_free_pool_empty()
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    pub fn assign(&self, frame: FrameNumber, pid: ProcessId, vpn: VirtualPageNumber) {
        self.with(frame, |d| d.owner = Some(FrameOwner { pid, vpn }));
    }

    pub fn clear(&self, frame: FrameNumber) {
        self.with(frame, |d| {
            d.owner = None;
            d.used = false;
        });
    }

    pub fn owner_of(&self, frame: FrameNumber) -> Option<FrameOwner> {
        self.with(frame, |d| d.owner)
    }

    pub fn descriptor(&self, frame: FrameNumber) -> FrameDescriptor {
        self.with(frame, |d| *d)
    }

    pub fn mark_used(&self, frame: FrameNumber) {
        self.with(frame, |d| d.used = true);
    }

    pub fn clear_used(&self, frame: FrameNumber) {
        self.with(frame, |d| d.used = false);
    }

    pub fn pin(&self, frame: FrameNumber) {
        let pins = self.with(frame, |d| {
            d.pins += 1;
            d.pins
        });
        trace!("pinned {frame} ({pins})");
    }

    /// Drop one pin. Waiters are woken when the last pin goes.
    pub fn unpin(&self, frame: FrameNumber) {
        let pins = self.with(frame, |d| {
            debug_assert!(d.pins > 0, "{frame} unpinned more often than pinned");
            d.pins = d.pins.saturating_sub(1);
            d.pins
        });
        trace!("unpinned {frame} ({pins})");
        if pins == 0 {
            self.unpinned.notify_all();
        }
    }

    pub fn is_pinned(&self, frame: FrameNumber) -> bool {
        self.with(frame, |d| d.is_pinned())
    }

    /// Copy of every descriptor, indexed by frame number.
    pub fn snapshot(&self) -> Vec<FrameDescriptor> {
        self.descriptors.lock().clone()
    }

    pub(crate) fn lock(&self) -> SpinMutexGuard<'_, Vec<FrameDescriptor>> {
        self.descriptors.lock()
    }

    pub(crate) const fn unpinned(&self) -> &Condvar {
        &self.unpinned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::frame_alloc::FreeListFrameAlloc;

    fn table(frames: u32) -> FrameTable {
        FrameTable::new(frames, Box::new(FreeListFrameAlloc::new(frames)))
    }

    #[test]
    fn allocation_marks_frames_and_release_returns_them() {
        let t = table(2);
        let f = t.allocate_free_frame().unwrap();
        assert!(t.descriptor(f).allocated);
        assert_eq!(t.free_count(), 1);

        t.assign(f, ProcessId::new(1), VirtualPageNumber::new(4));
        t.pin(f);
        t.release(f);
        assert_eq!(t.descriptor(f), FrameDescriptor::default());
        assert_eq!(t.free_count(), 2);
    }

    #[test]
    fn pins_nest() {
        let t = table(1);
        let f = t.allocate_free_frame().unwrap();
        t.pin(f);
        t.pin(f);
        t.unpin(f);
        assert!(t.is_pinned(f));
        t.unpin(f);
        assert!(!t.is_pinned(f));
    }

    #[test]
    fn clear_keeps_pins() {
        let t = table(1);
        let f = t.allocate_free_frame().unwrap();
        t.assign(f, ProcessId::new(0), VirtualPageNumber::new(0));
        t.mark_used(f);
        t.pin(f);
        t.clear(f);
        let d = t.descriptor(f);
        assert_eq!(d.owner, None);
        assert!(!d.used);
        assert!(d.is_pinned());
    }

    #[test]
    fn bulk_allocation_is_all_or_nothing() {
        let t = table(3);
        assert!(t.allocate_frames(4).is_none());
        let frames = t.allocate_frames(3).unwrap();
        assert!(frames.iter().all(|&f| t.descriptor(f).allocated));
        assert!(t.is_free_pool_empty());
    }
}
