//! Pool of free physical frames.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use kernel_memory_addresses::FrameNumber;
use kernel_sync::SpinLock;
use log::trace;

/// Source of free physical frames.
///
/// Implementations are shared between kernel threads and synchronize
/// internally.
pub trait FrameAlloc: Send + Sync {
    /// Allocate exactly `count` frames, or none at all.
    fn allocate_frames(&self, count: usize) -> Option<Vec<FrameNumber>>;

    /// Return a frame to the pool.
    fn recycle_frame(&self, frame: FrameNumber);

    /// Whether the next allocation would fail.
    fn is_free_pool_empty(&self) -> bool;

    /// Number of frames currently in the pool.
    fn free_count(&self) -> usize;

    #[inline]
    fn allocate_frame(&self) -> Option<FrameNumber> {
        self.allocate_frames(1)?.pop()
    }
}

/// FIFO list of free frame numbers.
///
/// Starts out holding every frame of physical memory in ascending order.
pub struct FreeListFrameAlloc {
    free: SpinLock<VecDeque<FrameNumber>>,
    total: u32,
}

impl FreeListFrameAlloc {
    #[must_use]
    pub fn new(frame_count: u32) -> Self {
        Self {
            free: SpinLock::new((0..frame_count).map(FrameNumber::new).collect()),
            total: frame_count,
        }
    }
}

impl FrameAlloc for FreeListFrameAlloc {
    fn allocate_frames(&self, count: usize) -> Option<Vec<FrameNumber>> {
        let mut free = self.free.lock();
        if free.len() < count {
            trace!("pool has {} frames, {count} requested", free.len());
            return None;
        }
        Some(free.drain(..count).collect())
    }

    fn recycle_frame(&self, frame: FrameNumber) {
        debug_assert!(frame.as_u32() < self.total, "{frame} was never part of the pool");
        let mut free = self.free.lock();
        debug_assert!(!free.contains(&frame), "{frame} recycled twice");
        free.push_back(frame);
    }

    fn is_free_pool_empty(&self) -> bool {
        self.free.lock().is_empty()
    }

    fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_frames_in_order() {
        let pool = FreeListFrameAlloc::new(3);
        assert_eq!(pool.allocate_frame(), Some(FrameNumber::new(0)));
        assert_eq!(
            pool.allocate_frames(2),
            Some(vec![FrameNumber::new(1), FrameNumber::new(2)])
        );
        assert!(pool.is_free_pool_empty());
        assert_eq!(pool.allocate_frame(), None);
    }

    #[test]
    fn bulk_allocation_is_all_or_nothing() {
        let pool = FreeListFrameAlloc::new(2);
        assert_eq!(pool.allocate_frames(3), None);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn recycled_frames_go_to_the_back() {
        let pool = FreeListFrameAlloc::new(2);
        let a = pool.allocate_frame().unwrap();
        pool.recycle_frame(a);
        assert_eq!(pool.allocate_frame(), Some(FrameNumber::new(1)));
        assert_eq!(pool.allocate_frame(), Some(a));
    }
}
