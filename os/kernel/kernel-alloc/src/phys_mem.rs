//! Flat physical memory of the simulated machine.

use alloc::boxed::Box;
use alloc::vec::Vec;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PhysicalAddress};
use kernel_sync::SpinLock;

/// Contents of one physical frame.
pub type FrameBytes = [u8; PAGE_SIZE];

/// The machine's main memory: `frame_count` frames of [`PAGE_SIZE`] bytes.
///
/// Each frame has its own lock so copies into different frames proceed in
/// parallel. Frame locks are leaf locks: no other lock may be taken while a
/// frame closure runs.
///
/// # Panics
/// Every accessor panics when handed a frame number beyond the end of
/// memory. Frame numbers come from the allocator, so this is an internal
/// invariant break, not an input error.
pub struct PhysicalMemory {
    frames: Box<[SpinLock<FrameBytes>]>,
}

impl PhysicalMemory {
    #[must_use]
    pub fn new(frame_count: u32) -> Self {
        let frames: Vec<_> = (0..frame_count)
            .map(|_| SpinLock::new([0u8; PAGE_SIZE]))
            .collect();
        Self {
            frames: frames.into_boxed_slice(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }

    /// Total size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.frames.len() * PAGE_SIZE
    }

    #[inline]
    fn frame(&self, frame: FrameNumber) -> &SpinLock<FrameBytes> {
        self.frames.get(frame.as_usize()).unwrap_or_else(|| {
            panic!(
                "{frame} is outside physical memory ({} frames)",
                self.frames.len()
            )
        })
    }

    pub fn with_frame<R>(&self, frame: FrameNumber, f: impl FnOnce(&FrameBytes) -> R) -> R {
        self.frame(frame).with_lock(|bytes| f(bytes))
    }

    pub fn with_frame_mut<R>(&self, frame: FrameNumber, f: impl FnOnce(&mut FrameBytes) -> R) -> R {
        self.frame(frame).with_lock(f)
    }

    pub fn zero_frame(&self, frame: FrameNumber) {
        self.with_frame_mut(frame, |bytes| bytes.fill(0));
    }

    /// Copy from `pa` into `buf`, stopping at the end of the frame.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&self, pa: PhysicalAddress, buf: &mut [u8]) -> usize {
        let (frame, offset) = pa.split();
        let len = buf.len().min(offset.remaining());
        let start = offset.as_usize();
        self.with_frame(frame, |bytes| {
            buf[..len].copy_from_slice(&bytes[start..start + len]);
        });
        len
    }

    /// Copy `data` to `pa`, stopping at the end of the frame.
    ///
    /// Returns the number of bytes copied.
    pub fn write(&self, pa: PhysicalAddress, data: &[u8]) -> usize {
        let (frame, offset) = pa.split();
        let len = data.len().min(offset.remaining());
        let start = offset.as_usize();
        self.with_frame_mut(frame, |bytes| {
            bytes[start..start + len].copy_from_slice(&data[..len]);
        });
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PageOffset;

    #[test]
    fn starts_zeroed() {
        let mem = PhysicalMemory::new(2);
        assert_eq!(mem.frame_count(), 2);
        assert_eq!(mem.size(), 2 * PAGE_SIZE);
        assert!(mem.with_frame(FrameNumber::new(1), |b| b.iter().all(|&x| x == 0)));
    }

    #[test]
    fn read_and_write_stop_at_frame_end() {
        let mem = PhysicalMemory::new(2);
        let pa = FrameNumber::new(0).join(PageOffset::new(PAGE_SIZE - 2));
        assert_eq!(mem.write(pa, &[1, 2, 3, 4]), 2);

        // the next frame is untouched
        assert_eq!(mem.with_frame(FrameNumber::new(1), |b| b[0]), 0);

        let mut buf = [0u8; 4];
        assert_eq!(mem.read(pa, &mut buf), 2);
        assert_eq!(&buf[..2], &[1, 2]);
    }

    #[test]
    fn zero_frame_clears_contents() {
        let mem = PhysicalMemory::new(1);
        let f = FrameNumber::new(0);
        mem.with_frame_mut(f, |b| b.fill(0xFF));
        mem.zero_frame(f);
        assert!(mem.with_frame(f, |b| b.iter().all(|&x| x == 0)));
    }

    #[test]
    #[should_panic(expected = "outside physical memory")]
    fn out_of_range_frame_panics() {
        let mem = PhysicalMemory::new(1);
        mem.zero_frame(FrameNumber::new(1));
    }
}
