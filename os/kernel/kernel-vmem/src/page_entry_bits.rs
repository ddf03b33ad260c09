use bitfield_struct::bitfield;
use kernel_memory_addresses::FrameNumber;

/// One entry of a process page table in its packed 32-bit form.
///
/// ### Bit layout
///
/// | Bits  | Name        | Meaning |
/// |-------|-------------|---------|
/// | 0     | `valid`     | The page is resident in `frame`; accesses may proceed. |
/// | 1     | `read_only` | Writes to the page are rejected. |
/// | 2     | `used`      | The page was accessed since the clock hand last passed. |
/// | 3     | `dirty`     | Memory holds the only current copy; eviction must write it to swap. |
/// | 4     | `has_frame` | Bits 8–31 hold a frame number. |
/// | 5–7   | reserved    | Zero. |
/// | 8–31  | `frame`     | Physical frame number. |
///
/// ### Notes
/// - `valid` and `has_frame` are independent. An evicted page keeps its last
///   frame number, which by then may belong to another process; only
///   [`resident_frame`](Self::resident_frame) is safe to act on.
/// - `read_only` is set from the executable section at load time and never
///   changes afterwards.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// # use kernel_memory_addresses::FrameNumber;
/// let e = PageEntryBits::new()
///     .with_frame(Some(FrameNumber::new(7)))
///     .with_valid(true);
/// assert_eq!(e.resident_frame(), Some(FrameNumber::new(7)));
/// assert_eq!(e.with_valid(false).resident_frame(), None);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Resident and accessible.
    pub valid: bool,

    /// Writes fault with a protection error.
    pub read_only: bool,

    /// Referenced since last cleared.
    pub used: bool,

    /// Written since loaded.
    pub dirty: bool,

    has_frame: bool,

    #[bits(3)]
    __: u8,

    #[bits(24)]
    frame_bits: u32,
}

impl PageEntryBits {
    /// The last frame this entry pointed at, resident or not.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<FrameNumber> {
        if self.has_frame() {
            Some(FrameNumber::new(self.frame_bits()))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_frame(self, frame: Option<FrameNumber>) -> Self {
        match frame {
            Some(f) => self.with_has_frame(true).with_frame_bits(f.as_u32()),
            None => self.with_has_frame(false).with_frame_bits(0),
        }
    }

    #[inline]
    pub const fn set_frame(&mut self, frame: Option<FrameNumber>) {
        *self = self.with_frame(frame);
    }

    /// The frame if the page is resident.
    #[inline]
    #[must_use]
    pub const fn resident_frame(self) -> Option<FrameNumber> {
        if self.valid() { self.frame() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_through_the_packed_field() {
        let top = FrameNumber::new((1 << 24) - 1);
        let e = PageEntryBits::new().with_frame(Some(top));
        assert_eq!(e.frame(), Some(top));
        assert!(!e.valid());
        assert_eq!(e.into_bits() >> 8, (1 << 24) - 1);
    }

    #[test]
    fn flags_do_not_disturb_the_frame() {
        let mut e = PageEntryBits::new().with_frame(Some(FrameNumber::new(3)));
        e.set_valid(true);
        e.set_dirty(true);
        e.set_used(true);
        e.set_read_only(true);
        assert_eq!(e.resident_frame(), Some(FrameNumber::new(3)));
        e.set_frame(None);
        assert_eq!(e.frame(), None);
        assert!(e.dirty() && e.used() && e.read_only());
    }
}
