//! Clock (second-chance) page replacement over the inverted page table.

use crate::frame_table::{FrameOwner, FrameTable};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_memory_addresses::FrameNumber;
use log::trace;

/// Result of one victim search.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ClockOutcome {
    /// `frame` is pinned on the caller's behalf and must be unpinned by it.
    Victim {
        frame: FrameNumber,
        owner: Option<FrameOwner>,
        /// Owners whose used bit the sweep cleared, in hand order.
        demoted: Vec<FrameOwner>,
    },
    /// A full lap saw nothing but pinned frames. Wait on the frame table's
    /// unpin condition with this epoch, then search again.
    AllPinned { epoch: u32, demoted: Vec<FrameOwner> },
}

/// Rotating hand over `0..frame_count`, persisted across searches.
pub struct ClockPolicy {
    hand: AtomicUsize,
}

impl Default for ClockPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPolicy {
    /// The hand starts just before frame 0, so the first search looks at
    /// frame 0 first.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hand: AtomicUsize::new(usize::MAX),
        }
    }

    /// Frame the hand points at, if it has moved yet.
    pub fn hand(&self) -> Option<FrameNumber> {
        match self.hand.load(Ordering::Relaxed) {
            usize::MAX => None,
            #[allow(clippy::cast_possible_truncation)]
            h => Some(FrameNumber::new(h as u32)),
        }
    }

    /// Search for a victim.
    ///
    /// Pinned frames and frames in the free pool are skipped. An unpinned
    /// frame with its used bit set loses the bit and is passed over; the
    /// first unpinned frame without it becomes the victim and is pinned
    /// before the table lock is released.
    pub fn select_victim(&self, frames: &FrameTable) -> ClockOutcome {
        let mut descriptors = frames.lock();
        let count = descriptors.len();
        let mut demoted = Vec::new();
        if count == 0 {
            return ClockOutcome::AllPinned {
                epoch: frames.unpinned().epoch(),
                demoted,
            };
        }

        let mut hand = self.hand.load(Ordering::Relaxed);
        let mut seen_unpinned = false;
        let mut step = 0usize;
        loop {
            hand = hand.wrapping_add(1) % count;
            step += 1;

            let d = &mut descriptors[hand];
            if d.allocated && !d.is_pinned() {
                seen_unpinned = true;
                if d.used {
                    d.used = false;
                    if let Some(owner) = d.owner {
                        demoted.push(owner);
                    }
                } else {
                    d.pins += 1;
                    let owner = d.owner;
                    self.hand.store(hand, Ordering::Relaxed);
                    #[allow(clippy::cast_possible_truncation)]
                    let frame = FrameNumber::new(hand as u32);
                    trace!("clock picked {frame} after {step} steps");
                    return ClockOutcome::Victim {
                        frame,
                        owner,
                        demoted,
                    };
                }
            }

            if step % count == 0 {
                if !seen_unpinned {
                    self.hand.store(hand, Ordering::Relaxed);
                    trace!("clock lap found every frame pinned");
                    return ClockOutcome::AllPinned {
                        epoch: frames.unpinned().epoch(),
                        demoted,
                    };
                }
                seen_unpinned = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProcessId;
    use alloc::boxed::Box;
    use kernel_alloc::frame_alloc::FreeListFrameAlloc;
    use kernel_memory_addresses::VirtualPageNumber;

    fn full_table(frames: u32) -> FrameTable {
        let t = FrameTable::new(frames, Box::new(FreeListFrameAlloc::new(frames)));
        for f in t.allocate_frames(frames as usize).unwrap() {
            t.assign(f, ProcessId::new(0), VirtualPageNumber::new(f.as_u32()));
        }
        t
    }

    fn victim(outcome: ClockOutcome) -> FrameNumber {
        match outcome {
            ClockOutcome::Victim { frame, .. } => frame,
            ClockOutcome::AllPinned { .. } => panic!("expected a victim"),
        }
    }

    #[test]
    fn unused_frames_are_taken_in_hand_order() {
        let t = full_table(3);
        let clock = ClockPolicy::new();
        let first = victim(clock.select_victim(&t));
        assert_eq!(first, FrameNumber::new(0));
        assert!(t.is_pinned(first));
        t.unpin(first);
        assert_eq!(victim(clock.select_victim(&t)), FrameNumber::new(1));
        assert_eq!(clock.hand(), Some(FrameNumber::new(1)));
    }

    #[test]
    fn used_frames_get_a_second_chance() {
        let t = full_table(3);
        t.mark_used(FrameNumber::new(0));
        t.mark_used(FrameNumber::new(1));
        let clock = ClockPolicy::new();
        match clock.select_victim(&t) {
            ClockOutcome::Victim { frame, demoted, .. } => {
                assert_eq!(frame, FrameNumber::new(2));
                assert_eq!(demoted.len(), 2);
                assert_eq!(demoted[0].vpn, VirtualPageNumber::new(0));
            }
            ClockOutcome::AllPinned { .. } => panic!("expected a victim"),
        }
        assert!(!t.descriptor(FrameNumber::new(0)).used);
    }

    #[test]
    fn all_used_frames_fall_back_to_the_first() {
        let t = full_table(2);
        t.mark_used(FrameNumber::new(0));
        t.mark_used(FrameNumber::new(1));
        assert_eq!(victim(ClockPolicy::new().select_victim(&t)), FrameNumber::new(0));
    }

    #[test]
    fn pinned_frames_are_never_victims() {
        let t = full_table(4);
        for f in [0, 1, 3] {
            t.pin(FrameNumber::new(f));
        }
        let clock = ClockPolicy::new();
        for _ in 0..5 {
            let f = victim(clock.select_victim(&t));
            assert_eq!(f, FrameNumber::new(2));
            t.unpin(f);
        }
    }

    #[test]
    fn a_lap_of_pinned_frames_reports_all_pinned() {
        let t = full_table(2);
        t.pin(FrameNumber::new(0));
        t.pin(FrameNumber::new(1));
        let clock = ClockPolicy::new();
        let before = t.unpinned().epoch();
        match clock.select_victim(&t) {
            ClockOutcome::AllPinned { epoch, .. } => assert_eq!(epoch, before),
            ClockOutcome::Victim { .. } => panic!("pinned frame chosen"),
        }

        t.unpin(FrameNumber::new(1));
        assert_ne!(t.unpinned().epoch(), before);
        assert_eq!(victim(clock.select_victim(&t)), FrameNumber::new(1));
    }

    #[test]
    fn free_frames_are_skipped() {
        let t = FrameTable::new(2, Box::new(FreeListFrameAlloc::new(2)));
        let f = t.allocate_free_frame().unwrap();
        assert_eq!(f, FrameNumber::new(0));
        let clock = ClockPolicy::new();
        assert_eq!(victim(clock.select_victim(&t)), f);
        t.unpin(f);
        assert_eq!(victim(clock.select_victim(&t)), f);
    }
}
