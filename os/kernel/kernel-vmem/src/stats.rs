use core::sync::atomic::{AtomicU64, Ordering};

/// Event counters of the memory manager.
#[derive(Default)]
pub struct VmStats {
    page_faults: AtomicU64,
    free_frame_hits: AtomicU64,
    evictions: AtomicU64,
    swap_outs: AtomicU64,
    swap_ins: AtomicU64,
    image_loads: AtomicU64,
    zero_fills: AtomicU64,
    pin_waits: AtomicU64,
}

/// Point-in-time copy of [`VmStats`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct VmStatsSnapshot {
    /// Faults on pages that were not resident.
    pub page_faults: u64,
    /// Faults served from the free frame pool.
    pub free_frame_hits: u64,
    /// Frames taken from another page by the clock.
    pub evictions: u64,
    pub swap_outs: u64,
    pub swap_ins: u64,
    /// Pages filled from an executable section.
    pub image_loads: u64,
    pub zero_fills: u64,
    /// Times a fault found every frame pinned and had to wait.
    pub pin_waits: u64,
}

macro_rules! counters {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[inline]
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl VmStats {
    counters! {
        count_fault => page_faults,
        count_free_frame_hit => free_frame_hits,
        count_eviction => evictions,
        count_swap_out => swap_outs,
        count_swap_in => swap_ins,
        count_image_load => image_loads,
        count_zero_fill => zero_fills,
        count_pin_wait => pin_waits,
    }

    pub fn snapshot(&self) -> VmStatsSnapshot {
        VmStatsSnapshot {
            page_faults: self.page_faults.load(Ordering::Relaxed),
            free_frame_hits: self.free_frame_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            swap_outs: self.swap_outs.load(Ordering::Relaxed),
            swap_ins: self.swap_ins.load(Ordering::Relaxed),
            image_loads: self.image_loads.load(Ordering::Relaxed),
            zero_fills: self.zero_fills.load(Ordering::Relaxed),
            pin_waits: self.pin_waits.load(Ordering::Relaxed),
        }
    }
}
