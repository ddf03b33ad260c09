use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// FIFO ticket lock behind [`TicketMutex`](crate::TicketMutex).
///
/// Threads are served in the order they arrived. The VM lock and the swap
/// store use it, since a fault may hold them across a whole page of I/O
/// and a plain spin lock would let one faulting thread starve the rest.
#[derive(Default)]
pub struct RawTicket {
    next_ticket: AtomicUsize,
    now_serving: AtomicUsize,
}

impl RawTicket {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_ticket: AtomicUsize::new(0),
            now_serving: AtomicUsize::new(0),
        }
    }
}

impl RawLock for RawTicket {
    fn raw_lock(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        while self.now_serving.load(Ordering::Acquire) != ticket {
            spin_loop();
        }
    }

    fn raw_try_lock(&self) -> bool {
        // only succeeds with nobody holding or queued
        let serving = self.now_serving.load(Ordering::Relaxed);
        self.next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

impl RawUnlock for RawTicket {
    unsafe fn raw_unlock(&self) {
        let serving = self.now_serving.load(Ordering::Relaxed);
        self.now_serving
            .store(serving.wrapping_add(1), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_fails_while_a_ticket_is_outstanding() {
        let raw = RawTicket::new();
        raw.raw_lock();
        assert!(!raw.raw_try_lock());
        unsafe { raw.raw_unlock() };

        assert!(raw.raw_try_lock());
        unsafe { raw.raw_unlock() };
        assert_eq!(raw.next_ticket.load(Ordering::Relaxed), 2);
        assert_eq!(raw.now_serving.load(Ordering::Relaxed), 2);
    }
}
