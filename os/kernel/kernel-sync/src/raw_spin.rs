use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Test-and-set lock behind [`SpinMutex`](crate::SpinMutex).
///
/// Unfair: a releasing thread may win the lock straight back. Good enough
/// for the frame table and address-space locks, which are held for a few
/// loads and stores at a time.
#[derive(Default)]
pub struct RawSpin {
    locked: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            // wait on a plain load so contenders don't bounce the line
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    fn raw_try_lock(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_fails_until_unlocked() {
        let raw = RawSpin::new();
        assert!(raw.raw_try_lock());
        assert!(!raw.raw_try_lock());
        unsafe { raw.raw_unlock() };
        raw.raw_lock();
        assert!(!raw.raw_try_lock());
        unsafe { raw.raw_unlock() };
    }
}
