use crate::{MutexGuard, RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A spinning condition variable paired with a [`Mutex`](crate::Mutex).
///
/// Every notification bumps a sequence counter. A waiter samples the counter
/// while it still holds the lock, releases the lock, and spins until the
/// counter moves. A notifier that changes the guarded state under the same
/// lock therefore cannot be missed.
///
/// Wakeups may be spurious and waiters are not woken in any particular order,
/// so callers always re-test their predicate (see [`Condvar::wait_while`]).
///
/// # Example
/// ```
/// use kernel_sync::{Condvar, SpinMutex};
///
/// let ready = SpinMutex::new(true);
/// let cv = Condvar::new();
/// let g = cv.wait_while(ready.lock(), |r| !*r);
/// assert!(*g);
/// ```
pub struct Condvar {
    seq: AtomicU32,
    waiters: AtomicUsize,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Release `guard`, wait for a notification, and re-acquire the lock.
    pub fn wait<'a, T, R>(&self, guard: MutexGuard<'a, T, R>) -> MutexGuard<'a, T, R>
    where
        R: RawLock + RawUnlock,
    {
        let seen = self.epoch();
        self.wait_epoch(guard, seen)
    }

    /// The current notification count.
    ///
    /// Sample it under the lock that guards the awaited state, then pass it
    /// to [`Condvar::wait_epoch`]. This lets the caller decide to wait under
    /// one lock and block while holding another.
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    /// Release `guard` and block until a notification newer than `seen`
    /// arrives, then re-acquire the lock.
    ///
    /// Returns at once if one already arrived.
    pub fn wait_epoch<'a, T, R>(
        &self,
        guard: MutexGuard<'a, T, R>,
        seen: u32,
    ) -> MutexGuard<'a, T, R>
    where
        R: RawLock + RawUnlock,
    {
        let mutex = guard.m;
        self.waiters.fetch_add(1, Ordering::Relaxed);
        drop(guard);

        while self.seq.load(Ordering::Acquire) == seen {
            spin_loop();
        }

        self.waiters.fetch_sub(1, Ordering::Relaxed);
        mutex.lock()
    }

    /// Wait until `condition` returns `false`.
    pub fn wait_while<'a, T, R>(
        &self,
        mut guard: MutexGuard<'a, T, R>,
        mut condition: impl FnMut(&mut T) -> bool,
    ) -> MutexGuard<'a, T, R>
    where
        R: RawLock + RawUnlock,
    {
        while condition(&mut guard) {
            guard = self.wait(guard);
        }
        guard
    }

    /// Wake at least one waiter.
    ///
    /// All spinning waiters observe the same counter, so this is the same as
    /// [`Condvar::notify_all`]; callers must not rely on waking exactly one.
    #[inline]
    pub fn notify_one(&self) {
        self.notify_all();
    }

    #[inline]
    pub fn notify_all(&self) {
        self.seq.fetch_add(1, Ordering::Release);
    }

    /// Number of threads currently blocked in [`Condvar::wait`].
    #[inline]
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}
