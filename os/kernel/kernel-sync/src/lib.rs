//! # Kernel synchronization primitives
//!
//! Lock types shared by the memory manager and its collaborators. Everything
//! here spins; there is no scheduler underneath to park a thread on.
//!
//! | Type | Use |
//! |------|-----|
//! | [`SpinLock`] | Short critical sections over a single value. |
//! | [`SpinMutex`] | [`Mutex`] over a test-and-set lock. |
//! | [`TicketMutex`] | [`Mutex`] over a FIFO ticket lock, for long-held locks with many waiters. |
//! | [`Condvar`] | Wait for a predicate protected by a [`Mutex`] to change. |
//! | [`SyncOnceCell`] | One-time initialization of global state. |

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod condvar;
mod mutex;
mod raw_spin;
mod raw_ticket;
mod spin_lock;
mod sync_once_cell;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use raw_ticket::RawTicket;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;

pub type SpinMutex<T> = Mutex<T, RawSpin>;
pub type TicketMutex<T> = Mutex<T, RawTicket>;
pub type SpinMutexGuard<'a, T> = MutexGuard<'a, T, RawSpin>;
pub type TicketMutexGuard<'a, T> = MutexGuard<'a, T, RawTicket>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T> TicketMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawTicket::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// Release a lock previously taken with [`RawLock::raw_lock`].
    ///
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
