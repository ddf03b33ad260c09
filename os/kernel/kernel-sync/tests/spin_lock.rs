use kernel_sync::{Condvar, SpinLock, SpinMutex, TicketMutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

/// Outer lock held across a wait, plus a pin count guarded by its own lock.
struct Pinned {
    outer: TicketMutex<u32>,
    pins: SpinMutex<u16>,
    unpinned: Condvar,
}

impl Pinned {
    fn new(pins: u16) -> Arc<Self> {
        Arc::new(Self {
            outer: TicketMutex::new(0),
            pins: SpinMutex::new(pins),
            unpinned: Condvar::new(),
        })
    }

    fn unpin(&self) {
        let mut pins = self.pins.lock();
        *pins -= 1;
        self.unpinned.notify_all();
    }
}

#[test]
fn wait_epoch_hands_the_outer_lock_to_the_notifier_and_back() {
    let state = Pinned::new(1);
    let mut outer = state.outer.lock();

    let epoch = {
        let pins = state.pins.lock();
        assert_eq!(*pins, 1);
        state.unpinned.epoch()
    };

    let unpinner = {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            // only gets in once the waiter has let go of the outer lock
            let mut outer = state.outer.lock();
            *outer = 7;
            state.unpin();
        })
    };

    outer = state.unpinned.wait_epoch(outer, epoch);
    assert_eq!(*outer, 7);
    assert_eq!(*state.pins.lock(), 0);
    drop(outer);
    unpinner.join().unwrap();
    assert_eq!(state.unpinned.waiters(), 0);
}

#[test]
fn unpin_between_sampling_and_waiting_is_not_lost() {
    let state = Pinned::new(1);
    let outer = state.outer.lock();
    let epoch = state.pins.with_lock(|_| state.unpinned.epoch());

    let unpinner = {
        let state = Arc::clone(&state);
        thread::spawn(move || state.unpin())
    };
    unpinner.join().unwrap();

    // the notification already happened, so this must not block
    let outer = state.unpinned.wait_epoch(outer, epoch);
    assert_eq!(*outer, 0);
    assert_eq!(*state.pins.lock(), 0);
}

#[test]
fn waiter_retries_until_every_pin_is_dropped() {
    let pins = 4;
    let state = Pinned::new(pins);
    let start = Arc::new(Barrier::new(usize::from(pins) + 1));

    let unpinners: Vec<_> = (0..pins)
        .map(|_| {
            let state = Arc::clone(&state);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                thread::yield_now();
                state.unpin();
            })
        })
        .collect();

    let mut outer = state.outer.lock();
    start.wait();
    let mut waits = 0;
    loop {
        let epoch = {
            let pins = state.pins.lock();
            if *pins == 0 {
                break;
            }
            state.unpinned.epoch()
        };
        outer = state.unpinned.wait_epoch(outer, epoch);
        waits += 1;
    }
    *outer += 1;
    drop(outer);

    for h in unpinners {
        h.join().unwrap();
    }
    assert!(waits <= usize::from(pins));
    assert_eq!(*state.outer.lock(), 1);
}

#[test]
fn spin_lock_never_exposes_a_half_written_frame() {
    let writers = 4;
    let rounds = 200;
    let frame = Arc::new(SpinLock::new([0u8; 64]));
    let start = Arc::new(Barrier::new(writers + 1));
    let stop = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (1..=writers)
        .map(|id| {
            let frame = Arc::clone(&frame);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..rounds {
                    frame.with_lock(|bytes| {
                        for b in bytes.iter_mut() {
                            *b = u8::try_from(id).unwrap();
                            thread::yield_now();
                        }
                    });
                }
            })
        })
        .collect();

    let checker = {
        let frame = Arc::clone(&frame);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let bytes = *frame.lock();
                assert!(bytes.iter().all(|&b| b == bytes[0]), "torn frame");
            }
        })
    };

    start.wait();
    for h in handles {
        h.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    checker.join().unwrap();
}

#[test]
fn try_lock_fails_while_a_guard_is_alive() {
    let l = SpinLock::new(3u8);
    let held = l.lock();
    assert!(l.try_lock().is_none());
    drop(held);
    assert_eq!(l.try_lock().map(|g| *g), Some(3));
}

#[test]
fn panicking_holder_releases_the_lock() {
    let l = SpinLock::new(Vec::<u32>::new());

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            v.push(1);
            panic!("holder died");
        });
    }));
    assert!(res.is_err());

    assert_eq!(l.with_lock(|v| v.clone()), vec![1]);
    let mut l = l;
    l.get_mut().push(2);
    assert_eq!(l.into_inner(), vec![1, 2]);
}
