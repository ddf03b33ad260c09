use kernel_sync::{Condvar, SpinMutex, SyncOnceCell, TicketMutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn ticket_mutex_counts_exactly() {
    let threads = 6;
    let iters = 2_000;

    let m = Arc::new(TicketMutex::new(0usize));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let m = Arc::clone(&m);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    *m.lock() += 1;
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*m.lock(), threads * iters);
}

#[test]
fn spin_mutex_try_lock_fails_while_held() {
    let m = SpinMutex::new(5u8);
    let g = m.lock();
    assert!(m.try_lock().is_none());
    drop(g);
    assert_eq!(m.with_lock(|v| *v), 5);
    assert_eq!(m.into_inner(), 5);
}

#[test]
fn wait_while_returns_immediately_when_predicate_is_false() {
    let m = SpinMutex::new(1u32);
    let cv = Condvar::new();
    let g = cv.wait_while(m.lock(), |v| *v == 0);
    assert_eq!(*g, 1);
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn waiter_wakes_after_notify() {
    let state = Arc::new((SpinMutex::new(false), Condvar::new()));
    let woke = Arc::new(AtomicBool::new(false));

    let waiter = {
        let state = Arc::clone(&state);
        let woke = Arc::clone(&woke);
        thread::spawn(move || {
            let (m, cv) = &*state;
            let g = cv.wait_while(m.lock(), |ready| !*ready);
            assert!(*g);
            woke.store(true, Ordering::SeqCst);
        })
    };

    // give the waiter time to block
    while state.1.waiters() == 0 {
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(10));
    assert!(!woke.load(Ordering::SeqCst));

    {
        let (m, cv) = &*state;
        *m.lock() = true;
        cv.notify_all();
    }

    waiter.join().unwrap();
    assert!(woke.load(Ordering::SeqCst));
}

#[test]
fn all_waiters_wake_on_notify_all() {
    let threads = 4;
    let state = Arc::new((TicketMutex::new(0u32), Condvar::new()));
    let done = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let (m, cv) = &*state;
                let _g = cv.wait_while(m.lock(), |v| *v == 0);
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(10));
    {
        let (m, cv) = &*state;
        *m.lock() = 1;
        cv.notify_one();
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(done.load(Ordering::SeqCst), threads);
}

#[test]
fn once_cell_set_and_get_or_init() {
    let cell = SyncOnceCell::new();
    assert!(cell.get().is_none());
    assert_eq!(cell.set(String::from("first")), Ok(()));
    assert_eq!(cell.set(String::from("second")), Err(String::from("second")));
    assert_eq!(cell.get_or_init(|| String::from("third")), "first");
}

#[test]
fn wait_epoch_returns_at_once_for_stale_epoch() {
    let m = TicketMutex::new(());
    let cv = Condvar::new();
    let seen = cv.epoch();
    cv.notify_all();
    let _g = cv.wait_epoch(m.lock(), seen);
    assert_eq!(cv.waiters(), 0);
}
