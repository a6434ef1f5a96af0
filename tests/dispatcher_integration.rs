//! Integration tests for the serial dispatcher

use apartment::{DispatchError, Dispatcher};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Poll `probe` for up to two seconds
fn wait_until(mut probe: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if probe() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_all_items_run_on_the_same_thread() {
    let dispatcher = Dispatcher::new();
    let threads = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..10 {
        let threads = threads.clone();
        dispatcher
            .send(move || threads.lock().push(thread::current().id()))
            .unwrap();
    }
    for _ in 0..10 {
        let threads = threads.clone();
        dispatcher
            .post(move || threads.lock().push(thread::current().id()))
            .unwrap();
    }

    // Fence so all posts have run
    dispatcher.send(|| {}).unwrap();

    let worker_id = dispatcher.worker_thread_id().unwrap();
    let threads = threads.lock();
    assert_eq!(threads.len(), 20);
    assert!(threads.iter().all(|id| *id == worker_id));
}

#[test]
fn test_single_submitter_fifo_order() {
    let dispatcher = Dispatcher::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in ["A", "B", "C"] {
        let order = order.clone();
        dispatcher.post(move || order.lock().push(label)).unwrap();
    }

    dispatcher.send(|| {}).unwrap();
    assert_eq!(*order.lock(), vec!["A", "B", "C"]);
}

#[test]
fn test_concurrent_submitters_keep_per_submitter_order() {
    let dispatcher = Arc::new(Dispatcher::new());
    let log: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let submitters: Vec<_> = (0..4)
        .map(|submitter| {
            let dispatcher = dispatcher.clone();
            let log = log.clone();
            thread::spawn(move || {
                for seq in 0..25 {
                    let log = log.clone();
                    dispatcher
                        .send(move || log.lock().push((submitter, seq)))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in submitters {
        handle.join().unwrap();
    }

    let log = log.lock();
    assert_eq!(log.len(), 100);

    // The worker's total order never reorders any one submitter's items
    for submitter in 0..4 {
        let seqs: Vec<usize> = log
            .iter()
            .filter(|(s, _)| *s == submitter)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(seqs, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn test_panic_payload_crosses_to_submitter_intact() {
    let dispatcher = Dispatcher::new();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatcher
            .send(|| panic!("payload {}", 7))
            .unwrap();
    }));

    let payload = result.unwrap_err();
    assert_eq!(payload.downcast_ref::<String>(), Some(&"payload 7".to_string()));
}

#[test]
fn test_panic_within_timeout_is_still_reraised() {
    let dispatcher = Dispatcher::new();

    // Generous budget, so the item completes (and panics) well before the
    // deadline; the captured failure surfaces on the submitter
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatcher
            .send_timeout(|| panic!("late failure"), Duration::from_secs(5))
            .unwrap();
    }));

    assert!(result.is_err());
}

#[test]
fn test_post_panic_terminates_worker_and_is_detected() {
    let dispatcher = Dispatcher::new();

    dispatcher.post(|| panic!("fire-and-forget failure")).unwrap();

    // Later dispatches must observe that nothing is servicing the queue.
    // Timed probes keep the test from blocking on an item nobody will run.
    let detected = wait_until(|| {
        matches!(
            dispatcher.send_timeout(|| {}, Duration::from_millis(20)),
            Err(DispatchError::WorkerGone)
        )
    });

    assert!(detected);
    assert!(!dispatcher.is_running());
    assert_eq!(dispatcher.post(|| {}), Err(DispatchError::WorkerGone));
}

#[test]
fn test_reentrant_sends_nest_without_deadlock() {
    let dispatcher = Arc::new(Dispatcher::new());
    let depth_reached = Arc::new(AtomicUsize::new(0));

    {
        let dispatcher = dispatcher.clone();
        let depth_reached = depth_reached.clone();
        dispatcher
            .clone()
            .send(move || {
                depth_reached.fetch_add(1, Ordering::SeqCst);
                let inner_dispatcher = dispatcher.clone();
                let inner_depth = depth_reached.clone();
                dispatcher
                    .send(move || {
                        inner_depth.fetch_add(1, Ordering::SeqCst);
                        inner_dispatcher
                            .send(move || {
                                inner_depth_marker();
                            })
                            .unwrap();
                    })
                    .unwrap();
            })
            .unwrap();
    }

    assert_eq!(depth_reached.load(Ordering::SeqCst), 2);
}

fn inner_depth_marker() {}

#[test]
fn test_shutdown_joins_worker() {
    let mut dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let counter = counter.clone();
        dispatcher
            .send(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    dispatcher.shutdown();

    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert!(!dispatcher.is_running());
}

#[test]
fn test_drop_without_shutdown_stops_worker() {
    let counter = Arc::new(AtomicUsize::new(0));

    {
        let dispatcher = Dispatcher::new();
        let counter = counter.clone();
        dispatcher
            .send(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        // Dispatcher dropped here; Drop performs the shutdown
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_many_submitters_stress() {
    let dispatcher = Arc::new(Dispatcher::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let counter = counter.clone();
                    if i % 2 == 0 {
                        dispatcher
                            .send(move || {
                                counter.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    } else {
                        dispatcher
                            .post(move || {
                                counter.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in submitters {
        handle.join().unwrap();
    }

    // Fence for the fire-and-forget half
    dispatcher.send(|| {}).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 400);
}
