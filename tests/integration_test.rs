use spindle::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn pool(n: usize) -> ThreadPool {
    let config = Config::builder()
        .num_threads(n)
        .park_timeout(Duration::from_millis(5))
        .build()
        .unwrap();
    ThreadPool::with_config(&config).unwrap()
}

#[test]
fn test_basic_lifecycle() {
    let pool = pool(4);
    assert!(pool.is_running());
    assert_eq!(pool.workers(), 4);

    pool.stop().unwrap();
    assert!(!pool.is_running());
    pool.finalize().unwrap();
    assert!(pool.is_finalized());
}

#[test]
fn test_every_task_runs_exactly_once() {
    let pool = pool(4);
    let hits: Arc<Vec<AtomicUsize>> = Arc::new((0..1000).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..1000 {
        let hits = hits.clone();
        pool.execute(move || {
            hits[i].fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.stop().unwrap();
    assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
    assert_eq!(pool.stats().tasks_executed, 1000);
    pool.finalize().unwrap();
}

#[test]
fn test_concurrent_waiters_get_their_own_results() {
    let pool = Arc::new(pool(3));

    let callers: Vec<_> = (0..8u64)
        .map(|caller| {
            let pool = pool.clone();
            thread::spawn(move || {
                (0..25u64)
                    .map(|i| {
                        let expected = caller * 1000 + i;
                        let got = pool.wait_for_result(move || expected).unwrap();
                        assert_eq!(got, expected);
                        got
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for caller in callers {
        for value in caller.join().unwrap() {
            assert!(seen.insert(value));
        }
    }
    assert_eq!(seen.len(), 200);

    pool.stop().unwrap();
    pool.finalize().unwrap();
}

#[test]
fn test_submit_handles_resolve_out_of_order() {
    let pool = pool(2);
    let slow = pool
        .submit(|| {
            thread::sleep(Duration::from_millis(20));
            "slow"
        })
        .unwrap();
    let fast = pool.submit(|| "fast").unwrap();

    assert_eq!(fast.wait().unwrap(), "fast");
    assert_eq!(slow.wait().unwrap(), "slow");

    pool.stop().unwrap();
    pool.finalize().unwrap();
}

#[test]
fn test_single_worker_preserves_submission_order() {
    let config = Config::builder()
        .num_threads(1)
        .admission(AdmissionPolicy::Immediate)
        .build()
        .unwrap();
    let pool = ThreadPool::with_config(&config).unwrap();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for i in 0..100 {
        let order = order.clone();
        pool.execute(move || order.lock().push(i)).unwrap();
    }

    pool.stop().unwrap();
    assert_eq!(*order.lock(), (0..100).collect::<Vec<_>>());
    pool.finalize().unwrap();
}

#[test]
fn test_finalize_misuse_is_reported() {
    let pool = pool(2);

    let err = pool.finalize().unwrap_err();
    assert!(matches!(err, Error::StillRunning));
    assert!(err.is_misuse());

    pool.stop().unwrap();
    pool.finalize().unwrap();
    assert!(matches!(pool.finalize(), Err(Error::AlreadyFinalized)));
    assert!(matches!(pool.execute(|| {}), Err(Error::NotRunning)));
}

#[test]
fn test_stop_is_idempotent() {
    let pool = pool(2);
    pool.execute(|| thread::sleep(Duration::from_millis(5))).unwrap();
    pool.stop().unwrap();
    pool.stop().unwrap();
    assert_eq!(pool.pending(), 0);
    pool.finalize().unwrap();
}

#[test]
fn test_panics_are_contained() {
    let pool = pool(2);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            pool.submit(move || {
                if i % 2 == 0 {
                    panic!("task {} failed", i);
                }
                i
            })
            .unwrap()
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.wait() {
            Ok(v) => {
                assert_eq!(v % 2, 1);
                ok += 1;
            }
            Err(Error::TaskPanicked(msg)) => assert!(msg.contains("failed")),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(ok, 5);

    pool.stop().unwrap();
    assert_eq!(pool.stats().tasks_panicked, 5);
    pool.finalize().unwrap();
}

#[test]
fn test_fifo_queue_standalone() {
    let mut queue = FifoQueue::with_capacity(2);
    for i in 0..5 {
        queue.enqueue(i);
    }
    queue.enqueue_inverse(-1);

    assert_eq!(queue.len(), 6);
    assert!(queue.capacity() >= 6);
    assert_eq!(queue.peek_front(), Some(&-1));
    assert_eq!(queue.dequeue_inverse(), Some(4));

    let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
    assert_eq!(drained, vec![-1, 0, 1, 2, 3]);
    assert!(queue.is_empty());
}

#[test]
fn test_global_runtime() {
    spindle::shutdown().unwrap();
    spindle::init_with_config(Config::builder().num_threads(2).build().unwrap()).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let counter = counter.clone();
        spindle::runtime::execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert_eq!(spindle::runtime::wait_for_result(|| 7).unwrap(), 7);

    spindle::shutdown().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 20);
}
