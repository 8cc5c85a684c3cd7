//! Benchmarks for task submission and the collections under the pool

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spindle::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn pool(n: usize, admission: AdmissionPolicy) -> ThreadPool {
    let config = Config::builder()
        .num_threads(n)
        .admission(admission)
        .build()
        .unwrap();
    ThreadPool::with_config(&config).unwrap()
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_then_sync");

    for workers in [1usize, 2, 4].iter() {
        for (name, admission) in [
            ("immediate", AdmissionPolicy::Immediate),
            ("wait_for_idle", AdmissionPolicy::default()),
        ] {
            let pool = pool(*workers, admission);
            let counter = Arc::new(AtomicU64::new(0));

            group.bench_with_input(BenchmarkId::new(name, workers), workers, |b, _| {
                b.iter(|| {
                    for i in 0..256u64 {
                        let counter = counter.clone();
                        pool.execute(move || {
                            counter.fetch_add(black_box(i), Ordering::Relaxed);
                        })
                        .unwrap();
                    }
                    pool.sync().unwrap();
                });
            });

            pool.stop().unwrap();
            pool.finalize().unwrap();
        }
    }

    group.finish();
}

fn bench_wait_for_result(c: &mut Criterion) {
    let pool = pool(2, AdmissionPolicy::Immediate);
    c.bench_function("wait_for_result_round_trip", |b| {
        b.iter(|| pool.wait_for_result(|| black_box(0x10000u64)).unwrap());
    });
    pool.stop().unwrap();
    pool.finalize().unwrap();
}

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_queue");

    for size in [64usize, 1024, 16_384].iter() {
        group.bench_with_input(BenchmarkId::new("fill_drain", size), size, |b, &size| {
            b.iter(|| {
                let mut queue = FifoQueue::with_capacity(0);
                for i in 0..size {
                    queue.enqueue(i);
                }
                while let Some(v) = queue.dequeue() {
                    black_box(v);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("preallocated", size), size, |b, &size| {
            let mut queue = FifoQueue::with_capacity(size);
            b.iter(|| {
                for i in 0..size {
                    queue.enqueue(i);
                }
                while let Some(v) = queue.dequeue() {
                    black_box(v);
                }
            });
        });
    }

    group.finish();
}

fn bench_node_store_lookup(c: &mut Criterion) {
    let mut store = NodeStore::with_capacity(1024);
    for i in 0..1024u32 {
        store.reserve(i);
    }
    store.resync();

    c.bench_function("node_store_by_id_middle", |b| {
        b.iter(|| store.by_id(black_box(512)));
    });
}

criterion_group!(
    benches,
    bench_execute,
    bench_wait_for_result,
    bench_queue,
    bench_node_store_lookup
);
criterion_main!(benches);
