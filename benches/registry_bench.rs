//! Dispatch cost of the callback registry.
//!
//! Dispatch runs in interrupt context, so its latency bounds how quickly a
//! hat event reaches the application.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench registry_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hatline_events::CallbackRegistry;
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn filled_registry(callbacks: usize) -> CallbackRegistry {
    let registry = CallbackRegistry::new("bench").unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..callbacks {
        let hits = Arc::clone(&hits);
        registry
            .add_fn(move || {
                hits.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
    }
    registry
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for callbacks in [1usize, 4, 16, 64] {
        let registry = filled_registry(callbacks);
        group.throughput(Throughput::Elements(callbacks as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(callbacks),
            &registry,
            |b, registry| {
                b.iter(|| black_box(registry.dispatch().unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_add_remove(c: &mut Criterion) {
    let registry = filled_registry(16);

    c.bench_function("add_remove_tail", |b| {
        b.iter(|| {
            let id = registry.add_fn(|| {}).unwrap();
            registry.remove(black_box(id)).unwrap();
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_add_remove);
criterion_main!(benches);
