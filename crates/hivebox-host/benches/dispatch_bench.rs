//! Criterion benchmarks for the dispatch hot path: registry lookups (run for
//! every captured event) and job submission into the worker pool.
//!
//! Run with:
//! ```bash
//! cargo bench --package hivebox-host --bench dispatch_bench
//! ```

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use hivebox_api::ClientBridge;
use hivebox_host::application::client_registry::ClientRegistry;
use hivebox_host::infrastructure::task_pool::{DispatchPool, OverflowPolicy, PoolConfig};

// ── Fixture builders ──────────────────────────────────────────────────────────

/// Creates a registry holding `n` clients named `client-0` .. `client-{n-1}`.
fn build_registry_with_n_clients(n: usize) -> ClientRegistry {
    let registry = ClientRegistry::new();
    for i in 0..n {
        registry.add(Arc::new(ClientBridge::new(
            format!("client-{i}"),
            Box::new(|_| {}),
            Box::new(|_| {}),
        )));
    }
    registry
}

// ── Benchmarks: registry lookup ───────────────────────────────────────────────

/// Benchmarks [`ClientRegistry::get_by_name`] for best and worst scan positions.
fn bench_get_by_name(c: &mut Criterion) {
    let registry = build_registry_with_n_clients(8);
    let mut group = c.benchmark_group("get_by_name");

    group.bench_function("first_of_8", |b| {
        b.iter(|| registry.get_by_name(black_box("client-0")))
    });

    // Last entry is the worst case for the snapshot scan.
    group.bench_function("last_of_8", |b| {
        b.iter(|| registry.get_by_name(black_box("client-7")))
    });

    group.bench_function("miss_of_8", |b| {
        b.iter(|| registry.get_by_name(black_box("no-such-client")))
    });

    group.finish();
}

/// Benchmarks lookup scaling with registry size (one lookup happens per
/// captured input event).
fn bench_get_by_name_scaling(c: &mut Criterion) {
    let client_counts = [1usize, 4, 16, 64];
    let mut group = c.benchmark_group("get_by_name_scaling");

    for &count in &client_counts {
        let registry = build_registry_with_n_clients(count);
        let last = format!("client-{}", count - 1);

        group.bench_with_input(BenchmarkId::new("clients", count), &last, |b, name| {
            b.iter(|| registry.get_by_name(black_box(name)))
        });
    }

    group.finish();
}

/// Benchmarks [`ClientRegistry::snapshot`], taken once per dispatch round.
fn bench_snapshot(c: &mut Criterion) {
    let registry = build_registry_with_n_clients(16);
    let mut group = c.benchmark_group("snapshot");

    group.bench_function("16_clients", |b| b.iter(|| registry.snapshot()));

    group.finish();
}

// ── Benchmarks: pool submission ───────────────────────────────────────────────

/// Benchmarks the capture-thread cost of submitting a job.  The job body is
/// trivial so the measurement isolates queue overhead, which is the part the
/// capture thread actually pays.
fn bench_pool_submit(c: &mut Criterion) {
    let pool = DispatchPool::new(PoolConfig {
        workers: 2,
        queue_capacity: 4096,
        overflow: OverflowPolicy::DropOldest,
    });
    let mut group = c.benchmark_group("pool_submit");

    group.bench_function("noop_job", |b| {
        b.iter(|| pool.submit(Box::new(|| black_box(()))));
    });

    group.finish();
    pool.wait_idle(Duration::from_secs(10));
}

criterion_group!(
    benches,
    bench_get_by_name,
    bench_get_by_name_scaling,
    bench_snapshot,
    bench_pool_submit,
);
criterion_main!(benches);
