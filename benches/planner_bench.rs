use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand::rngs::StdRng;

use memplan::memory::{
    greedy_by_longest_and_size, greedy_by_size, greedy_by_size_with_first_gap, linear_scan,
    naive, validate_allocations, LiveRange, MemAllocation, DEFAULT_ALIGNMENT,
};

/// Synthetic workload shaped like an inference schedule: mostly short
/// lifetimes with a few long-lived activations, sizes in whole alignment
/// units.
fn synthetic_items(count: usize, seed: u64) -> Vec<(LiveRange, i64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let begin = rng.gen_range(0..count as i64 * 2);
            let len = if rng.gen_bool(0.1) {
                rng.gen_range(50..200)
            } else {
                rng.gen_range(0..10)
            };
            let size = rng.gen_range(1..64) * DEFAULT_ALIGNMENT;
            (LiveRange::new(begin, begin + len), size)
        })
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    type PackFn = fn(&[(LiveRange, i64)]) -> Vec<MemAllocation>;
    let packers: [(&str, PackFn); 5] = [
        ("naive", naive),
        ("linear_scan", linear_scan),
        ("greedy_by_size", greedy_by_size),
        ("greedy_by_size_first_gap", greedy_by_size_with_first_gap),
        ("greedy_by_longest_and_size", greedy_by_longest_and_size),
    ];

    let mut group = c.benchmark_group("packing");
    for count in [64usize, 256, 1024] {
        let items = synthetic_items(count, 0x5eed);
        for (name, pack) in packers {
            group.bench_with_input(
                BenchmarkId::new(name, count),
                &items,
                |b, items| b.iter(|| pack(items)),
            );
        }
    }
    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let items = synthetic_items(1024, 0x5eed);
    let allocations = greedy_by_size(&items);
    c.bench_function("validate_1024", |b| {
        b.iter(|| validate_allocations(&allocations))
    });
}

criterion_group!(benches, bench_strategies, bench_validation);
criterion_main!(benches);
