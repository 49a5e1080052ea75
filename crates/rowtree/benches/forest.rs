//! Throughput benchmarks for the core forest operations.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rowtree::RowForest;

const ROWS: usize = 10_000;

fn build(rows: usize) -> RowForest {
    let mut forest = RowForest::new();
    let top = forest.top();
    let mut last = None;
    for i in 0..rows {
        let height = (i % 29 + 1) as i32;
        last = Some(forest.insert_after(top, last, height, true));
    }
    forest
}

fn bench_sequential_insert(c: &mut Criterion) {
    c.bench_function("insert_10k_sequential", |b| {
        b.iter(|| build(ROWS));
    });
}

fn bench_find_offset(c: &mut Criterion) {
    let forest = build(ROWS);
    let top = forest.top();
    let total = forest.offset(forest.root(top));
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut offsets: Vec<i32> = (0..1024).map(|_| rng.gen_range(0..total)).collect();
    offsets.shuffle(&mut rng);

    c.bench_function("find_offset_10k_rows", |b| {
        b.iter(|| {
            let mut hits = 0_u32;
            for &offset in &offsets {
                if forest.find_offset(top, offset).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });
}

fn bench_remove_front_to_back(c: &mut Criterion) {
    c.bench_function("remove_1k_front_to_back", |b| {
        b.iter_batched(
            || {
                let mut forest = RowForest::new();
                let top = forest.top();
                let mut last = None;
                let mut rows = Vec::with_capacity(1000);
                for i in 0..1000 {
                    let node = forest.insert_after(top, last, i % 17 + 1, true);
                    rows.push(node);
                    last = Some(node);
                }
                (forest, rows)
            },
            // Front-to-back removal always takes the leftmost row, which
            // never has two subtree children, so the stored ids stay live.
            |(mut forest, rows)| {
                let top = forest.top();
                for node in rows {
                    forest.remove_node(top, node);
                }
                forest
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_sequential_insert,
    bench_find_offset,
    bench_remove_front_to_back
);
criterion_main!(benches);
