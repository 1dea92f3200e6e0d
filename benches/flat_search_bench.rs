//! Benchmarks for flat index search and near-duplicate suppression

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use exemplar::store::search::select_distinct;
use exemplar::store::similarity::ratio;
use exemplar::{FlatIndex, Record, VectorDimension};
use std::hint::black_box;

const DIMENSION: usize = 384;

/// Deterministic pseudo-random vectors (xorshift), no RNG crate needed.
fn vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed.max(1);
    (0..count)
        .map(|_| {
            (0..DIMENSION)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state % 2000) as f32 / 1000.0 - 1.0
                })
                .collect()
        })
        .collect()
}

fn build_index(count: usize) -> FlatIndex {
    let mut index = FlatIndex::new(VectorDimension::new(DIMENSION).unwrap());
    index.add(&vectors(count, 42)).unwrap();
    index
}

fn bench_flat_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_search");
    let query = vectors(1, 7).remove(0);

    for count in [1_000, 10_000] {
        let index = build_index(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &index, |b, index| {
            b.iter(|| index.search(black_box(&query), black_box(15)).unwrap());
        });
    }
    group.finish();
}

fn bench_select_distinct(c: &mut Criterion) {
    let records: Vec<Record> = (0..15)
        .map(|i| {
            Record::from_raw(format!(
                "a lighthouse on a cliff at dusk, variation {i}, oil on canvas"
            ))
        })
        .collect();
    let candidates: Vec<(&Record, f32)> = records
        .iter()
        .enumerate()
        .map(|(i, record)| (record, i as f32))
        .collect();

    c.bench_function("select_distinct_15_candidates", |b| {
        b.iter(|| select_distinct(black_box(candidates.iter().copied()), 5, 0.6));
    });

    c.bench_function("ratio_prompt_pair", |b| {
        b.iter(|| {
            ratio(
                black_box("A cat in space, cinematic lighting, 8k"),
                black_box("A cat floating in space, dramatic lighting"),
            )
        });
    });
}

criterion_group!(benches, bench_flat_search, bench_select_distinct);
criterion_main!(benches);
