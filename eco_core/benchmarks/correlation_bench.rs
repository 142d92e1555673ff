use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use eco_core::{AnalysisConfig, EcoEngine, ScenarioConfig, ScenarioParameters, Series, SeriesStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SAMPLES: i64 = 240;

/// Random-walk series over a shared monthly index, seeded so every run sees the same data.
fn synthetic_store(series: usize) -> SeriesStore {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let mut store = SeriesStore::new();
    for index in 0..series {
        let mut level: f64 = rng.gen_range(0.0..100.0);
        let points = (0..SAMPLES)
            .map(|t| {
                level += rng.gen_range(-1.5..1.5);
                (t, level)
            })
            .collect();
        store
            .add(format!("series_{index:03}"), Series::new("unit", points))
            .expect("synthetic series are valid");
    }
    store
}

fn engine_with_threshold(threshold: usize) -> EcoEngine {
    let analysis = (*AnalysisConfig::builtin())
        .clone()
        .with_parallel_pair_threshold(threshold);
    EcoEngine::new(Arc::new(analysis), ScenarioConfig::builtin())
}

fn bench_correlations(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlations");
    let serial = engine_with_threshold(usize::MAX);
    let parallel = engine_with_threshold(1);

    for size in [8usize, 32, 96] {
        let store = synthetic_store(size);
        group.bench_with_input(BenchmarkId::new("serial", size), &store, |b, store| {
            b.iter(|| serial.analyze_correlations(store, None).expect("analysis"))
        });
        group.bench_with_input(BenchmarkId::new("parallel", size), &store, |b, store| {
            b.iter(|| parallel.analyze_correlations(store, None).expect("analysis"))
        });
    }

    group.finish();
}

fn bench_scenario(c: &mut Criterion) {
    let engine = EcoEngine::builtin();
    c.bench_function("scenario/default", |b| {
        b.iter(|| engine.run_scenario(ScenarioParameters::default()))
    });
}

criterion_group!(correlation_benches, bench_correlations, bench_scenario);
criterion_main!(correlation_benches);
