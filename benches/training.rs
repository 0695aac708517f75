use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flowcast::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_series(n_rows: usize) -> FlowSeries {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let timestamps = (0..n_rows).map(|i| start + Duration::days(i as i64)).collect();
    let values = (0..n_rows)
        .map(|i| {
            let season = (2.0 * std::f64::consts::PI * i as f64 / 365.25).sin();
            150.0 + 80.0 * season + rng.gen::<f64>() * 10.0
        })
        .collect();
    FlowSeries::new("bench", "flow", timestamps, values)
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");

    for n_rows in [1_000, 5_000, 20_000].iter() {
        let series = create_series(*n_rows);
        group.bench_with_input(BenchmarkId::new("build", n_rows), &series, |b, series| {
            b.iter(|| FeatureBuilder::default().build(black_box(series)).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1_000, 5_000].iter() {
        let table = FeatureBuilder::default().build(&create_series(*n_rows)).unwrap();
        let split = TemporalSplitter::default().split(&table).unwrap();

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &split.train, |b, train| {
            b.iter(|| {
                let params = ForestParams::default().with_n_estimators(50);
                Trainer::new(params).fit_table(black_box(train)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let table = FeatureBuilder::default().build(&create_series(5_000)).unwrap();
    let split = TemporalSplitter::default().split(&table).unwrap();
    let model = Trainer::new(ForestParams::default().with_n_estimators(50))
        .fit_table(&split.train)
        .unwrap();

    group.bench_function("evaluate", |b| {
        b.iter(|| Evaluator::new().evaluate_table(&model, black_box(&split.test)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_features, bench_training, bench_prediction);
criterion_main!(benches);
