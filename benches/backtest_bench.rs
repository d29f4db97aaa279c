//! Performance benchmarks for the backtest and optimization core.
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vela::{
    compute_metrics, optimize, simulate, AssetReturnsMatrix, BacktestConfig, Objective,
    OptimizerConfig, PriceSeries, Signal,
};

/// Generate synthetic close prices for benchmarking.
fn generate_prices(count: usize) -> PriceSeries {
    let mut price = 100.0;
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let noise = ((i as f64 * 0.7).sin() * 2.0 + (i as f64 * 1.3).cos()) * 0.5;
            price += 0.001 * price + noise;
            price = price.max(50.0);
            price
        })
        .collect();
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    PriceSeries::from_closes(start, &closes).unwrap()
}

fn generate_signals(count: usize) -> Vec<Signal> {
    (0..count)
        .map(|i| {
            if (i / 15) % 2 == 0 {
                Signal::Long
            } else {
                Signal::Short
            }
        })
        .collect()
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    for size in [252, 1000, 5000] {
        let prices = generate_prices(size);
        let signals = generate_signals(size);
        let config = BacktestConfig::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| simulate(black_box(&prices), black_box(&signals), &config))
        });
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let returns: Vec<f64> = (0..5000)
        .map(|i| 0.0005 + 0.01 * ((i as f64) * 0.9).sin())
        .collect();
    c.bench_function("compute_metrics_5000", |b| {
        b.iter(|| compute_metrics(black_box(&returns), 0.01, 252.0))
    });
}

fn bench_optimize(c: &mut Criterion) {
    let mut matrix = AssetReturnsMatrix::new();
    for asset in 0..5 {
        let returns: Vec<f64> = (0..252)
            .map(|i| 0.0005 * (asset + 1) as f64 + 0.01 * ((i as f64) * (0.7 + asset as f64)).sin())
            .collect();
        matrix.insert(format!("ASSET{asset}"), returns);
    }
    let config = OptimizerConfig::default();

    let mut group = c.benchmark_group("optimize");
    group.bench_function("min_variance_5_assets", |b| {
        b.iter(|| optimize(black_box(&matrix), Objective::MinVariance, &config))
    });
    group.bench_function("max_sharpe_5_assets", |b| {
        b.iter(|| optimize(black_box(&matrix), Objective::MaxSharpe, &config))
    });
    group.finish();
}

criterion_group!(benches, bench_simulate, bench_metrics, bench_optimize);
criterion_main!(benches);
