//! Benchmarks for indicator implementations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trading_core::types::Bar;
use trading_indicators::{GaussianBands, TrendLevels};

fn generate_test_bars(size: usize) -> Vec<Bar> {
    (0..size)
        .map(|i| {
            let close = 2000.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar::new(i as i64 * 300_000, close, close + 1.5, close - 1.5, close, 100.0)
        })
        .collect()
}

fn benchmark_trend_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("TrendLevels");

    for size in [200, 1000, 10000].iter() {
        let bars = generate_test_bars(*size);

        group.bench_with_input(BenchmarkId::new("length_30", size), &bars, |b, bars| {
            let trend = TrendLevels::new(30);
            b.iter(|| trend.calculate(black_box(bars)))
        });
    }

    group.finish();
}

fn benchmark_gaussian_bands(c: &mut Criterion) {
    let mut group = c.benchmark_group("GaussianBands");

    for size in [200, 1000, 10000].iter() {
        let bars = generate_test_bars(*size);

        group.bench_with_input(BenchmarkId::new("length_20", size), &bars, |b, bars| {
            let bands = GaussianBands::new(20, 2.0);
            b.iter(|| bands.calculate(black_box(bars)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_trend_levels, benchmark_gaussian_bands);
criterion_main!(benches);
