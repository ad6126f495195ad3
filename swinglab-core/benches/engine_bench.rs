//! Criterion benchmarks for SwingLab hot paths.
//!
//! Benchmarks:
//! 1. Indicator series over one ticker
//! 2. Feature engine over a multi-ticker universe (parallel per ticker)
//! 3. Daily backtest loop over precomputed features

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use swinglab_core::domain::Bar;
use swinglab_core::engine::{run_backtest, EngineConfig};
use swinglab_core::features::FeatureEngine;
use swinglab_core::indicators::{Adx, Atr, Bollinger, Ema, Indicator, Mfi, Rsi, Sma};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(ticker: &str, n: usize, phase: f64) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let trend = 1.0 + i as f64 * 0.0008;
            let close = (100.0 + (i as f64 * 0.07 + phase).sin() * 12.0) * trend;
            Bar::ohlcv(
                ticker,
                base_date + chrono::Duration::days(i as i64),
                close - 0.4,
                close + 1.6,
                close - 1.6,
                close,
                800_000.0 + (i % 37) as f64 * 40_000.0,
            )
        })
        .collect()
}

fn make_universe(n: usize, num_tickers: usize) -> Vec<Bar> {
    let mut bars = make_bars("VNINDEX", n, 0.0);
    for t in 0..num_tickers {
        bars.extend(make_bars(&format!("T{t:03}"), n, t as f64 * 0.37));
    }
    bars
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");

    for &bar_count in &[252, 1260, 2520] {
        let bars = make_bars("BENCH", bar_count, 0.0);
        let stack: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(50)),
            Box::new(Sma::new(200)),
            Box::new(Ema::new(26)),
            Box::new(Rsi::new(14)),
            Box::new(Atr::new(14)),
            Box::new(Adx::new(14)),
            Box::new(Bollinger::upper(20, 2.0)),
            Box::new(Mfi::new(14)),
        ];
        group.bench_with_input(
            BenchmarkId::new("feature_stack", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    stack
                        .iter()
                        .map(|ind| ind.compute(black_box(&bars)))
                        .collect::<Vec<_>>()
                });
            },
        );
    }

    group.finish();
}

// ── 2. Feature engine ────────────────────────────────────────────────

fn bench_feature_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_engine");
    group.sample_size(20);

    for &tickers in &[10, 50] {
        let bars = make_universe(1260, tickers);
        group.bench_with_input(BenchmarkId::new("1260_bars", tickers), &tickers, |b, _| {
            b.iter(|| FeatureEngine::new().compute(black_box(&bars), "VNINDEX"));
        });
    }

    group.finish();
}

// ── 3. Backtest loop ─────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_loop");
    group.sample_size(20);

    for &tickers in &[10, 50] {
        let bars = make_universe(1260, tickers);
        let Ok(features) = FeatureEngine::new().compute(&bars, "VNINDEX") else {
            continue;
        };
        let config = EngineConfig::default();
        group.bench_with_input(BenchmarkId::new("1260_bars", tickers), &tickers, |b, _| {
            b.iter(|| run_backtest(black_box(config.clone()), black_box(&features), None, None));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_indicators, bench_feature_engine, bench_backtest);
criterion_main!(benches);
