//! Criterion benchmarks for CrossLab hot paths.
//!
//! 1. Indicator pipeline (EMA pair, RSI, ATR)
//! 2. Execution simulator bar loop
//! 3. Pipeline + simulator, the per-candidate cost of a parameter search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use crosslab_core::components::indicator::IndicatorPipeline;
use crosslab_core::domain::Bar;
use crosslab_core::engine::{EngineConfig, ExecutionSimulator};
use crosslab_core::indicators::StandardPipeline;
use crosslab_core::strategy::StrategyParams;

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                close + 1.5,
                open.min(close) - 1.5,
                close,
                1_000_000.0,
            )
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let params = StrategyParams::default();
    let mut group = c.benchmark_group("indicator_pipeline");
    for n in [500, 2_500, 10_000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
            b.iter(|| StandardPipeline.compute(black_box(bars), &params))
        });
    }
    group.finish();
}

fn bench_simulator(c: &mut Criterion) {
    let params = StrategyParams {
        rsi_oversold: 55.0,
        rsi_overbought: 45.0,
        ..StrategyParams::default()
    };
    let sim = ExecutionSimulator::from_params(EngineConfig::default(), &params);
    let mut group = c.benchmark_group("simulator");
    for n in [500, 2_500, 10_000] {
        let bars = make_bars(n);
        let indicators = StandardPipeline.compute(&bars, &params);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
            b.iter(|| sim.run(black_box(bars), black_box(&indicators)))
        });
    }
    group.finish();
}

fn bench_candidate(c: &mut Criterion) {
    let bars = make_bars(2_500);
    let params = StrategyParams::default();
    let sim = ExecutionSimulator::from_params(EngineConfig::default(), &params);
    c.bench_function("candidate_2500_bars", |b| {
        b.iter(|| {
            let indicators = StandardPipeline.compute(black_box(&bars), &params);
            sim.run(&bars, &indicators)
        })
    });
}

criterion_group!(benches, bench_pipeline, bench_simulator, bench_candidate);
criterion_main!(benches);
