//! Criterion benchmarks for the runner layer.
//!
//! Run with: `cargo bench -p crosslab-runner`
//!
//! - Metrics over an equity curve
//! - Parameter search, parallel vs sequential
//! - Walk-forward over a small grid

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use crosslab_core::domain::Bar;
use crosslab_core::engine::EngineConfig;
use crosslab_core::strategy::StrategyParams;
use crosslab_runner::{
    BacktestRunner, ConstraintSpec, ParamAxis, ParamGrid, ParameterSearch, PerformanceMetrics,
    WalkForwardEvaluator,
};

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.07).sin() * 12.0 + i as f64 * 0.01;
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

fn runner() -> BacktestRunner {
    let params = StrategyParams {
        rsi_oversold: 60.0,
        rsi_overbought: 40.0,
        ..StrategyParams::default()
    };
    BacktestRunner::new(EngineConfig::default(), params)
}

fn small_grid() -> ParamGrid {
    ParamGrid::new(vec![
        ParamAxis::int_range("ema_short", 5, 25, 5),
        ParamAxis::int_range("ema_long", 30, 90, 20),
        ParamAxis::list("stop_multiple", vec![1.5, 2.0, 3.0]),
    ])
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    for n in [1_000, 10_000] {
        let equity: Vec<f64> = (0..n)
            .map(|i| 10_000.0 + (i as f64 * 0.05).sin() * 500.0 + i as f64)
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &equity, |b, equity| {
            b.iter(|| PerformanceMetrics::compute(black_box(equity), &[], 365.0))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let bars = make_bars(2_000);
    let runner = runner();
    let search = ParameterSearch::new(small_grid())
        .with_constraint(ConstraintSpec::less_than("ema_short", "ema_long"));

    let mut group = c.benchmark_group("parameter_search");
    group.sample_size(10);
    for parallel in [false, true] {
        let search = search.clone().with_parallelism(parallel);
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(label, |b| b.iter(|| search.run(black_box(&bars), &runner)));
    }
    group.finish();
}

fn bench_walk_forward(c: &mut Criterion) {
    let bars = make_bars(3_000);
    let search = ParameterSearch::new(small_grid())
        .with_constraint(ConstraintSpec::less_than("ema_short", "ema_long"));
    let evaluator = WalkForwardEvaluator::new(search, runner()).with_folds(5);

    let mut group = c.benchmark_group("walk_forward");
    group.sample_size(10);
    group.bench_function("5_folds_3000_bars", |b| {
        b.iter(|| evaluator.evaluate(black_box(&bars)))
    });
    group.finish();
}

criterion_group!(benches, bench_metrics, bench_search, bench_walk_forward);
criterion_main!(benches);
