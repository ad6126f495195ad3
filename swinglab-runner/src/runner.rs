//! Backtest runner — wires config, data, features, engine and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: loads bars from the configured file, then runs. Used by the CLI.
//! - `run_backtest_from_features()`: takes a precomputed feature set. Used by
//!   tests and by callers that run several configs over the same data.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::domain::{CapitalState, EquitySample, Position, Regime, Trade};
use swinglab_core::engine::{self, EngineError};
use swinglab_core::features::{FeatureEngine, FeatureError, FeatureSet};

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{load_bars, LoadError};
use crate::metrics::{with_start, PerformanceMetrics};
use crate::monte_carlo::{project_drawdowns, MonteCarloResult};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("feature error: {0}")]
    Features(#[from] FeatureError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Benchmark value on one equity date, rebased to the initial capital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub config: RunConfig,
    pub benchmark: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySample>,
    pub benchmark_curve: Vec<BenchmarkPoint>,
    pub benchmark_return: f64,
    pub regime_counts: BTreeMap<Regime, usize>,
    pub final_positions: Vec<Position>,
    pub final_capital: CapitalState,
    pub final_pending: f64,
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloResult>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|s| s.total_equity)
            .unwrap_or(self.initial_capital)
    }
}

/// Load the configured bars, compute features, and run.
pub fn run_backtest(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_bars(&config.data)?;
    info!(
        "computing features for {} tickers (benchmark {})",
        loaded.tickers.len(),
        config.data.benchmark
    );
    let features = FeatureEngine::new().compute(&loaded.bars, &config.data.benchmark)?;
    run_backtest_from_features(config, &features, &loaded.dataset_hash)
}

/// Run over a precomputed feature set — no I/O.
pub fn run_backtest_from_features(
    config: &RunConfig,
    features: &FeatureSet,
    dataset_hash: &str,
) -> Result<BacktestResult, RunError> {
    let engine_config = config.engine_config()?;
    let run_id = config.run_id()?;
    let initial_capital = engine_config.capital.initial_capital;
    let min_holding = engine_config.min_holding_days;
    let stride = engine_config.equity_stride;

    info!(
        "run {} starting: {} rows, {} tickers",
        &run_id[..12.min(run_id.len())],
        features.len(),
        features.tickers().len()
    );
    let started = Instant::now();
    let result = engine::run_backtest(
        engine_config,
        features,
        config.backtest.start,
        config.backtest.end,
    )?;

    let metrics = PerformanceMetrics::compute(&result.equity_curve, &result.trades, initial_capital);
    let benchmark_curve = benchmark_curve(features, &result.equity_curve, initial_capital);
    let benchmark_return = benchmark_curve
        .last()
        .map(|p| p.equity / initial_capital - 1.0)
        .unwrap_or(0.0);

    let monte_carlo = if config.monte_carlo.enabled {
        project_drawdowns(
            &with_start(&result.equity_curve, initial_capital),
            &config.monte_carlo,
        )
    } else {
        None
    };

    let mut warnings: Vec<String> = result
        .trades
        .iter()
        .filter(|t| t.holding_days < min_holding)
        .map(|t| {
            format!(
                "{} sold {} after {} days, below the {}-day minimum",
                t.ticker, t.exit_date, t.holding_days, min_holding
            )
        })
        .collect();
    if stride > 1 {
        warnings.push(format!(
            "equity sampled every {stride} dates; return ratios are per sample, not per session"
        ));
    }

    info!(
        "run finished in {:.2?}: {} dates, {} trades, total return {:.2}%, max drawdown {:.2}%, sharpe {:.2}",
        started.elapsed(),
        result.date_count,
        metrics.trade_count,
        metrics.total_return * 100.0,
        metrics.max_drawdown * 100.0,
        metrics.sharpe
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        dataset_hash: dataset_hash.to_string(),
        config: config.clone(),
        benchmark: features.benchmark().to_string(),
        start_date: result.start_date(),
        end_date: result.end_date(),
        initial_capital,
        regime_counts: result.regime_counts(),
        metrics,
        trades: result.trades,
        equity_curve: result.equity_curve,
        benchmark_curve,
        benchmark_return,
        final_positions: result.final_positions,
        final_capital: result.final_capital,
        final_pending: result.final_pending,
        monte_carlo,
        warnings,
    })
}

/// Buy-and-hold of the benchmark over the equity dates, rebased so the first
/// point equals `initial_capital`. Dates without a close carry the last one.
pub fn benchmark_curve(
    features: &FeatureSet,
    equity: &[EquitySample],
    initial_capital: f64,
) -> Vec<BenchmarkPoint> {
    let closes = features.benchmark_closes();
    let close_on = |date: NaiveDate| closes.range(..=date).next_back().map(|(_, c)| *c);

    let Some(base) = equity.first().and_then(|s| close_on(s.date)) else {
        return Vec::new();
    };
    if !(base.is_finite() && base > 0.0) {
        return Vec::new();
    }
    equity
        .iter()
        .filter_map(|s| {
            close_on(s.date).map(|c| BenchmarkPoint {
                date: s.date,
                equity: initial_capital * c / base,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn sample(date: NaiveDate) -> EquitySample {
        EquitySample::new(date, CapitalState::default(), 0.0, 0.0)
    }

    fn set_with_closes(closes: &[(u32, f64)]) -> FeatureSet {
        FeatureSet::from_parts(
            Vec::new(),
            BTreeMap::new(),
            "VNINDEX",
            closes.iter().map(|&(day, c)| (d(day), c)).collect(),
        )
    }

    #[test]
    fn benchmark_curve_rebases_and_carries_forward() {
        let set = set_with_closes(&[(1, 1000.0), (2, 1100.0), (4, 900.0)]);
        let equity: Vec<_> = [1, 2, 3, 4].into_iter().map(|x| sample(d(x))).collect();
        let curve = benchmark_curve(&set, &equity, 1_000_000.0);
        let values: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        assert_eq!(values, [1_000_000.0, 1_100_000.0, 1_100_000.0, 900_000.0]);
    }

    #[test]
    fn benchmark_curve_without_closes_is_empty() {
        let set = set_with_closes(&[(10, 1000.0)]);
        let equity = vec![sample(d(1))];
        assert!(benchmark_curve(&set, &equity, 1.0).is_empty());
    }

    #[test]
    fn config_errors_stop_the_run_before_any_io() {
        let config = RunConfig::default();
        assert!(matches!(run_backtest(&config), Err(RunError::Config(_))));
    }
}
