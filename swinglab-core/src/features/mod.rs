//! Feature engine — bars in, complete feature rows out.
//!
//! 1. Group bars by ticker and sort each history by date
//! 2. Compute the benchmark's market snapshot series
//! 3. Compute every other ticker's indicators in parallel (rayon)
//! 4. Join each row with the snapshot for its date
//!
//! Rows inside the 200-bar warmup, rows with any non-finite field, and rows
//! whose date has no complete snapshot are dropped, never zero-filled.

pub mod precompute;
pub mod set;

pub use precompute::TickerSeries;
pub use set::FeatureSet;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use rayon::prelude::*;

use crate::data::{frame_to_bars, IngestError, SchemaError};
use crate::domain::{Bar, FeatureRow, MarketSnapshot};
use precompute::MIN_HISTORY;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("benchmark ticker {0} not present in the bar data")]
    MissingBenchmark(String),

    #[error(transparent)]
    Ingest(IngestError),
}

impl From<IngestError> for FeatureError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Schema(SchemaError::MissingColumns(cols)) => {
                FeatureError::MissingColumns(cols)
            }
            other => FeatureError::Ingest(other),
        }
    }
}

/// Stateless feature computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngine;

impl FeatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate a polars bar table and compute features from it.
    pub fn compute_frame(&self, df: &DataFrame, benchmark: &str) -> Result<FeatureSet, FeatureError> {
        let bars = frame_to_bars(df)?;
        self.compute(&bars, benchmark)
    }

    /// Compute features for every non-benchmark ticker in `bars`.
    pub fn compute(&self, bars: &[Bar], benchmark: &str) -> Result<FeatureSet, FeatureError> {
        let mut by_ticker = group_by_ticker(bars);

        let bench_bars = by_ticker
            .remove(benchmark)
            .ok_or_else(|| FeatureError::MissingBenchmark(benchmark.to_string()))?;
        let market = market_snapshots(&bench_bars);
        let benchmark_closes: BTreeMap<NaiveDate, f64> = bench_bars
            .iter()
            .filter(|b| b.close.is_finite())
            .map(|b| (b.date, b.close))
            .collect();
        debug!(
            "benchmark {benchmark}: {} bars, {} complete snapshots",
            bench_bars.len(),
            market.len()
        );

        let per_ticker: Vec<Vec<FeatureRow>> = by_ticker
            .par_iter()
            .map(|(_, history)| ticker_rows(history, &market))
            .collect();
        let rows: Vec<FeatureRow> = per_ticker.into_iter().flatten().collect();

        info!(
            "features: {} tickers, {} rows, {} market dates",
            by_ticker.len(),
            rows.len(),
            market.len()
        );
        Ok(FeatureSet::from_parts(rows, market, benchmark, benchmark_closes))
    }
}

/// Group bars by ticker, sort by date, and drop repeated dates (first wins).
fn group_by_ticker(bars: &[Bar]) -> BTreeMap<String, Vec<Bar>> {
    let mut by_ticker: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        by_ticker.entry(bar.ticker.clone()).or_default().push(bar.clone());
    }
    for (ticker, history) in by_ticker.iter_mut() {
        history.sort_by_key(|b| b.date);
        let before = history.len();
        history.dedup_by_key(|b| b.date);
        if history.len() != before {
            warn!("{ticker}: dropped {} duplicate dates", before - history.len());
        }
    }
    by_ticker
}

/// Complete market snapshots, one per benchmark date with full history.
pub fn market_snapshots(bench: &[Bar]) -> BTreeMap<NaiveDate, MarketSnapshot> {
    let series = TickerSeries::compute(bench);
    bench
        .iter()
        .enumerate()
        .skip(MIN_HISTORY)
        .map(|(i, bar)| MarketSnapshot {
            date: bar.date,
            close: bar.close,
            ma50: series.sma_50[i],
            ma200: series.sma_200[i],
            rsi: series.rsi_14[i],
            adx: series.adx_14[i],
            boll_width: series.boll_width[i],
        })
        .filter(MarketSnapshot::is_complete)
        .map(|m| (m.date, m))
        .collect()
}

fn ticker_rows(history: &[Bar], market: &BTreeMap<NaiveDate, MarketSnapshot>) -> Vec<FeatureRow> {
    if history.len() <= MIN_HISTORY {
        return Vec::new();
    }
    let s = TickerSeries::compute(history);
    history
        .iter()
        .enumerate()
        .skip(MIN_HISTORY)
        .filter_map(|(i, bar)| {
            let snapshot = market.get(&bar.date)?;
            let row = FeatureRow {
                bar: bar.clone(),
                sma_5: s.sma_5[i],
                sma_50: s.sma_50[i],
                sma_200: s.sma_200[i],
                rsi_14: s.rsi_14[i],
                macd: s.macd[i],
                macd_signal: s.macd_signal[i],
                boll_upper: s.boll_upper[i],
                boll_lower: s.boll_lower[i],
                boll_width: s.boll_width[i],
                atr_14: s.atr_14[i],
                volume_ma20: s.volume_ma20[i],
                volume_spike: s.volume_spike[i],
                mfi_14: s.mfi_14[i],
                obv: s.obv[i],
                obv_prev: s.obv_prev(i),
                market: *snapshot,
            };
            row.is_complete().then_some(row)
        })
        .collect()
}
