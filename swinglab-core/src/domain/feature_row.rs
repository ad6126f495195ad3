//! FeatureRow — a bar joined with its indicators and the day's market context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::bar::Bar;

/// Benchmark-derived market indicators for one trading date.
///
/// Computed once from the benchmark ticker and broadcast onto every
/// ticker's row for the same date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    pub ma50: f64,
    pub ma200: f64,
    pub rsi: f64,
    pub adx: f64,
    pub boll_width: f64,
}

impl MarketSnapshot {
    /// True when every indicator is finite.
    pub fn is_complete(&self) -> bool {
        [
            self.close,
            self.ma50,
            self.ma200,
            self.rsi,
            self.adx,
            self.boll_width,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Benchmark return versus its 50-day mean, the denominator of relative strength.
    pub fn trend_over_ma50(&self) -> f64 {
        (self.close - self.ma50) / self.ma50
    }
}

/// A bar plus derived technical fields.
///
/// Only constructed by the feature engine once every field is finite;
/// rows with insufficient history never exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub bar: Bar,
    pub sma_5: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub rsi_14: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub boll_upper: f64,
    pub boll_lower: f64,
    pub boll_width: f64,
    pub atr_14: f64,
    pub volume_ma20: f64,
    pub volume_spike: f64,
    pub mfi_14: f64,
    pub obv: f64,
    /// OBV of the previous bar of the same ticker.
    pub obv_prev: f64,
    pub market: MarketSnapshot,
}

impl FeatureRow {
    pub fn ticker(&self) -> &str {
        &self.bar.ticker
    }

    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    pub fn macd_histogram(&self) -> f64 {
        self.macd - self.macd_signal
    }

    /// True when every derived field and the market snapshot are finite.
    pub fn is_complete(&self) -> bool {
        let derived = [
            self.sma_5,
            self.sma_50,
            self.sma_200,
            self.rsi_14,
            self.macd,
            self.macd_signal,
            self.boll_upper,
            self.boll_lower,
            self.boll_width,
            self.atr_14,
            self.volume_ma20,
            self.volume_spike,
            self.mfi_14,
            self.obv,
            self.obv_prev,
        ];
        !self.bar.is_void() && derived.iter().all(|v| v.is_finite()) && self.market.is_complete()
    }
}
