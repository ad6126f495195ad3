//! Bar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single ticker, with order-flow columns.
///
/// The flow columns (buy/sell pressure, foreign flows) are optional at ingest
/// and default to zero when a data source does not provide them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub buy_pressure: f64,
    #[serde(default)]
    pub sell_pressure: f64,
    #[serde(default)]
    pub foreign_buy: f64,
    #[serde(default)]
    pub foreign_sell: f64,
    #[serde(default)]
    pub foreign_net: f64,
}

impl Bar {
    /// Bar with OHLCV only; flow columns are zero.
    pub fn ohlcv(
        ticker: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
            buy_pressure: 0.0,
            sell_pressure: 0.0,
            foreign_buy: 0.0,
            foreign_sell: 0.0,
            foreign_net: 0.0,
        }
    }

    /// Returns true if any OHLCV field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    /// Typical price (H + L + C) / 3, used by money-flow indicators.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}
