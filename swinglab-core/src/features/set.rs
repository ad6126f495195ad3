//! FeatureSet — the date-indexed output of the feature engine.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDate;

use crate::domain::{FeatureRow, MarketSnapshot};

/// Feature rows ordered by (date, ticker), with the market series they were
/// joined against.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    rows: Vec<FeatureRow>,
    index: BTreeMap<NaiveDate, Range<usize>>,
    market: BTreeMap<NaiveDate, MarketSnapshot>,
    benchmark: String,
    benchmark_closes: BTreeMap<NaiveDate, f64>,
}

impl FeatureSet {
    /// Assemble a set from parts. Rows are sorted by (date, ticker) and rows
    /// whose date has no market snapshot or that carry a non-finite field are
    /// discarded.
    pub fn from_parts(
        mut rows: Vec<FeatureRow>,
        market: BTreeMap<NaiveDate, MarketSnapshot>,
        benchmark: impl Into<String>,
        benchmark_closes: BTreeMap<NaiveDate, f64>,
    ) -> Self {
        rows.retain(|r| r.is_complete() && market.contains_key(&r.date()));
        rows.sort_by(|a, b| a.date().cmp(&b.date()).then_with(|| a.ticker().cmp(b.ticker())));
        let mut set = Self {
            rows,
            index: BTreeMap::new(),
            market,
            benchmark: benchmark.into(),
            benchmark_closes,
        };
        set.rebuild_index();
        set
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        let mut start = 0;
        while start < self.rows.len() {
            let date = self.rows[start].date();
            let len = self.rows[start..]
                .iter()
                .take_while(|r| r.date() == date)
                .count();
            self.index.insert(date, start..start + len);
            start += len;
        }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for one date, sorted by ticker. Empty when the date has none.
    pub fn rows_on(&self, date: NaiveDate) -> &[FeatureRow] {
        match self.index.get(&date) {
            Some(range) => &self.rows[range.clone()],
            None => &[],
        }
    }

    /// A single ticker's row on a date.
    pub fn row(&self, date: NaiveDate, ticker: &str) -> Option<&FeatureRow> {
        let day = self.rows_on(date);
        day.binary_search_by(|r| r.ticker().cmp(ticker))
            .ok()
            .map(|i| &day[i])
    }

    pub fn market(&self) -> &BTreeMap<NaiveDate, MarketSnapshot> {
        &self.market
    }

    pub fn market_on(&self, date: NaiveDate) -> Option<&MarketSnapshot> {
        self.market.get(&date)
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn benchmark_closes(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.benchmark_closes
    }

    /// Trading dates (every date with a market snapshot) within [start, end].
    pub fn trading_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<NaiveDate> {
        self.market
            .keys()
            .copied()
            .filter(|d| start.map_or(true, |s| *d >= s) && end.map_or(true, |e| *d <= e))
            .collect()
    }

    /// Latest date carrying at least one tradeable row.
    pub fn last_row_date(&self) -> Option<NaiveDate> {
        self.index.keys().next_back().copied()
    }

    /// Distinct tradeable tickers, sorted.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.rows.iter().map(|r| r.ticker().to_string()).collect();
        tickers.sort();
        tickers.dedup();
        tickers
    }
}
