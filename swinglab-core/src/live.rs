//! Live mode — screen the latest session and check held positions against it.
//!
//! Uses the same screener and exit rules as the backtest, one date at a time.
//! No ledger is involved: exits are reported, nothing is bought, and no
//! pyramid fires.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::book::{PositionBook, PositionEvent};
use crate::domain::{FeatureRow, Position, Regime};
use crate::engine::EngineConfig;
use crate::features::FeatureSet;
use crate::screener::{Candidate, CandidateScreener};

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("feature set has no rows")]
    NoData,

    #[error("no market snapshot for {0}")]
    NoMarketSnapshot(NaiveDate),

    #[error("rows span several dates ({first} and {other}); pass a single session")]
    MixedDates { first: NaiveDate, other: NaiveDate },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed position store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("position stored under '{key}' is for {ticker}")]
    KeyMismatch { key: String, ticker: String },
}

/// Buy levels for one candidate at today's close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPlan {
    pub ticker: String,
    pub score: f64,
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub atr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestScreen {
    pub date: NaiveDate,
    pub regime: Regime,
    pub candidates: Vec<Candidate>,
    pub plans: Vec<EntryPlan>,
}

/// Screen the last date that has rows.
pub fn screen_latest(features: &FeatureSet, cfg: &EngineConfig) -> Result<LatestScreen, LiveError> {
    let date = features.last_row_date().ok_or(LiveError::NoData)?;
    let snapshot = features
        .market_on(date)
        .ok_or(LiveError::NoMarketSnapshot(date))?;
    let regime = cfg.regime.classify(snapshot);

    let screener = CandidateScreener::new(cfg.screener.clone());
    let candidates = screener.screen(features.rows_on(date), regime);
    let atr_multiplier = cfg.regime_params(regime).atr_multiplier;

    let plans = candidates
        .iter()
        .filter_map(|c| {
            let row = features.row(date, &c.ticker)?;
            let entry = row.close();
            let distance = atr_multiplier * row.atr_14;
            Some(EntryPlan {
                ticker: c.ticker.clone(),
                score: c.score,
                entry,
                take_profit: entry + distance,
                stop_loss: entry - distance,
                atr: row.atr_14,
            })
        })
        .collect();

    info!("{date}: {regime} market, {} candidates", candidates.len());
    Ok(LatestScreen {
        date,
        regime,
        candidates,
        plans,
    })
}

/// Open positions carried between live sessions.
///
/// Stored as `{"positions": {"<ticker>": <position>}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionStore {
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
}

impl PositionStore {
    /// Parse a store. Blank input is an empty store. Every entry must be
    /// keyed by its own ticker.
    pub fn from_json(s: &str) -> Result<Self, StoreError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let store: Self = serde_json::from_str(s)?;
        if let Some((key, pos)) = store.positions.iter().find(|(k, p)| **k != p.ticker) {
            return Err(StoreError::KeyMismatch {
                key: key.clone(),
                ticker: pos.ticker.clone(),
            });
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from disk. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_json(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} not found, starting with no positions", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::write(path, self.to_json()?).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Insert or replace the position for its ticker.
    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.ticker.clone(), position);
    }
}

/// Check held positions against one session's rows.
///
/// Positions entered on or after the session date are left alone. Full
/// exits are removed from the store; partial exits, deferrals and stop
/// moves are written back.
pub fn evaluate_open_positions(
    store: &mut PositionStore,
    today_rows: &[FeatureRow],
    cfg: &EngineConfig,
) -> Result<Vec<(String, PositionEvent)>, LiveError> {
    let Some(first) = today_rows.first() else {
        return Ok(Vec::new());
    };
    let today = first.date();
    if let Some(other) = today_rows.iter().map(|r| r.date()).find(|d| *d != today) {
        return Err(LiveError::MixedDates { first: today, other });
    }
    let regime = cfg.regime.classify(&first.market);

    let rows: BTreeMap<&str, &FeatureRow> = today_rows.iter().map(|r| (r.ticker(), r)).collect();
    let (eligible, later): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut store.positions)
        .into_iter()
        .partition(|(_, p)| p.entry_date < today);

    let mut book = PositionBook::from_positions(eligible.into_values());
    let events = book.evaluate(today, |t| rows.get(t).copied(), regime, cfg, None);

    store.positions = later;
    store.positions.extend(book.into_positions());
    info!(
        "{today}: {regime} market, {} events, {} positions held",
        events.len(),
        store.len()
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitType;
    use crate::features::set::fixtures::{row, snapshot};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn held(ticker: &str, entry: NaiveDate) -> Position {
        Position::open(ticker, entry, 100.0, 1000, 106.0, 94.0, 0.05, d(7, 1))
    }

    #[test]
    fn blank_store_is_empty() {
        assert!(PositionStore::from_json("").unwrap().is_empty());
        assert!(PositionStore::from_json("  \n").unwrap().is_empty());
        assert!(PositionStore::from_json("{}").unwrap().is_empty());
        assert!(PositionStore::from_json("{\"positions\": [").is_err());
    }

    #[test]
    fn store_rejects_entries_under_another_ticker() {
        let mut store = PositionStore::default();
        store.insert(held("FPT", d(5, 3)));
        store.insert(held("HPG", d(5, 3)));
        let json = store.to_json().unwrap();
        assert_eq!(PositionStore::from_json(&json).unwrap(), store);

        // Both entries claim FPT; re-keying would silently drop one.
        let json = json.replacen("\"ticker\": \"HPG\"", "\"ticker\": \"FPT\"", 1);
        let err = PositionStore::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            StoreError::KeyMismatch { ref key, ref ticker } if key == "HPG" && ticker == "FPT"
        ));
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        let mut store = PositionStore::default();
        store.insert(held("FPT", d(5, 3)));
        store.save(&path).unwrap();
        assert_eq!(PositionStore::load(&path).unwrap(), store);
        assert!(PositionStore::load(&dir.path().join("absent.json")).unwrap().is_empty());
    }

    #[test]
    fn gap_stop_closes_and_removes() {
        let mut store = PositionStore::default();
        store.insert(held("FPT", d(5, 3)));
        let mut r = row("FPT", d(5, 6), 90.5);
        r.bar.open = 90.0;
        let events = evaluate_open_positions(&mut store, &[r], &EngineConfig::default()).unwrap();
        let trade = events[0].1.trade().unwrap();
        assert_eq!(trade.exit_type, ExitType::GapStopLoss);
        assert_eq!(trade.exit_price, 90.0);
        assert!(store.is_empty());
    }

    #[test]
    fn same_day_entries_are_skipped() {
        let mut store = PositionStore::default();
        store.insert(held("FPT", d(5, 6)));
        let mut r = row("FPT", d(5, 6), 90.5);
        r.bar.open = 90.0;
        let events = evaluate_open_positions(&mut store, &[r], &EngineConfig::default()).unwrap();
        assert!(events.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mixed_dates_are_rejected() {
        let mut store = PositionStore::default();
        let rows = [row("FPT", d(5, 6), 100.0), row("HPG", d(5, 7), 100.0)];
        assert!(matches!(
            evaluate_open_positions(&mut store, &rows, &EngineConfig::default()),
            Err(LiveError::MixedDates { .. })
        ));
    }

    #[test]
    fn latest_screen_plans_levels_from_atr() {
        let date = d(6, 3);
        let mut r = row("FPT", date, 110.0);
        r.sma_200 = 90.0;
        r.sma_50 = 100.0;
        r.sma_5 = 105.0;
        r.rsi_14 = 65.0;
        r.macd = 0.5;
        r.macd_signal = 0.2;
        let set = FeatureSet::from_parts(
            vec![r, row("VIC", date, 40.0)],
            [(date, snapshot(date))].into_iter().collect(),
            "VNINDEX",
            [(date, 1250.0)].into_iter().collect(),
        );
        let screen = screen_latest(&set, &EngineConfig::default()).unwrap();
        assert_eq!(screen.regime, Regime::Bull);
        assert_eq!(screen.candidates.len(), 1);
        let plan = &screen.plans[0];
        assert_eq!(plan.ticker, "FPT");
        assert_eq!(plan.entry, 110.0);
        // atr 2.2, bull multiplier 2.0
        assert!((plan.take_profit - 114.4).abs() < 1e-9);
        assert!((plan.stop_loss - 105.6).abs() < 1e-9);
    }

    #[test]
    fn empty_set_has_nothing_to_screen() {
        let set = FeatureSet::default();
        assert!(matches!(
            screen_latest(&set, &EngineConfig::default()),
            Err(LiveError::NoData)
        ));
    }
}
