//! Backtest engine — the sequential per-date loop.
//!
//! Each date runs, in order:
//!
//! 1. settle pending sale proceeds
//! 2. reconcile working capital against the vault
//! 3. classify the market regime
//! 4. evaluate open positions (exits, deferrals, pyramids)
//! 5. reconcile again
//! 6. screen the day's rows
//! 7. open new positions
//! 8. mark to market and sample equity
//! 9. call the checkpoint hook
//!
//! All state lives in a [`Backtest`]; nothing is shared between runs.

pub mod config;
pub mod hook;
pub mod sizing;
pub mod state;

pub use config::{
    CapitalConfig, EngineConfig, ExtendedHold, PyramidRules, RegimeParams, RegimeTable,
    WeaknessRules,
};
pub use hook::{DayHook, DayReport, HookAction, NoHook};
pub use state::RunResult;

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use log::{debug, info};

use crate::book::{PositionBook, PositionEvent};
use crate::calendar::TradingCalendar;
use crate::domain::{EquitySample, Position, Regime, Trade};
use crate::features::FeatureSet;
use crate::ledger::CapitalLedger;
use crate::screener::{Candidate, CandidateScreener};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no trading dates between {start:?} and {end:?}")]
    EmptyCalendar {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },

    #[error("start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Outcome of driving the loop with a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The hook paused after this date.
    Paused(NaiveDate),
    Finished,
}

/// A backtest in progress over a precomputed feature set.
pub struct Backtest<'a> {
    config: EngineConfig,
    features: &'a FeatureSet,
    screener: CandidateScreener,
    dates: Vec<NaiveDate>,
    cursor: usize,
    ledger: CapitalLedger,
    book: PositionBook,
    /// Last seen close per held ticker, for dates with no row.
    last_close: HashMap<String, f64>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquitySample>,
    regimes: Vec<(NaiveDate, Regime)>,
}

impl<'a> Backtest<'a> {
    /// Set up a run over the market dates in `[start, end]`.
    pub fn new(
        config: EngineConfig,
        features: &'a FeatureSet,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(EngineError::InvalidRange { start, end });
            }
        }
        let dates = features.trading_dates(start, end);
        if dates.is_empty() {
            return Err(EngineError::EmptyCalendar { start, end });
        }

        let ledger = CapitalLedger::new(
            config.capital.initial_capital,
            config.capital.base_capital,
            config.capital.mode,
            config.costs.commission_buy,
            TradingCalendar::new(dates.clone()),
        );
        let screener = CandidateScreener::new(config.screener.clone());

        info!(
            "backtest {} → {} ({} dates, {} rows)",
            dates[0],
            dates[dates.len() - 1],
            dates.len(),
            features.len()
        );

        Ok(Self {
            config,
            features,
            screener,
            equity_curve: Vec::with_capacity(dates.len()),
            dates,
            cursor: 0,
            ledger,
            book: PositionBook::new(),
            last_close: HashMap::new(),
            trades: Vec::new(),
            regimes: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn ledger(&self) -> &CapitalLedger {
        &self.ledger
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquitySample] {
        &self.equity_curve
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The next date `step` will process.
    pub fn next_date(&self) -> Option<NaiveDate> {
        self.dates.get(self.cursor).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.dates.len()
    }

    /// Process one date. `None` once every date is done.
    pub fn step(&mut self) -> Option<DayReport> {
        let date = self.next_date()?;
        let index = self.cursor;
        let is_last = index + 1 == self.dates.len();
        let features = self.features;

        // 1-2
        self.ledger.settle(date);
        self.ledger.reconcile(self.book.positions());

        // 3
        let regime = match features.market_on(date) {
            Some(snapshot) => self.config.regime.classify(snapshot),
            None => Regime::Bear,
        };
        self.regimes.push((date, regime));

        // 4-5
        let events = self.book.evaluate(
            date,
            |ticker| features.row(date, ticker),
            regime,
            &self.config,
            Some(&mut self.ledger),
        );
        let mut report_trades = Vec::new();
        let mut deferred = 0;
        let mut pyramids = 0;
        for (_, event) in &events {
            match event {
                PositionEvent::Exit { trade } | PositionEvent::PartialExit { trade, .. } => {
                    report_trades.push(trade.clone());
                }
                PositionEvent::Deferred { .. } => deferred += 1,
                PositionEvent::Pyramid { .. } => pyramids += 1,
                PositionEvent::Updated { .. } => {}
            }
        }
        for trade in &report_trades {
            self.last_close.remove(&trade.ticker);
        }
        self.trades.extend(report_trades.iter().cloned());
        self.ledger.reconcile(self.book.positions());

        // 6-7
        let candidates = self.screener.screen(features.rows_on(date), regime);
        let entries = self.enter(date, regime, &candidates);

        // 8
        let equity = self.mark(date);
        if index % self.config.equity_stride == 0 || is_last {
            self.equity_curve.push(equity);
        }

        self.cursor += 1;
        Some(DayReport {
            date,
            index,
            regime,
            trades: report_trades,
            entries,
            deferred,
            pyramids,
            candidates: candidates.len(),
            open_positions: self.book.len(),
            equity,
        })
    }

    fn enter(&mut self, date: NaiveDate, regime: Regime, candidates: &[Candidate]) -> Vec<String> {
        let cfg = &self.config;
        let slots = sizing::entry_slots(cfg, regime, self.book.len());
        if slots == 0 || candidates.is_empty() {
            return Vec::new();
        }

        let working = self.ledger.available_working_capital();
        let sizing_base = self.ledger.sizing_base(self.book.positions());
        let budget = sizing::entry_budget(cfg, regime, slots, working, sizing_base);
        let params = *cfg.regime_params(regime);
        let max_hold_until = date
            .checked_add_days(Days::new(params.max_hold_days.max(0) as u64))
            .unwrap_or(NaiveDate::MAX);

        let mut entered = Vec::new();
        for candidate in candidates.iter().take(slots) {
            if self.book.contains(&candidate.ticker) {
                continue;
            }
            let Some(row) = self.features.row(date, &candidate.ticker) else {
                continue;
            };
            let close = row.close();
            let shares = sizing::entry_shares(cfg, budget, close, row.volume_ma20);
            if shares < cfg.lot_size {
                debug!("{date} {}: {shares} shares is under one lot", candidate.ticker);
                continue;
            }
            if !cfg.liquidity.absorbs(shares, row.bar.volume) {
                debug!("{date} {}: {shares} shares exceeds session liquidity", candidate.ticker);
                continue;
            }
            let cost = cfg.costs.buy_cost(shares, close);
            if cost > self.ledger.available_working_capital() || self.ledger.debit(cost).is_err() {
                debug!("{date} {}: cost {cost:.0} exceeds working capital", candidate.ticker);
                continue;
            }

            let distance = params.atr_multiplier * row.atr_14;
            let position = Position::open(
                candidate.ticker.clone(),
                date,
                close,
                shares,
                close + distance,
                close - distance,
                cfg.trailing_pct,
                max_hold_until,
            );
            // The ticker is not held, checked above.
            if self.book.open(position).is_ok() {
                debug!(
                    "{date} {}: entered {shares} @ {close:.2} (score {:.3})",
                    candidate.ticker, candidate.score
                );
                self.last_close.insert(candidate.ticker.clone(), close);
                entered.push(candidate.ticker.clone());
            }
        }
        entered
    }

    fn mark(&mut self, date: NaiveDate) -> EquitySample {
        let mut market_value = 0.0;
        for pos in self.book.positions() {
            let price = match self.features.row(date, &pos.ticker) {
                Some(row) => {
                    self.last_close.insert(pos.ticker.clone(), row.close());
                    row.close()
                }
                None => self
                    .last_close
                    .get(&pos.ticker)
                    .copied()
                    .unwrap_or(pos.entry_price),
            };
            market_value += pos.market_value(price);
        }

        let sample = EquitySample::new(
            date,
            self.ledger.state(),
            market_value,
            self.ledger.pending_total(),
        );
        debug_assert!(sample.total_equity >= 0.0, "negative equity on {date}");
        sample
    }

    /// Drive the loop, calling `hook` after every date, until the hook
    /// pauses or the calendar is exhausted.
    pub fn run_with(&mut self, hook: &mut dyn DayHook) -> RunStatus {
        while let Some(report) = self.step() {
            if hook.on_day(&report) == HookAction::Pause {
                debug!("paused after {}", report.date);
                return RunStatus::Paused(report.date);
            }
        }
        RunStatus::Finished
    }

    /// Continue a paused run.
    pub fn resume(&mut self, hook: &mut dyn DayHook) -> RunStatus {
        self.run_with(hook)
    }

    /// Run every remaining date and return the result.
    pub fn finish(mut self) -> RunResult {
        while self.step().is_some() {}
        self.into_result()
    }

    fn into_result(self) -> RunResult {
        let result = RunResult {
            final_positions: self.book.positions().cloned().collect(),
            final_capital: self.ledger.state(),
            final_pending: self.ledger.pending_total(),
            date_count: self.cursor,
            equity_curve: self.equity_curve,
            trades: self.trades,
            regimes: self.regimes,
        };
        info!(
            "backtest done: {} dates, {} trades, {} open, final equity {:.0}",
            result.date_count,
            result.trades.len(),
            result.final_positions.len(),
            result.final_equity().unwrap_or(0.0)
        );
        result
    }
}

/// Run a whole backtest in one call.
pub fn run_backtest(
    config: EngineConfig,
    features: &FeatureSet,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<RunResult, EngineError> {
    Ok(Backtest::new(config, features, start, end)?.finish())
}
