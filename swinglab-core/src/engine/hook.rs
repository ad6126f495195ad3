//! Per-date checkpoint hook.
//!
//! The loop calls the hook after each date has been fully processed. A hook
//! returning [`HookAction::Pause`] stops the run after that date; the caller
//! picks it up again with [`super::Backtest::resume`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EquitySample, Regime, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    Pause,
}

/// Summary of one processed date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayReport {
    pub date: NaiveDate,
    /// Position of `date` in the run calendar.
    pub index: usize,
    pub regime: Regime,
    /// Sales recorded today, partial profit-takes included.
    pub trades: Vec<Trade>,
    /// Tickers entered today.
    pub entries: Vec<String>,
    pub deferred: usize,
    pub pyramids: usize,
    pub candidates: usize,
    pub open_positions: usize,
    /// Equity at today's close, whether or not it was kept in the curve.
    pub equity: EquitySample,
}

pub trait DayHook {
    fn on_day(&mut self, report: &DayReport) -> HookAction;
}

/// Hook that never pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl DayHook for NoHook {
    fn on_day(&mut self, _report: &DayReport) -> HookAction {
        HookAction::Continue
    }
}

impl<F> DayHook for F
where
    F: FnMut(&DayReport) -> HookAction,
{
    fn on_day(&mut self, report: &DayReport) -> HookAction {
        self(report)
    }
}
