//! Trade — an immutable exit fill record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position (or part of it) was sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    /// Opened at or above take-profit.
    GapTakeProfit,
    /// Opened at or below stop-loss.
    GapStopLoss,
    TakeProfit,
    StopLoss,
    TrailingStop,
    /// Held for the regime's maximum holding period.
    MaxHold,
    /// RSI, money flow, and OBV all deteriorating.
    Weakness,
    /// Unrealized loss beyond the regime's threshold.
    LossLimit,
    /// Sideway market with the short average under the 50-day average.
    MomentumLoss,
}

impl ExitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitType::GapTakeProfit => "gap_take_profit",
            ExitType::GapStopLoss => "gap_stop_loss",
            ExitType::TakeProfit => "take_profit",
            ExitType::StopLoss => "stop_loss",
            ExitType::TrailingStop => "trailing_stop",
            ExitType::MaxHold => "max_hold",
            ExitType::Weakness => "weakness",
            ExitType::LossLimit => "loss_limit",
            ExitType::MomentumLoss => "momentum_loss",
        }
    }

    /// Take-profit exits are the only ones eligible for a partial sale.
    pub fn is_take_profit(&self) -> bool {
        matches!(self, ExitType::GapTakeProfit | ExitType::TakeProfit)
    }
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded sale. Appended to the trade log and never mutated.
///
/// Partial take-profit sales are recorded too, with `partial = true`, so the
/// log's profit column sums to total realized profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: u64,
    /// Net proceeds minus cost basis (both sides of commission and tax included).
    pub profit: f64,
    pub holding_days: i64,
    pub exit_type: ExitType,
    #[serde(default)]
    pub partial: bool,
}

impl Trade {
    /// Price return in percent: (exit - entry) / entry * 100.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.exit_price - self.entry_price) / self.entry_price * 100.0
    }

    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.profit < 0.0
    }
}
