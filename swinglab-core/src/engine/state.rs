//! Run result type.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CapitalState, EquitySample, Position, Regime, Trade};

/// Result of a complete backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// One sample per kept date; the last date is always present.
    pub equity_curve: Vec<EquitySample>,
    /// Every sale in execution order.
    pub trades: Vec<Trade>,
    /// Regime of every processed date.
    pub regimes: Vec<(NaiveDate, Regime)>,
    /// Positions still open after the last date.
    pub final_positions: Vec<Position>,
    pub final_capital: CapitalState,
    /// Sale proceeds not yet settled after the last date.
    pub final_pending: f64,
    pub date_count: usize,
}

impl RunResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|s| s.total_equity)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.regimes.first().map(|(d, _)| *d)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.regimes.last().map(|(d, _)| *d)
    }

    /// Dates spent in each regime. Every regime is present, possibly with 0.
    pub fn regime_counts(&self) -> BTreeMap<Regime, usize> {
        let mut counts: BTreeMap<Regime, usize> = Regime::ALL.iter().map(|r| (*r, 0)).collect();
        for (_, regime) in &self.regimes {
            *counts.entry(*regime).or_default() += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_counts_cover_all_regimes() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let result = RunResult {
            equity_curve: Vec::new(),
            trades: Vec::new(),
            regimes: vec![(d(1), Regime::Bull), (d(4), Regime::Bull), (d(5), Regime::Bear)],
            final_positions: Vec::new(),
            final_capital: CapitalState::default(),
            final_pending: 0.0,
            date_count: 3,
        };
        let counts = result.regime_counts();
        assert_eq!(counts[&Regime::Bull], 2);
        assert_eq!(counts[&Regime::Sideway], 0);
        assert_eq!(counts[&Regime::Bear], 1);
        assert_eq!(result.start_date(), Some(d(1)));
        assert_eq!(result.final_equity(), None);
    }
}
