//! Capital bookkeeping records: pending settlements, capital buckets, equity samples.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sale proceeds in transit until `settlement_date`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingSettlement {
    pub settlement_date: NaiveDate,
    pub amount: f64,
}

/// The three cash buckets held by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CapitalState {
    pub working_capital: f64,
    pub reserve_capital: f64,
    pub profit_vault: f64,
}

impl CapitalState {
    pub fn cash_total(&self) -> f64 {
        self.working_capital + self.reserve_capital + self.profit_vault
    }
}

/// Total equity for one simulated date, with its components.
///
/// `total_equity == working_capital + market_value + pending + reserve_capital + profit_vault`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub date: NaiveDate,
    pub total_equity: f64,
    pub working_capital: f64,
    pub market_value: f64,
    pub pending: f64,
    pub reserve_capital: f64,
    pub profit_vault: f64,
}

impl EquitySample {
    pub fn new(date: NaiveDate, capital: CapitalState, market_value: f64, pending: f64) -> Self {
        let total_equity = capital.working_capital
            + market_value
            + pending
            + capital.reserve_capital
            + capital.profit_vault;
        Self {
            date,
            total_equity,
            working_capital: capital.working_capital,
            market_value,
            pending,
            reserve_capital: capital.reserve_capital,
            profit_vault: capital.profit_vault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_sums_components() {
        let capital = CapitalState {
            working_capital: 50.0,
            reserve_capital: 10.0,
            profit_vault: 5.0,
        };
        let s = EquitySample::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), capital, 30.0, 7.0);
        assert_eq!(s.total_equity, 102.0);
        assert_eq!(capital.cash_total(), 65.0);
    }
}
