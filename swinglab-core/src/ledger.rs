//! Capital ledger — working capital, reserve, profit vault, and T+2 cash in transit.
//!
//! Total cash = working + reserve + vault + pending, and only `settle` and
//! `debit` / `credit` move money across that boundary. `reconcile` moves
//! money between working capital and the vault and never changes the total.

use std::collections::VecDeque;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::calendar::TradingCalendar;
use crate::domain::{CapitalState, PendingSettlement, Position};

/// Settlement lag in trading sessions.
pub const SETTLEMENT_LAG: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalMode {
    /// Working capital is held at the base; profits above it are swept to the vault.
    #[default]
    Vault,
    /// Profits stay in working capital and compound.
    Reinvest,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("debit of {requested:.2} exceeds available working capital {available:.2}")]
    Overdraft { requested: f64, available: f64 },

    #[error("non-finite or negative amount {0}")]
    InvalidAmount(f64),
}

/// Locked cost of a set of positions, buy commission included.
pub fn locked_cost<'a>(positions: impl IntoIterator<Item = &'a Position>, commission_buy: f64) -> f64 {
    positions
        .into_iter()
        .map(|p| p.locked_cost(commission_buy))
        .sum()
}

#[derive(Debug, Clone)]
pub struct CapitalLedger {
    calendar: TradingCalendar,
    settlement_lag: usize,
    base_capital: f64,
    mode: CapitalMode,
    commission_buy: f64,
    working: f64,
    reserve: f64,
    vault: f64,
    pending: VecDeque<PendingSettlement>,
}

impl CapitalLedger {
    /// Capital above `base_capital` is parked in the reserve.
    pub fn new(
        initial_capital: f64,
        base_capital: f64,
        mode: CapitalMode,
        commission_buy: f64,
        calendar: TradingCalendar,
    ) -> Self {
        let reserve = (initial_capital - base_capital).max(0.0);
        Self {
            calendar,
            settlement_lag: SETTLEMENT_LAG,
            base_capital,
            mode,
            commission_buy,
            working: initial_capital - reserve,
            reserve,
            vault: 0.0,
            pending: VecDeque::new(),
        }
    }

    /// Restore a ledger from a saved state (no cash in transit).
    pub fn from_state(
        state: CapitalState,
        base_capital: f64,
        mode: CapitalMode,
        commission_buy: f64,
        calendar: TradingCalendar,
    ) -> Self {
        Self {
            calendar,
            settlement_lag: SETTLEMENT_LAG,
            base_capital,
            mode,
            commission_buy,
            working: state.working_capital,
            reserve: state.reserve_capital,
            vault: state.profit_vault,
            pending: VecDeque::new(),
        }
    }

    pub fn with_settlement_lag(mut self, lag: usize) -> Self {
        self.settlement_lag = lag;
        self
    }

    pub fn mode(&self) -> CapitalMode {
        self.mode
    }

    pub fn base_capital(&self) -> f64 {
        self.base_capital
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Credit every pending settlement due on or before `date`, oldest first.
    /// Returns the amount credited.
    pub fn settle(&mut self, date: NaiveDate) -> f64 {
        let mut credited = 0.0;
        while let Some(front) = self.pending.front() {
            if front.settlement_date > date {
                break;
            }
            credited += front.amount;
            self.pending.pop_front();
        }
        if credited > 0.0 {
            self.working += credited;
            debug!("{date}: settled {credited:.2}");
        }
        credited
    }

    /// Hold working capital at `base - locked - pending` in vault mode.
    pub fn reconcile<'a>(&mut self, positions: impl IntoIterator<Item = &'a Position>) {
        if self.mode == CapitalMode::Reinvest {
            return;
        }
        let locked = locked_cost(positions, self.commission_buy);
        let target = (self.base_capital - locked - self.pending_total()).max(0.0);
        if self.working > target {
            let excess = self.working - target;
            self.working = target;
            self.vault += excess;
        } else if self.working < target {
            let pull = (target - self.working).min(self.vault);
            self.vault -= pull;
            self.working += pull;
        }
    }

    /// Queue sale proceeds; returns the settlement date.
    pub fn record_pending_settlement(&mut self, trade_date: NaiveDate, amount: f64) -> NaiveDate {
        let settlement_date = self.calendar.offset(trade_date, self.settlement_lag);
        self.pending.push_back(PendingSettlement {
            settlement_date,
            amount,
        });
        settlement_date
    }

    pub fn available_working_capital(&self) -> f64 {
        self.working
    }

    /// Take cash out of working capital for a purchase.
    pub fn debit(&mut self, amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if amount > self.working {
            return Err(LedgerError::Overdraft {
                requested: amount,
                available: self.working,
            });
        }
        self.working -= amount;
        Ok(())
    }

    pub fn pending_total(&self) -> f64 {
        self.pending.iter().map(|p| p.amount).sum()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingSettlement> {
        self.pending.iter()
    }

    pub fn state(&self) -> CapitalState {
        CapitalState {
            working_capital: self.working,
            reserve_capital: self.reserve,
            profit_vault: self.vault,
        }
    }

    /// Capital that per-trade limits are measured against.
    pub fn sizing_base<'a>(&self, positions: impl IntoIterator<Item = &'a Position>) -> f64 {
        match self.mode {
            CapitalMode::Vault => self.base_capital,
            CapitalMode::Reinvest => {
                self.working
                    + locked_cost(positions, self.commission_buy)
                    + self.pending_total()
                    + self.reserve
                    + self.vault
            }
        }
    }

    /// Cash across every bucket, including cash in transit.
    pub fn cash_total(&self) -> f64 {
        self.state().cash_total() + self.pending_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn calendar() -> TradingCalendar {
        TradingCalendar::new(vec![d(1), d(2), d(3), d(4), d(5), d(8), d(9)])
    }

    fn position(shares: u64, avg_cost: f64) -> Position {
        Position::open("FPT", d(1), avg_cost, shares, avg_cost * 1.1, avg_cost * 0.9, 0.05, d(30))
    }

    #[test]
    fn reserve_seeded_from_excess_capital() {
        let ledger = CapitalLedger::new(1_500_000.0, 1_000_000.0, CapitalMode::Vault, 0.001, calendar());
        let s = ledger.state();
        assert_eq!(s.working_capital, 1_000_000.0);
        assert_eq!(s.reserve_capital, 500_000.0);
        assert_eq!(s.profit_vault, 0.0);
    }

    #[test]
    fn pending_settles_two_sessions_later_fifo() {
        let mut ledger = CapitalLedger::new(100.0, 100.0, CapitalMode::Reinvest, 0.0, calendar());
        assert_eq!(ledger.record_pending_settlement(d(4), 10.0), d(8));
        assert_eq!(ledger.record_pending_settlement(d(5), 20.0), d(9));
        assert_eq!(ledger.pending_total(), 30.0);

        assert_eq!(ledger.settle(d(5)), 0.0);
        assert_eq!(ledger.settle(d(8)), 10.0);
        assert_eq!(ledger.available_working_capital(), 110.0);
        assert_eq!(ledger.settle(d(9)), 20.0);
        assert_eq!(ledger.pending_total(), 0.0);
    }

    #[test]
    fn restored_ledger_keeps_buckets_and_custom_lag() {
        let state = CapitalState {
            working_capital: 700.0,
            reserve_capital: 50.0,
            profit_vault: 250.0,
        };
        let mut ledger = CapitalLedger::from_state(state, 1_000.0, CapitalMode::Vault, 0.0, calendar())
            .with_settlement_lag(1);
        assert_eq!(ledger.state(), state);
        assert_eq!(ledger.pending_total(), 0.0);
        assert_eq!(ledger.record_pending_settlement(d(4), 10.0), d(5));
        assert_eq!(ledger.settle(d(5)), 10.0);
        assert_eq!(ledger.cash_total(), 1_010.0);
    }

    #[test]
    fn settlement_capped_at_calendar_end() {
        let mut ledger = CapitalLedger::new(100.0, 100.0, CapitalMode::Vault, 0.0, calendar());
        assert_eq!(ledger.record_pending_settlement(d(9), 5.0), d(9));
        assert_eq!(ledger.settle(d(9)), 5.0);
    }

    #[test]
    fn vault_sweeps_excess_and_pulls_back_deficit() {
        let mut ledger = CapitalLedger::new(1_000.0, 1_000.0, CapitalMode::Vault, 0.0, calendar());
        ledger.record_pending_settlement(d(1), 300.0);
        ledger.settle(d(3));
        // working 1300, nothing locked → target 1000
        ledger.reconcile(std::iter::empty());
        assert_eq!(ledger.state().working_capital, 1_000.0);
        assert_eq!(ledger.state().profit_vault, 300.0);

        // 600 locked → target 400, excess 600 to vault
        let held = [position(6, 100.0)];
        ledger.reconcile(held.iter());
        assert_eq!(ledger.state().working_capital, 400.0);
        assert_eq!(ledger.state().profit_vault, 900.0);

        // Positions gone, working 400 < target 1000 → pull 600 from the vault
        ledger.reconcile(std::iter::empty());
        assert_eq!(ledger.state().working_capital, 1_000.0);
        assert_eq!(ledger.state().profit_vault, 300.0);
    }

    #[test]
    fn deficit_pull_limited_by_vault_balance() {
        let mut ledger = CapitalLedger::new(1_000.0, 1_000.0, CapitalMode::Vault, 0.0, calendar());
        ledger.debit(800.0).unwrap();
        ledger.reconcile(std::iter::empty());
        assert_eq!(ledger.state().working_capital, 200.0);
        assert_eq!(ledger.state().profit_vault, 0.0);
    }

    #[test]
    fn pending_counts_against_the_target() {
        let mut ledger = CapitalLedger::new(1_000.0, 1_000.0, CapitalMode::Vault, 0.0, calendar());
        ledger.debit(500.0).unwrap();
        ledger.record_pending_settlement(d(1), 500.0);
        ledger.reconcile(std::iter::empty());
        assert_eq!(ledger.state().working_capital, 500.0);
        assert_eq!(ledger.state().profit_vault, 0.0);
    }

    #[test]
    fn reinvest_mode_never_sweeps() {
        let mut ledger = CapitalLedger::new(1_000.0, 1_000.0, CapitalMode::Reinvest, 0.0, calendar());
        ledger.record_pending_settlement(d(1), 300.0);
        ledger.settle(d(3));
        ledger.reconcile(std::iter::empty());
        assert_eq!(ledger.state().working_capital, 1_300.0);
        assert_eq!(ledger.sizing_base(std::iter::empty()), 1_300.0);
    }

    #[test]
    fn debit_refuses_overdraft() {
        let mut ledger = CapitalLedger::new(100.0, 100.0, CapitalMode::Vault, 0.0, calendar());
        assert!(matches!(ledger.debit(150.0), Err(LedgerError::Overdraft { .. })));
        assert!(matches!(ledger.debit(f64::NAN), Err(LedgerError::InvalidAmount(_))));
        assert_eq!(ledger.available_working_capital(), 100.0);
    }

    #[test]
    fn reconcile_conserves_cash() {
        let mut ledger = CapitalLedger::new(2_000.0, 1_000.0, CapitalMode::Vault, 0.001, calendar());
        ledger.debit(700.0).unwrap();
        ledger.record_pending_settlement(d(2), 900.0);
        let before = ledger.cash_total();
        let held = [position(3, 100.0)];
        ledger.reconcile(held.iter());
        assert!((ledger.cash_total() - before).abs() < 1e-9);
        ledger.settle(d(9));
        ledger.reconcile(std::iter::empty());
        assert!((ledger.cash_total() - before).abs() < 1e-9);
    }
}
