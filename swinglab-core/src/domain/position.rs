//! Position — one open long holding and its exit levels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::trade::ExitType;

/// Lifecycle tag of a position.
///
/// `Open` → `PartialExit` (one profit-take done, runner remains) → `Closed`.
/// A `Closed` position is removed from the book; the tag is kept on the
/// record returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Open,
    PartialExit,
    Closed,
}

/// An exit that could not be absorbed by the day's volume.
///
/// Executed at the open of the first later date on which the minimum holding
/// period is met and an open price exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredExit {
    pub exit_type: ExitType,
    pub partial: bool,
    pub signal_date: NaiveDate,
}

/// A long position keyed by ticker. At most one per ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub avg_cost: f64,
    pub shares: u64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub trailing_stop: f64,
    pub highest_price: f64,
    #[serde(default)]
    pub partial_taken: bool,
    #[serde(default)]
    pub pyramid_count: u32,
    pub max_hold_until: NaiveDate,
    #[serde(default = "default_state")]
    pub state: PositionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred_exit: Option<DeferredExit>,
}

fn default_state() -> PositionState {
    PositionState::Open
}

impl Position {
    /// Open a fresh position at `entry_price`.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        ticker: impl Into<String>,
        entry_date: NaiveDate,
        entry_price: f64,
        shares: u64,
        take_profit: f64,
        stop_loss: f64,
        trailing_pct: f64,
        max_hold_until: NaiveDate,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            entry_date,
            entry_price,
            avg_cost: entry_price,
            shares,
            take_profit,
            stop_loss,
            trailing_stop: entry_price * (1.0 - trailing_pct),
            highest_price: entry_price,
            partial_taken: false,
            pyramid_count: 0,
            max_hold_until,
            state: PositionState::Open,
            deferred_exit: None,
        }
    }

    /// Calendar days held as of `date`.
    pub fn holding_days(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }

    /// Unrealized return versus the entry price.
    pub fn profit_pct(&self, price: f64) -> f64 {
        price / self.entry_price - 1.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    /// Cost basis including the buy-side commission.
    pub fn locked_cost(&self, commission_buy: f64) -> f64 {
        self.shares as f64 * self.avg_cost * (1.0 + commission_buy)
    }

    /// Apply the trailing-stop ratchet to a proposed level.
    ///
    /// The stop may only rise. Returns the level in force afterwards.
    pub fn ratchet_trailing(&mut self, proposed: f64) -> f64 {
        if proposed.is_finite() && proposed > self.trailing_stop {
            self.trailing_stop = proposed;
        }
        self.trailing_stop
    }

    /// Track a new session high and re-derive the trailing stop from it.
    ///
    /// Returns true if the highest price moved.
    pub fn observe_high(&mut self, high: f64, trailing_pct: f64) -> bool {
        if high.is_finite() && high > self.highest_price {
            self.highest_price = high;
            self.ratchet_trailing(high * (1.0 - trailing_pct));
            true
        } else {
            false
        }
    }

    /// Book a partial take-profit: shrink the holding, step the target up,
    /// and protect at least the entry price.
    pub fn apply_partial_exit(&mut self, shares_sold: u64, fill_price: f64, tp_step: f64) {
        self.shares = self.shares.saturating_sub(shares_sold);
        self.take_profit = fill_price * tp_step;
        self.stop_loss = self.stop_loss.max(self.entry_price);
        self.partial_taken = true;
        self.state = PositionState::PartialExit;
        self.deferred_exit = None;
    }

    /// Add shares at `price`, re-weighting the average cost.
    pub fn apply_pyramid(&mut self, add_shares: u64, price: f64) {
        let total = self.shares + add_shares;
        if total == 0 {
            return;
        }
        self.avg_cost =
            (self.shares as f64 * self.avg_cost + add_shares as f64 * price) / total as f64;
        self.shares = total;
        self.pyramid_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn position() -> Position {
        Position::open("HPG", date(2), 100.0, 1000, 106.0, 94.0, 0.05, date(30))
    }

    #[test]
    fn open_sets_initial_levels() {
        let p = position();
        assert_eq!(p.state, PositionState::Open);
        assert!((p.trailing_stop - 95.0).abs() < 1e-12);
        assert_eq!(p.highest_price, 100.0);
        assert_eq!(p.avg_cost, 100.0);
    }

    #[test]
    fn trailing_stop_never_loosens() {
        let mut p = position();
        p.observe_high(130.0, 0.05);
        assert!((p.trailing_stop - 123.5).abs() < 1e-9);
        // A pyramid proposing a lower level leaves the stop where it is.
        assert!((p.ratchet_trailing(110.0) - 123.5).abs() < 1e-9);
        // A lower high is not a new high.
        assert!(!p.observe_high(120.0, 0.05));
        assert!((p.trailing_stop - 123.5).abs() < 1e-9);
    }

    #[test]
    fn partial_exit_protects_entry() {
        let mut p = position();
        p.apply_partial_exit(400, 106.0, 1.15);
        assert_eq!(p.shares, 600);
        assert!((p.take_profit - 121.9).abs() < 1e-9);
        assert_eq!(p.stop_loss, 100.0);
        assert!(p.partial_taken);
        assert_eq!(p.state, PositionState::PartialExit);
    }

    #[test]
    fn pyramid_reweights_average_cost() {
        let mut p = position();
        p.apply_pyramid(200, 106.0);
        assert_eq!(p.shares, 1200);
        assert!((p.avg_cost - 101.0).abs() < 1e-9);
        assert_eq!(p.pyramid_count, 1);
    }

    #[test]
    fn holding_days_are_calendar_days() {
        let p = position();
        assert_eq!(p.holding_days(date(9)), 7);
    }

    #[test]
    fn state_defaults_to_open_when_absent() {
        let json = r#"{"ticker":"HPG","entry_date":"2024-05-02","entry_price":100.0,"avg_cost":100.0,
            "shares":100,"take_profit":106.0,"stop_loss":94.0,"trailing_stop":95.0,
            "highest_price":100.0,"max_hold_until":"2024-05-30"}"#;
        let p: Position = serde_json::from_str(json).unwrap();
        assert_eq!(p.state, PositionState::Open);
        assert!(!p.partial_taken);
        assert!(p.deferred_exit.is_none());
    }
}
