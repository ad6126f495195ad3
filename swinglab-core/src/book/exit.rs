//! Exit detection — price triggers and forced exits for one position on one bar.
//!
//! Detection is pure apart from the stop ratchet. Whether a detected exit
//! executes (minimum holding period, liquidity, degenerate proceeds) is
//! decided by the book.

use crate::domain::{Bar, ExitType, FeatureRow, Position, Regime};
use crate::engine::config::EngineConfig;

/// A detected exit: what fired, at which price, and whether it is a
/// partial profit-take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub exit_type: ExitType,
    pub price: f64,
    pub partial: bool,
}

impl ExitSignal {
    fn full(exit_type: ExitType, price: f64) -> Self {
        Self {
            exit_type,
            price,
            partial: false,
        }
    }

    fn take_profit(exit_type: ExitType, price: f64, pos: &Position) -> Self {
        Self {
            exit_type,
            price,
            partial: !pos.partial_taken,
        }
    }
}

/// Step 1: track the session high and ratchet the trailing stop.
/// Returns true if anything moved.
pub fn ratchet(pos: &mut Position, bar: &Bar, trailing_pct: f64) -> bool {
    pos.observe_high(bar.high, trailing_pct)
}

/// Step 2: today's take-profit and stop-loss. In a sideways market the
/// Bollinger bands tighten both levels for this session only.
pub fn effective_levels(pos: &Position, row: &FeatureRow, regime: Regime) -> (f64, f64) {
    if regime == Regime::Sideway {
        (
            pos.take_profit.min(row.boll_upper),
            pos.stop_loss.max(row.boll_lower),
        )
    } else {
        (pos.take_profit, pos.stop_loss)
    }
}

/// Steps 3 and 4: gap and intraday price triggers. Stops win over targets.
///
/// A session low through the trailing stop sells at the close.
pub fn price_trigger(pos: &Position, bar: &Bar, tp: f64, sl: f64) -> Option<ExitSignal> {
    if bar.open <= sl {
        return Some(ExitSignal::full(ExitType::GapStopLoss, bar.open));
    }
    if bar.open >= tp {
        return Some(ExitSignal::take_profit(ExitType::GapTakeProfit, bar.open, pos));
    }
    if bar.low <= sl {
        return Some(ExitSignal::full(ExitType::StopLoss, sl));
    }
    if bar.low <= pos.trailing_stop {
        return Some(ExitSignal::full(ExitType::TrailingStop, bar.close));
    }
    if bar.high >= tp {
        return Some(ExitSignal::take_profit(ExitType::TakeProfit, tp, pos));
    }
    None
}

/// Step 5: forced exits, filled at the close. First match wins in the order
/// time, weakness, loss limit, momentum loss.
pub fn forced_exit(
    pos: &Position,
    row: &FeatureRow,
    holding_days: i64,
    regime: Regime,
    cfg: &EngineConfig,
) -> Option<ExitSignal> {
    let close = row.close();
    let profit = pos.profit_pct(close);
    let params = cfg.regime_params(regime);

    let extended = regime == Regime::Bull
        && holding_days >= cfg.extended_hold.min_holding_days
        && profit > cfg.extended_hold.min_profit;
    if holding_days >= params.max_hold_days && !extended {
        return Some(ExitSignal::full(ExitType::MaxHold, close));
    }

    if row.rsi_14 < cfg.weakness.rsi_max && row.mfi_14 < cfg.weakness.mfi_max && row.obv < row.obv_prev
    {
        return Some(ExitSignal::full(ExitType::Weakness, close));
    }

    if profit < params.loss_exit {
        return Some(ExitSignal::full(ExitType::LossLimit, close));
    }

    if regime == Regime::Sideway && row.sma_5 < row.sma_50 && profit < cfg.momentum_loss_max_profit {
        return Some(ExitSignal::full(ExitType::MomentumLoss, close));
    }

    None
}

/// Steps 2 to 5 for a position that has already been ratcheted.
///
/// Price triggers only apply once the minimum holding period is met.
pub fn detect_exit(
    pos: &Position,
    row: &FeatureRow,
    holding_days: i64,
    regime: Regime,
    cfg: &EngineConfig,
) -> Option<ExitSignal> {
    if holding_days >= cfg.min_holding_days {
        let (tp, sl) = effective_levels(pos, row, regime);
        if let Some(signal) = price_trigger(pos, &row.bar, tp, sl) {
            return Some(signal);
        }
    }
    forced_exit(pos, row, holding_days, regime, cfg)
}
