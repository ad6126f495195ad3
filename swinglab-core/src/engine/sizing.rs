//! Entry sizing — slot count, per-trade budget, share count.

use crate::domain::Regime;

use super::config::EngineConfig;

/// New positions allowed today.
///
/// Free slots scaled by the regime multiplier; halved again in Bear.
pub fn entry_slots(cfg: &EngineConfig, regime: Regime, open_positions: usize) -> usize {
    let free = cfg.max_open_positions.saturating_sub(open_positions);
    let multiplier = cfg.regime_params(regime).position_multiplier;
    let slots = (free as f64 * multiplier).floor().max(0.0) as usize;
    if regime == Regime::Bear {
        slots / 2
    } else {
        slots
    }
}

/// Cash budget for one entry.
pub fn entry_budget(
    cfg: &EngineConfig,
    regime: Regime,
    slots: usize,
    working_capital: f64,
    sizing_base: f64,
) -> f64 {
    if slots == 0 {
        return 0.0;
    }
    let multiplier = cfg.regime_params(regime).position_multiplier;
    let boost = if slots > cfg.allocation_boost_min_slots {
        cfg.allocation_boost
    } else {
        1.0
    };
    let per_slot = working_capital / slots as f64 * multiplier * boost;
    per_slot.min(sizing_base * cfg.max_investment_pct).max(0.0)
}

/// Shares bought with `budget` at `price`, capped by the 20-day mean volume
/// and rounded down to the lot. Zero when the inputs are unusable.
pub fn entry_shares(cfg: &EngineConfig, budget: f64, price: f64, volume_ma20: f64) -> u64 {
    if !(price.is_finite() && price > 0.0 && budget.is_finite() && budget > 0.0) {
        return 0;
    }
    let by_budget = budget / (1.0 + cfg.costs.commission_buy) / price;
    let by_volume = if volume_ma20.is_finite() {
        volume_ma20 * cfg.trade_limit_pct
    } else {
        0.0
    };
    let lot = cfg.lot_size.max(1);
    let raw = by_budget.min(by_volume).max(0.0);
    (raw / lot as f64).floor() as u64 * lot
}
