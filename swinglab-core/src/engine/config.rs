//! Engine configuration — every threshold the daily loop and the position
//! book consult. Defaults reproduce the canonical strategy.

use serde::{Deserialize, Serialize};

use super::EngineError;
use crate::book::{CostModel, LiquidityPolicy};
use crate::domain::Regime;
use crate::ledger::CapitalMode;
use crate::regime::RegimeThresholds;
use crate::screener::ScreenerConfig;

/// Per-regime sizing and exit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeParams {
    /// Scales both the slot count and the per-slot allocation.
    pub position_multiplier: f64,
    pub max_hold_days: i64,
    /// Forced exit when unrealized return falls below this (negative).
    pub loss_exit: f64,
    /// Entry take-profit / stop-loss distance in ATRs.
    pub atr_multiplier: f64,
    pub pyramid_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeTable {
    pub bull: RegimeParams,
    pub sideway: RegimeParams,
    pub bear: RegimeParams,
}

impl Default for RegimeTable {
    fn default() -> Self {
        Self {
            bull: RegimeParams {
                position_multiplier: 1.2,
                max_hold_days: 45,
                loss_exit: -0.10,
                atr_multiplier: 2.0,
                pyramid_limit: 2,
            },
            sideway: RegimeParams {
                position_multiplier: 0.5,
                max_hold_days: 20,
                loss_exit: -0.03,
                atr_multiplier: 1.2,
                pyramid_limit: 1,
            },
            bear: RegimeParams {
                position_multiplier: 0.0,
                max_hold_days: 15,
                loss_exit: -0.12,
                atr_multiplier: 2.2,
                pyramid_limit: 1,
            },
        }
    }
}

impl RegimeTable {
    pub fn get(&self, regime: Regime) -> &RegimeParams {
        match regime {
            Regime::Bull => &self.bull,
            Regime::Sideway => &self.sideway,
            Regime::Bear => &self.bear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalConfig {
    pub initial_capital: f64,
    pub base_capital: f64,
    pub mode: CapitalMode,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000_000.0,
            base_capital: 1_000_000_000.0,
            mode: CapitalMode::Vault,
        }
    }
}

/// Adding to a winner in a Bull market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidRules {
    pub min_holding_days: i64,
    pub max_holding_days: i64,
    /// Exclusive profit band.
    pub min_profit: f64,
    pub max_profit: f64,
    /// Added shares as a fraction of the current holding.
    pub add_fraction: f64,
    /// Take-profit is raised to at least close * this.
    pub tp_multiplier: f64,
    /// Trailing stop proposed at close * (1 - trailing_pct * this).
    pub trailing_tighten: f64,
}

impl Default for PyramidRules {
    fn default() -> Self {
        Self {
            min_holding_days: 2,
            max_holding_days: 10,
            min_profit: 0.05,
            max_profit: 0.10,
            add_fraction: 0.2,
            tp_multiplier: 1.12,
            trailing_tighten: 0.7,
        }
    }
}

/// Bull-market override that suspends the max-hold exit for a strong winner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedHold {
    pub min_holding_days: i64,
    pub min_profit: f64,
}

impl Default for ExtendedHold {
    fn default() -> Self {
        Self {
            min_holding_days: 50,
            min_profit: 0.08,
        }
    }
}

/// Oversold with money leaving: rsi < rsi_max, mfi < mfi_max, OBV falling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaknessRules {
    pub rsi_max: f64,
    pub mfi_max: f64,
}

impl Default for WeaknessRules {
    fn default() -> Self {
        Self {
            rsi_max: 30.0,
            mfi_max: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub capital: CapitalConfig,
    pub costs: CostModel,
    pub liquidity: LiquidityPolicy,
    pub lot_size: u64,
    pub max_open_positions: usize,
    /// Entry size cap as a fraction of the 20-day mean volume.
    pub trade_limit_pct: f64,
    /// Entry size cap as a fraction of the sizing base.
    pub max_investment_pct: f64,
    pub allocation_boost: f64,
    /// Boost applies when more than this many slots are open.
    pub allocation_boost_min_slots: usize,
    pub trailing_pct: f64,
    pub partial_fraction: f64,
    /// Calendar days before any exit may fire.
    pub min_holding_days: i64,
    /// Take-profit step after a partial exit: fill * tp_step.
    pub tp_step: f64,
    pub pyramid: PyramidRules,
    pub extended_hold: ExtendedHold,
    pub weakness: WeaknessRules,
    /// Sideway momentum-loss exit fires below this unrealized return.
    pub momentum_loss_max_profit: f64,
    pub regimes: RegimeTable,
    pub regime: RegimeThresholds,
    pub screener: ScreenerConfig,
    /// Sample equity every n-th date (the last date is always sampled).
    pub equity_stride: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capital: CapitalConfig::default(),
            costs: CostModel::default(),
            liquidity: LiquidityPolicy::default(),
            lot_size: 100,
            max_open_positions: 8,
            trade_limit_pct: 0.01,
            max_investment_pct: 0.10,
            allocation_boost: 1.1,
            allocation_boost_min_slots: 2,
            trailing_pct: 0.05,
            partial_fraction: 0.4,
            min_holding_days: 2,
            tp_step: 1.15,
            pyramid: PyramidRules::default(),
            extended_hold: ExtendedHold::default(),
            weakness: WeaknessRules::default(),
            momentum_loss_max_profit: 0.01,
            regimes: RegimeTable::default(),
            regime: RegimeThresholds::default(),
            screener: ScreenerConfig::default(),
            equity_stride: 1,
        }
    }
}

fn fraction(name: &str, v: f64, allow_zero: bool) -> Result<(), EngineError> {
    let ok = v.is_finite() && v < 1.0 && if allow_zero { v >= 0.0 } else { v > 0.0 };
    if ok {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!("{name} must be in [0, 1), got {v}")))
    }
}

impl EngineConfig {
    pub fn regime_params(&self, regime: Regime) -> &RegimeParams {
        self.regimes.get(regime)
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));

        if !(self.capital.initial_capital.is_finite() && self.capital.initial_capital > 0.0) {
            return invalid(format!(
                "initial_capital must be positive, got {}",
                self.capital.initial_capital
            ));
        }
        if !(self.capital.base_capital.is_finite() && self.capital.base_capital > 0.0) {
            return invalid(format!(
                "base_capital must be positive, got {}",
                self.capital.base_capital
            ));
        }
        if self.lot_size == 0 {
            return invalid("lot_size must be at least 1".into());
        }
        if self.max_open_positions == 0 {
            return invalid("max_open_positions must be at least 1".into());
        }
        if self.equity_stride == 0 {
            return invalid("equity_stride must be at least 1".into());
        }
        if self.min_holding_days < 0 {
            return invalid(format!(
                "min_holding_days must be >= 0, got {}",
                self.min_holding_days
            ));
        }
        fraction("commission_buy", self.costs.commission_buy, true)?;
        fraction("commission_sell", self.costs.commission_sell, true)?;
        fraction("tax_sell", self.costs.tax_sell, true)?;
        if self.costs.commission_sell + self.costs.tax_sell >= 1.0 {
            return invalid("sell-side costs consume the whole sale".into());
        }
        fraction("trailing_pct", self.trailing_pct, false)?;
        fraction("partial_fraction", self.partial_fraction, false)?;
        fraction("trade_limit_pct", self.trade_limit_pct, false)?;
        if !(self.max_investment_pct > 0.0 && self.max_investment_pct <= 1.0) {
            return invalid(format!(
                "max_investment_pct must be in (0, 1], got {}",
                self.max_investment_pct
            ));
        }
        if !(self.liquidity.max_participation > 0.0 && self.liquidity.max_participation <= 1.0) {
            return invalid(format!(
                "liquidity threshold must be in (0, 1], got {}",
                self.liquidity.max_participation
            ));
        }
        if !(self.tp_step.is_finite() && self.tp_step > 1.0) {
            return invalid(format!("tp_step must exceed 1, got {}", self.tp_step));
        }
        if self.pyramid.min_holding_days > self.pyramid.max_holding_days
            || self.pyramid.min_profit >= self.pyramid.max_profit
        {
            return invalid("pyramid window or profit band is empty".into());
        }
        for regime in Regime::ALL {
            let p = self.regimes.get(regime);
            if !(p.position_multiplier >= 0.0 && p.atr_multiplier > 0.0 && p.max_hold_days > 0) {
                return invalid(format!("regime parameters for {regime} are out of range"));
            }
        }
        Ok(())
    }
}
