//! Regime classifier — maps a market snapshot to Bull / Sideway / Bear.
//!
//! Pure and deterministic. Thresholds are configuration; three named presets
//! cover the threshold sets in use.

use serde::{Deserialize, Serialize};

use crate::domain::{MarketSnapshot, Regime};

/// Closed or open RSI band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiBand {
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
}

fn default_inclusive() -> bool {
    true
}

impl RsiBand {
    pub fn contains(&self, rsi: f64) -> bool {
        if self.inclusive {
            rsi >= self.min && rsi <= self.max
        } else {
            rsi > self.min && rsi < self.max
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// Bull requires rsi strictly above this.
    pub bull_rsi_min: f64,
    /// Sideway requires adx strictly below this.
    pub sideway_adx_max: f64,
    /// Sideway requires Bollinger width strictly below this.
    pub sideway_boll_width_max: f64,
    pub sideway_rsi: RsiBand,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self::canonical()
    }
}

impl RegimeThresholds {
    pub fn canonical() -> Self {
        Self {
            bull_rsi_min: 55.0,
            sideway_adx_max: 25.0,
            sideway_boll_width_max: 0.35,
            sideway_rsi: RsiBand {
                min: 35.0,
                max: 60.0,
                inclusive: true,
            },
        }
    }

    /// Looser bull entry, tighter trend filter.
    pub fn engine() -> Self {
        Self {
            bull_rsi_min: 50.0,
            sideway_adx_max: 20.0,
            sideway_boll_width_max: 0.4,
            sideway_rsi: RsiBand {
                min: 40.0,
                max: 60.0,
                inclusive: true,
            },
        }
    }

    /// Thresholds used when screening the latest session.
    pub fn live() -> Self {
        Self {
            bull_rsi_min: 55.0,
            sideway_adx_max: 25.0,
            sideway_boll_width_max: 0.3,
            sideway_rsi: RsiBand {
                min: 40.0,
                max: 60.0,
                inclusive: false,
            },
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "canonical" => Some(Self::canonical()),
            "engine" => Some(Self::engine()),
            "live" => Some(Self::live()),
            _ => None,
        }
    }

    pub fn classify(&self, m: &MarketSnapshot) -> Regime {
        if !m.is_complete() {
            return Regime::Bear;
        }
        if m.close > m.ma50 && m.close > m.ma200 && m.rsi > self.bull_rsi_min {
            Regime::Bull
        } else if m.adx < self.sideway_adx_max
            && m.boll_width < self.sideway_boll_width_max
            && self.sideway_rsi.contains(m.rsi)
        {
            Regime::Sideway
        } else {
            Regime::Bear
        }
    }
}

/// Classify with the canonical thresholds.
pub fn classify(m: &MarketSnapshot) -> Regime {
    RegimeThresholds::canonical().classify(m)
}
