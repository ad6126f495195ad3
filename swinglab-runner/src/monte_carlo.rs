//! Monte Carlo drawdown projection.
//!
//! Resamples the run's daily returns with replacement into synthetic paths
//! of `horizon` sessions and reports the drawdown distribution. Seeded, so a
//! given config always projects the same numbers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::metrics::{daily_returns, max_drawdown};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub enabled: bool,
    pub simulations: usize,
    /// Sessions per simulated path.
    pub horizon: usize,
    pub seed: u64,
    /// Reported drawdown quantile, in (0, 1).
    pub percentile: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            simulations: 1000,
            horizon: 252,
            seed: 42,
            percentile: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub simulations: usize,
    pub horizon: usize,
    pub seed: u64,
    pub percentile: f64,
    /// Max drawdown at `percentile` across paths (positive fraction).
    pub drawdown_at_percentile: f64,
    pub median_drawdown: f64,
    pub worst_drawdown: f64,
    /// Median terminal return across paths.
    pub median_return: f64,
    /// Daily returns the paths were drawn from.
    pub sample_size: usize,
}

/// Project drawdowns from an equity curve. `None` when there are no returns
/// to draw from or no simulations requested.
pub fn project_drawdowns(curve: &[f64], config: &MonteCarloConfig) -> Option<MonteCarloResult> {
    let returns = daily_returns(curve);
    if returns.is_empty() || config.simulations == 0 || config.horizon == 0 {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut drawdowns = Vec::with_capacity(config.simulations);
    let mut terminal = Vec::with_capacity(config.simulations);
    let mut path = Vec::with_capacity(config.horizon + 1);

    for _ in 0..config.simulations {
        path.clear();
        path.push(1.0);
        let mut value = 1.0;
        for _ in 0..config.horizon {
            value *= 1.0 + returns[rng.gen_range(0..returns.len())];
            path.push(value);
        }
        drawdowns.push(max_drawdown(&path));
        terminal.push(value - 1.0);
    }

    drawdowns.sort_by(f64::total_cmp);
    terminal.sort_by(f64::total_cmp);

    Some(MonteCarloResult {
        simulations: config.simulations,
        horizon: config.horizon,
        seed: config.seed,
        percentile: config.percentile,
        drawdown_at_percentile: percentile_sorted(&drawdowns, config.percentile),
        median_drawdown: percentile_sorted(&drawdowns, 0.5),
        worst_drawdown: drawdowns.last().copied().unwrap_or(0.0),
        median_return: percentile_sorted(&terminal, 0.5),
        sample_size: returns.len(),
    })
}

/// Linear-interpolated quantile `q` in [0, 1] of an ascending slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
