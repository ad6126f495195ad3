//! Performance metrics — pure functions of the equity curve and trade log.
//!
//! Ratios that divide by zero are reported as infinity, which serializes as
//! the string `"inf"` so JSON stays valid.

use serde::{Deserialize, Serialize};

use swinglab_core::domain::{EquitySample, Trade};

/// Trading sessions per year for annualizing daily ratios.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(with = "non_finite")]
    pub total_return: f64,
    #[serde(with = "non_finite")]
    pub cagr: f64,
    #[serde(with = "non_finite")]
    pub sharpe: f64,
    #[serde(with = "non_finite")]
    pub sortino: f64,
    /// Positive fraction (0.15 = 15% peak-to-trough).
    #[serde(with = "non_finite")]
    pub max_drawdown: f64,
    #[serde(with = "non_finite")]
    pub calmar: f64,
    #[serde(with = "non_finite")]
    pub win_rate: f64,
    #[serde(with = "non_finite")]
    pub avg_holding_days: f64,
    #[serde(with = "non_finite")]
    pub profit_factor: f64,
    pub trade_count: usize,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Compute every metric. `initial_capital` is the equity before the
    /// first sample.
    pub fn compute(equity: &[EquitySample], trades: &[Trade], initial_capital: f64) -> Self {
        let curve = with_start(equity, initial_capital);
        let years = years_spanned(equity);
        let cagr = cagr(&curve, years);
        let max_drawdown = max_drawdown(&curve);
        Self {
            total_return: total_return(&curve),
            cagr,
            sharpe: sharpe_ratio(&curve),
            sortino: sortino_ratio(&curve),
            max_drawdown,
            calmar: calmar_ratio(cagr, max_drawdown),
            win_rate: win_rate(trades),
            avg_holding_days: avg_holding_days(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            max_consecutive_wins: max_consecutive(trades, Trade::is_winner),
            max_consecutive_losses: max_consecutive(trades, Trade::is_loser),
        }
    }

    /// Flat key/value view, in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_return", fmt_f64(self.total_return)),
            ("cagr", fmt_f64(self.cagr)),
            ("sharpe", fmt_f64(self.sharpe)),
            ("sortino", fmt_f64(self.sortino)),
            ("max_drawdown", fmt_f64(self.max_drawdown)),
            ("calmar", fmt_f64(self.calmar)),
            ("win_rate", fmt_f64(self.win_rate)),
            ("avg_holding_days", fmt_f64(self.avg_holding_days)),
            ("profit_factor", fmt_f64(self.profit_factor)),
            ("trade_count", self.trade_count.to_string()),
            ("max_consecutive_wins", self.max_consecutive_wins.to_string()),
            ("max_consecutive_losses", self.max_consecutive_losses.to_string()),
        ]
    }
}

/// `inf`, `-inf`, `nan`, or the plain decimal value.
pub fn fmt_f64(v: f64) -> String {
    if v.is_nan() {
        "nan".into()
    } else if v == f64::INFINITY {
        "inf".into()
    } else if v == f64::NEG_INFINITY {
        "-inf".into()
    } else {
        format!("{v}")
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Prepend the starting capital to the sampled equity values.
pub fn with_start(equity: &[EquitySample], initial_capital: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(equity.len() + 1);
    curve.push(initial_capital);
    curve.extend(equity.iter().map(|s| s.total_equity));
    curve
}

/// Calendar years between the first and last sample (365.25-day years).
pub fn years_spanned(equity: &[EquitySample]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(a), Some(b)) => (b.date - a.date).num_days() as f64 / 365.25,
        _ => 0.0,
    }
}

/// (final - initial) / initial.
pub fn total_return(curve: &[f64]) -> f64 {
    match (curve.first(), curve.last()) {
        (Some(&initial), Some(&last)) if curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth rate over `years`. Zero for a span under one day.
pub fn cagr(curve: &[f64], years: f64) -> f64 {
    let (Some(&initial), Some(&last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    if years <= 0.0 || initial <= 0.0 {
        return 0.0;
    }
    if last <= 0.0 {
        return -1.0;
    }
    (last / initial).powf(1.0 / years) - 1.0
}

/// mean / sample std of period returns, annualized by √252. Zero when flat.
pub fn sharpe_ratio(curve: &[f64]) -> f64 {
    let returns = daily_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * PERIODS_PER_YEAR.sqrt()
}

/// Like Sharpe, with downside deviation in the denominator. Zero when no
/// period lost money.
pub fn sortino_ratio(curve: &[f64]) -> f64 {
    let returns = daily_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * PERIODS_PER_YEAR.sqrt()
}

/// Largest peak-to-trough decline as a positive fraction.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &eq in curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            worst = worst.max((peak - eq) / peak);
        }
    }
    worst
}

/// CAGR / max drawdown; infinite when there was no drawdown.
pub fn calmar_ratio(cagr: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return f64::INFINITY;
    }
    cagr / max_drawdown
}

pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn avg_holding_days(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.holding_days as f64).sum::<f64>() / trades.len() as f64
}

/// Gross profit / gross loss: zero with no trades, infinite with no losses.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.profit > 0.0).map(|t| t.profit).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.profit < 0.0).map(|t| -t.profit).sum();
    if gross_loss == 0.0 {
        return f64::INFINITY;
    }
    gross_profit / gross_loss
}

/// Longest run of consecutive trades matching `pred`, in log order.
pub fn max_consecutive(trades: &[Trade], pred: fn(&Trade) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if pred(trade) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Period-over-period returns. A non-positive base yields 0 for that period.
pub fn daily_returns(curve: &[f64]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Serde adapter: finite values as numbers, the rest as `"inf"`, `"-inf"`
/// or `"nan"`.
pub mod non_finite {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_f64(*v)
        } else {
            s.serialize_str(&super::fmt_f64(*v))
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Num(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("expected a number or \"inf\", got {other:?}"))),
            },
        }
    }
}
