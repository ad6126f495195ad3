//! Candidate screener — regime-indexed rule table over one day's rows.
//!
//! Each regime carries a list of typed filters, a weighted score over derived
//! factors, and a candidate cap. Bear never produces candidates.

use std::cmp::Ordering;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::{FeatureRow, Regime};

/// Guard added to the market trend when dividing.
const RS_EPSILON: f64 = 1e-6;

/// Factor values derived from a single row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factors {
    pub relative_strength: f64,
    pub short_momentum: f64,
    pub macd_histogram: f64,
    pub volume_spike: f64,
}

impl Factors {
    pub fn of(row: &FeatureRow) -> Self {
        let c = row.close();
        let stock_trend = (c - row.sma_50) / row.sma_50;
        Self {
            relative_strength: stock_trend / (row.market.trend_over_ma50() + RS_EPSILON),
            short_momentum: (c - row.sma_5) / row.sma_5,
            macd_histogram: row.macd_histogram(),
            volume_spike: row.volume_spike,
        }
    }
}

/// Which long average a fractional filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Average {
    Sma50,
    Sma200,
}

/// A predicate over a row and its factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Filter {
    /// close > sma200, close > sma50, sma50 > sma200.
    TrendAligned,
    /// close > sma5.
    AboveSma5,
    /// min < rsi < max.
    RsiWithin { min: f64, max: f64 },
    MinVolumeSpike {
        min: f64,
        #[serde(default)]
        inclusive: bool,
    },
    MinRelativeStrength { min: f64 },
    MinShortMomentum { min: f64 },
    MinMacdHistogram { min: f64 },
    MaxBollWidth { max: f64 },
    /// atr / close > min.
    MinAtrRatio { min: f64 },
    /// close > fraction * average.
    AboveAverage { average: Average, fraction: f64 },
    /// close > sma50 * (1 + band_fraction * boll_width).
    AboveBollBreakout { band_fraction: f64 },
}

impl Filter {
    pub fn passes(&self, row: &FeatureRow, f: &Factors) -> bool {
        let c = row.close();
        match *self {
            Filter::TrendAligned => c > row.sma_200 && c > row.sma_50 && row.sma_50 > row.sma_200,
            Filter::AboveSma5 => c > row.sma_5,
            Filter::RsiWithin { min, max } => row.rsi_14 > min && row.rsi_14 < max,
            Filter::MinVolumeSpike { min, inclusive } => {
                if inclusive {
                    f.volume_spike >= min
                } else {
                    f.volume_spike > min
                }
            }
            Filter::MinRelativeStrength { min } => f.relative_strength > min,
            Filter::MinShortMomentum { min } => f.short_momentum > min,
            Filter::MinMacdHistogram { min } => f.macd_histogram > min,
            Filter::MaxBollWidth { max } => row.boll_width < max,
            Filter::MinAtrRatio { min } => row.atr_14 / c > min,
            Filter::AboveAverage { average, fraction } => {
                let avg = match average {
                    Average::Sma50 => row.sma_50,
                    Average::Sma200 => row.sma_200,
                };
                c > fraction * avg
            }
            Filter::AboveBollBreakout { band_fraction } => {
                c > row.sma_50 * (1.0 + band_fraction * row.boll_width)
            }
        }
    }
}

/// A scoring term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum Factor {
    RelativeStrength,
    ShortMomentum,
    VolumeSpike,
    MacdHistogram,
    /// center - |rsi - center|; peaks when rsi sits at the center.
    RsiCentering { center: f64 },
    /// (close - sma50) / (sma50 * boll_width).
    BollProximity,
}

impl Factor {
    pub fn value(&self, row: &FeatureRow, f: &Factors) -> f64 {
        match *self {
            Factor::RelativeStrength => f.relative_strength,
            Factor::ShortMomentum => f.short_momentum,
            Factor::VolumeSpike => f.volume_spike,
            Factor::MacdHistogram => f.macd_histogram,
            Factor::RsiCentering { center } => center - (row.rsi_14 - center).abs(),
            Factor::BollProximity => (row.close() - row.sma_50) / (row.sma_50 * row.boll_width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weighted {
    #[serde(flatten)]
    pub factor: Factor,
    pub weight: f64,
}

fn w(factor: Factor, weight: f64) -> Weighted {
    Weighted { factor, weight }
}

/// Filters, score and cap for one regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeRules {
    pub filters: Vec<Filter>,
    pub score: Vec<Weighted>,
    pub candidate_ratio: f64,
    #[serde(default)]
    pub min_candidates: usize,
}

impl RegimeRules {
    pub fn canonical_bull() -> Self {
        Self {
            filters: vec![
                Filter::TrendAligned,
                Filter::RsiWithin { min: 50.0, max: 80.0 },
                Filter::MinVolumeSpike { min: 0.3, inclusive: false },
                Filter::MinRelativeStrength { min: 1.05 },
                Filter::MinShortMomentum { min: 0.01 },
                Filter::AboveSma5,
            ],
            score: vec![
                w(Factor::RelativeStrength, 0.35),
                w(Factor::ShortMomentum, 0.25),
                w(Factor::VolumeSpike, 0.25),
                w(Factor::MacdHistogram, 0.15),
            ],
            candidate_ratio: 1.0,
            min_candidates: 1,
        }
    }

    pub fn canonical_sideway() -> Self {
        Self {
            filters: vec![
                Filter::RsiWithin { min: 48.0, max: 55.0 },
                Filter::MaxBollWidth { max: 0.3 },
                Filter::MinMacdHistogram { min: 0.0 },
                Filter::MinVolumeSpike { min: 1.0, inclusive: true },
                Filter::MinShortMomentum { min: 0.02 },
                Filter::MinAtrRatio { min: 0.02 },
                Filter::AboveAverage { average: Average::Sma50, fraction: 0.95 },
                Filter::AboveAverage { average: Average::Sma200, fraction: 0.95 },
                Filter::AboveBollBreakout { band_fraction: 0.75 },
            ],
            score: vec![
                w(Factor::VolumeSpike, 0.4),
                w(Factor::MacdHistogram, 0.3),
                w(Factor::RsiCentering { center: 55.0 }, 0.2),
                w(Factor::BollProximity, 0.1),
            ],
            candidate_ratio: 0.5,
            min_candidates: 5,
        }
    }

    /// Wider RSI band, no breakout requirement.
    pub fn soft_sideway() -> Self {
        Self {
            filters: vec![
                Filter::RsiWithin { min: 40.0, max: 55.0 },
                Filter::MaxBollWidth { max: 0.3 },
                Filter::MinMacdHistogram { min: 0.0001 },
                Filter::MinVolumeSpike { min: 0.5, inclusive: false },
                Filter::MinShortMomentum { min: 0.025 },
                Filter::AboveAverage { average: Average::Sma50, fraction: 0.95 },
                Filter::AboveAverage { average: Average::Sma200, fraction: 0.95 },
            ],
            score: vec![
                w(Factor::RsiCentering { center: 50.0 }, 0.3),
                w(Factor::VolumeSpike, 0.25),
                w(Factor::MacdHistogram, 0.25),
                w(Factor::BollProximity, 0.2),
            ],
            candidate_ratio: 0.8,
            min_candidates: 5,
        }
    }

    pub fn weight_sum(&self) -> f64 {
        self.score.iter().map(|t| t.weight).sum()
    }

    pub fn cap(&self, max_candidates: usize) -> usize {
        let scaled = (max_candidates as f64 * self.candidate_ratio).floor().max(0.0) as usize;
        scaled.max(self.min_candidates)
    }

    fn score(&self, row: &FeatureRow, f: &Factors) -> f64 {
        self.score.iter().map(|t| t.weight * t.factor.value(row, f)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub bull: RegimeRules,
    pub sideway: RegimeRules,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl RuleTable {
    pub fn canonical() -> Self {
        Self {
            bull: RegimeRules::canonical_bull(),
            sideway: RegimeRules::canonical_sideway(),
        }
    }

    pub fn sideway_soft() -> Self {
        Self {
            bull: RegimeRules::canonical_bull(),
            sideway: RegimeRules::soft_sideway(),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "canonical" => Some(Self::canonical()),
            "sideway_soft" => Some(Self::sideway_soft()),
            _ => None,
        }
    }

    pub fn for_regime(&self, regime: Regime) -> Option<&RegimeRules> {
        match regime {
            Regime::Bull => Some(&self.bull),
            Regime::Sideway => Some(&self.sideway),
            Regime::Bear => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub min_volume_ma20: f64,
    pub min_volume: f64,
    pub max_candidates: usize,
    pub rules: RuleTable,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            min_volume_ma20: 200_000.0,
            min_volume: 300_000.0,
            max_candidates: 20,
            rules: RuleTable::canonical(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub ticker: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct CandidateScreener {
    config: ScreenerConfig,
}

impl CandidateScreener {
    pub fn new(config: ScreenerConfig) -> Self {
        for (name, rules) in [("bull", &config.rules.bull), ("sideway", &config.rules.sideway)] {
            let sum = rules.weight_sum();
            if (sum - 1.0).abs() > 1e-9 {
                warn!("{name} score weights sum to {sum:.4}, scores are not on a unit scale");
            }
        }
        Self { config }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Candidate cap for a regime (zero in Bear).
    pub fn cap(&self, regime: Regime) -> usize {
        self.config
            .rules
            .for_regime(regime)
            .map_or(0, |r| r.cap(self.config.max_candidates))
    }

    fn liquid(&self, row: &FeatureRow) -> bool {
        row.volume_ma20 > self.config.min_volume_ma20 && row.bar.volume > self.config.min_volume
    }

    /// Rank one day's rows. Ties keep the input order.
    pub fn screen(&self, rows: &[FeatureRow], regime: Regime) -> Vec<Candidate> {
        let Some(rules) = self.config.rules.for_regime(regime) else {
            return Vec::new();
        };

        let mut candidates: Vec<Candidate> = rows
            .iter()
            .filter(|row| self.liquid(row))
            .filter_map(|row| {
                let f = Factors::of(row);
                if !rules.filters.iter().all(|flt| flt.passes(row, &f)) {
                    return None;
                }
                let score = rules.score(row, &f);
                score.is_finite().then(|| Candidate {
                    ticker: row.ticker().to_string(),
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(rules.cap(self.config.max_candidates));
        candidates
    }
}
