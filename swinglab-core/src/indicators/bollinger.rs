//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! Four outputs (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper / Lower: middle +/- mult * stddev(close, period)
//! - Width: (upper - lower) / middle
//!
//! Uses sample stddev (divide by N - 1).
//! Lookback: period - 1.

use super::{rolling_mean, rolling_sample_std, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    Width,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
            BollingerBand::Width => "width",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Upper)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Lower)
    }

    pub fn width(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Width)
    }
}

/// All bands at once: (upper, middle, lower, width).
pub fn bollinger_bands(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = rolling_mean(closes, period);
    let std = rolling_sample_std(closes, period);
    let n = closes.len();
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    let mut width = vec![f64::NAN; n];
    for i in 0..n {
        if middle[i].is_nan() || std[i].is_nan() {
            continue;
        }
        upper[i] = middle[i] + multiplier * std[i];
        lower[i] = middle[i] - multiplier * std[i];
        if middle[i] != 0.0 {
            width[i] = (upper[i] - lower[i]) / middle[i];
        }
    }
    (upper, middle, lower, width)
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let (upper, middle, lower, width) = bollinger_bands(&closes, self.period, self.multiplier);
        match self.band {
            BollingerBand::Upper => upper,
            BollingerBand::Middle => middle,
            BollingerBand::Lower => lower,
            BollingerBand::Width => width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn flat_series_collapses_bands() {
        let bars = make_bars(&[50.0; 25]);
        let width = Bollinger::width(20, 2.0).compute(&bars);
        let upper = Bollinger::upper(20, 2.0).compute(&bars);
        assert!(width[18].is_nan());
        assert_approx(width[19], 0.0, DEFAULT_EPSILON);
        assert_approx(upper[24], 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bands_use_sample_std() {
        // closes 1..=4: mean 2.5, sample var = 5/3
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let sd = (5.0_f64 / 3.0).sqrt();
        let upper = Bollinger::upper(4, 2.0).compute(&bars);
        let lower = Bollinger::lower(4, 2.0).compute(&bars);
        let width = Bollinger::width(4, 2.0).compute(&bars);
        assert_approx(upper[3], 2.5 + 2.0 * sd, DEFAULT_EPSILON);
        assert_approx(lower[3], 2.5 - 2.0 * sd, DEFAULT_EPSILON);
        assert_approx(width[3], 4.0 * sd / 2.5, DEFAULT_EPSILON);
    }
}
