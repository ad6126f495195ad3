//! Volume-based indicators: volume mean, volume spike ratio, OBV, MFI.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

/// Rolling mean of volume.
#[derive(Debug, Clone)]
pub struct VolumeMa {
    period: usize,
    name: String,
}

impl VolumeMa {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume MA period must be >= 1");
        Self {
            period,
            name: format!("volume_ma{period}"),
        }
    }
}

impl Indicator for VolumeMa {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        rolling_mean(&volumes, self.period)
    }
}

/// Today's volume relative to its rolling mean. Zero when the mean is zero.
#[derive(Debug, Clone)]
pub struct VolumeSpike {
    ma: VolumeMa,
    name: String,
}

impl VolumeSpike {
    pub fn new(period: usize) -> Self {
        Self {
            ma: VolumeMa::new(period),
            name: format!("volume_spike_{period}"),
        }
    }
}

/// Spike ratios for a precomputed volume mean.
pub fn spike_ratio(bars: &[Bar], volume_ma: &[f64]) -> Vec<f64> {
    bars.iter()
        .zip(volume_ma)
        .map(|(bar, &ma)| {
            if ma.is_nan() {
                f64::NAN
            } else if ma == 0.0 {
                0.0
            } else {
                bar.volume / ma
            }
        })
        .collect()
}

impl Indicator for VolumeSpike {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.ma.lookback()
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        spike_ratio(bars, &self.ma.compute(bars))
    }
}

/// On-balance volume, starting from zero at the first bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut out = Vec::with_capacity(bars.len());
        let mut acc = 0.0;
        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                let prev = bars[i - 1].close;
                if bar.close > prev {
                    acc += bar.volume;
                } else if bar.close < prev {
                    acc -= bar.volume;
                }
            }
            out.push(acc);
        }
        out
    }
}

/// Money Flow Index over `period` typical-price changes.
///
/// Raw flow = typical price * volume, classified positive or negative by the
/// direction of the typical price. 100 when there is no negative flow.
#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    name: String,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "MFI period must be >= 1");
        Self {
            period,
            name: format!("mfi_{period}"),
        }
    }
}

impl Indicator for Mfi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let mut positive = vec![0.0; n];
        let mut negative = vec![0.0; n];
        let mut valid = vec![false; n];
        for i in 1..n {
            let tp = bars[i].typical_price();
            let prev = bars[i - 1].typical_price();
            let flow = tp * bars[i].volume;
            if tp.is_nan() || prev.is_nan() || flow.is_nan() {
                continue;
            }
            valid[i] = true;
            if tp > prev {
                positive[i] = flow;
            } else if tp < prev {
                negative[i] = flow;
            }
        }

        for i in self.period..n {
            let window = (i + 1 - self.period)..=i;
            if !valid[window.clone()].iter().all(|&v| v) {
                continue;
            }
            let pos: f64 = positive[window.clone()].iter().sum();
            let neg: f64 = negative[window].iter().sum();
            result[i] = if neg == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + pos / neg)
            };
        }
        result
    }
}
