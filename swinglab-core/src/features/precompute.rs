//! Per-ticker indicator precomputation.
//!
//! Every series is computed once over a ticker's full, date-sorted history
//! and indexed by bar position afterwards.

use crate::domain::Bar;
use crate::indicators::bollinger::bollinger_bands;
use crate::indicators::ema::macd_series;
use crate::indicators::volume::spike_ratio;
use crate::indicators::{Adx, Atr, Indicator, Mfi, Obv, Rsi, Sma, VolumeMa};

pub const SMA_SHORT: usize = 5;
pub const SMA_MID: usize = 50;
pub const SMA_LONG: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLL_PERIOD: usize = 20;
pub const BOLL_MULT: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const VOLUME_PERIOD: usize = 20;
pub const MFI_PERIOD: usize = 14;

/// Bars before this index never carry a complete long average.
pub const MIN_HISTORY: usize = SMA_LONG - 1;

/// All indicator series for one ticker, aligned with its bars.
#[derive(Debug, Clone)]
pub struct TickerSeries {
    pub sma_5: Vec<f64>,
    pub sma_50: Vec<f64>,
    pub sma_200: Vec<f64>,
    pub rsi_14: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub boll_upper: Vec<f64>,
    pub boll_lower: Vec<f64>,
    pub boll_width: Vec<f64>,
    pub atr_14: Vec<f64>,
    pub adx_14: Vec<f64>,
    pub volume_ma20: Vec<f64>,
    pub volume_spike: Vec<f64>,
    pub mfi_14: Vec<f64>,
    pub obv: Vec<f64>,
}

impl TickerSeries {
    pub fn compute(bars: &[Bar]) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let (macd, macd_signal) = macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let (boll_upper, _, boll_lower, boll_width) =
            bollinger_bands(&closes, BOLL_PERIOD, BOLL_MULT);
        let volume_ma20 = VolumeMa::new(VOLUME_PERIOD).compute(bars);
        let volume_spike = spike_ratio(bars, &volume_ma20);

        let series = Self {
            sma_5: Sma::new(SMA_SHORT).compute(bars),
            sma_50: Sma::new(SMA_MID).compute(bars),
            sma_200: Sma::new(SMA_LONG).compute(bars),
            rsi_14: Rsi::new(RSI_PERIOD).compute(bars),
            macd,
            macd_signal,
            boll_upper,
            boll_lower,
            boll_width,
            atr_14: Atr::new(ATR_PERIOD).compute(bars),
            adx_14: Adx::new(ADX_PERIOD).compute(bars),
            volume_ma20,
            volume_spike,
            mfi_14: Mfi::new(MFI_PERIOD).compute(bars),
            obv: Obv.compute(bars),
        };
        debug_assert_eq!(series.sma_200.len(), bars.len());
        series
    }

    /// OBV of the previous bar; NaN at the first bar.
    pub fn obv_prev(&self, i: usize) -> f64 {
        if i == 0 {
            f64::NAN
        } else {
            self.obv[i - 1]
        }
    }
}
