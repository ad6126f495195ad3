//! Liquidity cap — the largest order a session's volume can absorb.
//!
//! Orders above `volume * max_participation` are not partially filled: entries
//! are skipped and exits are deferred to a later open.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPolicy {
    /// Maximum participation as a fraction of session volume.
    pub max_participation: f64,
}

impl Default for LiquidityPolicy {
    fn default() -> Self {
        Self {
            max_participation: 0.1,
        }
    }
}

impl LiquidityPolicy {
    pub fn new(max_participation: f64) -> Self {
        Self { max_participation }
    }

    pub fn max_shares(&self, volume: f64) -> f64 {
        volume * self.max_participation
    }

    /// True when the session can absorb `shares`. A session without volume
    /// absorbs nothing.
    pub fn absorbs(&self, shares: u64, volume: f64) -> bool {
        volume.is_finite() && volume > 0.0 && shares as f64 <= self.max_shares(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_participation() {
        let p = LiquidityPolicy::default();
        assert!(p.absorbs(1_000, 10_000.0));
        assert!(!p.absorbs(1_100, 10_000.0));
    }

    #[test]
    fn zero_volume_absorbs_nothing() {
        let p = LiquidityPolicy::default();
        assert!(!p.absorbs(100, 0.0));
        assert!(!p.absorbs(100, f64::NAN));
    }
}
