//! Volatility regime detection
//!
//! Tracks an EWMA of volatility and a slower EWMA of absolute changes in
//! volatility (vol-of-vol). When vol-of-vol exceeds a configurable
//! multiple of the volatility baseline the recent statistics are
//! unreliable and signals should be gated.

use super::ewma::EwmaStats;
use super::isqrt;
use crate::core::PRICE_SCALE;

/// Market regime classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarketRegime {
    /// Not enough history to classify
    Unknown = 0,
    /// Calm market
    LowVol = 1,
    /// Normal conditions
    Normal = 2,
    /// Elevated volatility
    HighVol = 3,
    /// Vol-of-vol spike: statistics unreliable, gate signals
    RegimeChange = 4,
}

/// Volatility regime detector
#[derive(Debug, Clone)]
pub struct VolRegimeDetector {
    /// EWMA of volatility (sqrt of the variance observations)
    vol_ewma: EwmaStats,
    /// Slower EWMA of |delta vol|
    vol_of_vol_ewma: EwmaStats,
    /// Regime-change threshold as a multiple of baseline vol, price-scaled
    threshold_scaled: i64,
    last_vol: i64,
}

impl VolRegimeDetector {
    /// High-vol classification boundary (raw volatility)
    const HIGH_VOL: i64 = 2 * PRICE_SCALE;
    /// Low-vol classification boundary (raw volatility)
    const LOW_VOL: i64 = PRICE_SCALE / 2;

    pub fn with_half_life(half_life: u32) -> Self {
        Self {
            vol_ewma: EwmaStats::with_half_life(half_life),
            // Vol-of-vol decays at half the rate so it stays a baseline
            vol_of_vol_ewma: EwmaStats::with_half_life(half_life * 2),
            threshold_scaled: 2 * PRICE_SCALE,
            last_vol: 0,
        }
    }

    /// Override the regime-change multiple (price-scaled; 2x by default)
    pub fn set_threshold(&mut self, multiple_scaled: i64) {
        self.threshold_scaled = multiple_scaled;
    }

    /// Feed a new variance observation; returns true while in regime change
    #[inline]
    pub fn update(&mut self, variance: i128) -> bool {
        let vol = isqrt(variance);
        self.vol_ewma.update(vol);

        if self.last_vol > 0 {
            let vol_change = (vol - self.last_vol).abs();
            self.vol_of_vol_ewma.update(vol_change);
        }
        self.last_vol = vol;

        self.is_regime_change()
    }

    /// Vol-of-vol elevated beyond the threshold multiple of baseline vol
    pub fn is_regime_change(&self) -> bool {
        if !self.vol_of_vol_ewma.is_ready() {
            return false;
        }

        let vol_of_vol = self.vol_of_vol_ewma.mean();
        let baseline = self.vol_ewma.mean();
        if baseline <= 0 {
            return false;
        }

        vol_of_vol as i128 > self.threshold_scaled as i128 * baseline as i128 / PRICE_SCALE as i128
    }

    /// Classify the current regime
    pub fn regime(&self) -> MarketRegime {
        if !self.vol_ewma.is_ready() {
            return MarketRegime::Unknown;
        }
        if self.is_regime_change() {
            return MarketRegime::RegimeChange;
        }
        let vol = self.current_vol();
        if vol > Self::HIGH_VOL {
            MarketRegime::HighVol
        } else if vol < Self::LOW_VOL {
            MarketRegime::LowVol
        } else {
            MarketRegime::Normal
        }
    }

    /// Current volatility estimate
    pub fn current_vol(&self) -> i64 {
        self.vol_ewma.mean()
    }

    /// Current vol-of-vol estimate
    pub fn vol_of_vol(&self) -> i64 {
        self.vol_of_vol_ewma.mean()
    }
}
