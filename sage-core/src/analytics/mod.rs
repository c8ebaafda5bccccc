//! Per-symbol analytics: O(1) statistics, regime detection, signal gating
//!
//! For each tick the engine updates rolling and exponentially-weighted
//! statistics in O(1), classifies the volatility regime, winsorizes the
//! resulting z-scores and emits a mean-reversion signal when the deviation
//! is meaningful and the regime is stable. Analytics never fails; it can
//! only suppress output, and every suppression is counted.

pub mod engine;
pub mod ewma;
pub mod regime;
pub mod rolling;
pub mod window;
pub mod winsor;

pub use engine::{AnalyticsConfig, AnalyticsEngine, AnalyticsMetrics, MAX_SYMBOLS};
pub use ewma::EwmaStats;
pub use regime::{MarketRegime, VolRegimeDetector};
pub use rolling::RollingStats;
pub use window::TickWindow;
pub use winsor::ZScoreCap;

/// Newton-Raphson integer square root
///
/// Deterministic (no floating point) and converges in a handful of
/// iterations for the magnitudes the statistics produce. The 128-bit
/// domain matches the variance accumulators.
#[inline]
pub(crate) fn isqrt(n: i128) -> i64 {
    if n <= 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x as i64
}

#[cfg(test)]
mod tests {
    use super::isqrt;

    #[test]
    fn test_isqrt_exact_squares() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(144), 12);
        assert_eq!(isqrt(1_000_000_000_000), 1_000_000);
    }

    #[test]
    fn test_isqrt_truncates() {
        assert_eq!(isqrt(2), 1);
        assert_eq!(isqrt(8), 2);
        assert_eq!(isqrt(99), 9);
    }

    #[test]
    fn test_isqrt_negative_is_zero() {
        assert_eq!(isqrt(-5), 0);
    }

    #[test]
    fn test_isqrt_wide_domain() {
        // Larger than i64 - the accumulators can get here
        let n: i128 = (3_000_000_007_i128) * (3_000_000_007_i128);
        assert_eq!(isqrt(n), 3_000_000_007);
    }
}
