//! Deterministic fixed-point arithmetic for prices and quantities
//!
//! Format: `i64` scaled by 10^8 (eight decimal places).
//! Range: ±92,233,720,368.54775807 in the decimal domain.
//!
//! Multiplication and division run through a 128-bit intermediate and
//! truncate toward zero, so results are bit-identical across platforms.
//! Addition and subtraction wrap in the 64-bit domain; callers keep values
//! inside the safe envelope (the ingress validator enforces this at the
//! edge). Division by zero is a contract violation and panics - the core
//! does not mask it.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Scale factor: 10^8 for 8 decimal places
pub const PRICE_SCALE: i64 = 100_000_000;

/// Signed fixed-point decimal with 8 fractional digits
///
/// `Copy`, 8 bytes, total order. All prices and quantities in the
/// pipeline flow as this type; floating point appears only at the
/// configuration edge and in display paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FixedPoint(i64);

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint(0);
    pub const ONE: FixedPoint = FixedPoint(PRICE_SCALE);
    pub const MAX: FixedPoint = FixedPoint(i64::MAX);
    pub const MIN: FixedPoint = FixedPoint(i64::MIN);

    /// Wrap a raw scaled value
    #[inline(always)]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Create from an integer (multiplied by the scale)
    #[inline(always)]
    pub const fn from_int(i: i64) -> Self {
        Self(i * PRICE_SCALE)
    }

    /// Create from integer and fractional parts
    ///
    /// `from_parts(100, 50_000_000)` is 100.50
    #[inline(always)]
    pub const fn from_parts(integer: i64, decimal: i64) -> Self {
        Self(integer * PRICE_SCALE + decimal)
    }

    /// Create from a float - initialization only, never on the hot path
    #[inline]
    pub fn from_f64(d: f64) -> Self {
        Self((d * PRICE_SCALE as f64) as i64)
    }

    /// Create from a `Decimal` (configuration edge)
    ///
    /// Returns `None` when the value does not fit the fixed-point range.
    pub fn from_decimal(d: Decimal) -> Option<Self> {
        (d * Decimal::from(PRICE_SCALE)).trunc().to_i64().map(Self)
    }

    /// Convert to a float - display only
    #[inline(always)]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }

    /// Integer part (truncated toward zero)
    #[inline(always)]
    pub const fn to_int(self) -> i64 {
        self.0 / PRICE_SCALE
    }

    /// Raw scaled value
    #[inline(always)]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Branchless absolute value
    #[inline(always)]
    pub const fn abs(self) -> Self {
        let mask = self.0 >> 63;
        Self((self.0.wrapping_add(mask)) ^ mask)
    }

    /// Branchless minimum
    #[inline(always)]
    pub const fn min(self, other: Self) -> Self {
        let diff = self.0.wrapping_sub(other.0);
        let mask = diff >> 63;
        Self(other.0.wrapping_add(diff & mask))
    }

    /// Branchless maximum
    #[inline(always)]
    pub const fn max(self, other: Self) -> Self {
        let diff = self.0.wrapping_sub(other.0);
        let mask = diff >> 63;
        Self(self.0.wrapping_sub(diff & mask))
    }

    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline(always)]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Sign as a small integer: +1, 0 or -1
    #[inline(always)]
    pub const fn signum(self) -> i8 {
        self.0.signum() as i8
    }
}

impl Add for FixedPoint {
    type Output = FixedPoint;

    #[inline(always)]
    fn add(self, other: FixedPoint) -> FixedPoint {
        FixedPoint(self.0.wrapping_add(other.0))
    }
}

impl Sub for FixedPoint {
    type Output = FixedPoint;

    #[inline(always)]
    fn sub(self, other: FixedPoint) -> FixedPoint {
        FixedPoint(self.0.wrapping_sub(other.0))
    }
}

impl AddAssign for FixedPoint {
    #[inline(always)]
    fn add_assign(&mut self, other: FixedPoint) {
        self.0 = self.0.wrapping_add(other.0);
    }
}

impl SubAssign for FixedPoint {
    #[inline(always)]
    fn sub_assign(&mut self, other: FixedPoint) {
        self.0 = self.0.wrapping_sub(other.0);
    }
}

impl Neg for FixedPoint {
    type Output = FixedPoint;

    #[inline(always)]
    fn neg(self) -> FixedPoint {
        FixedPoint(self.0.wrapping_neg())
    }
}

impl Mul for FixedPoint {
    type Output = FixedPoint;

    /// Full 128-bit product divided by the scale, truncated toward zero
    #[inline(always)]
    fn mul(self, other: FixedPoint) -> FixedPoint {
        let wide = self.0 as i128 * other.0 as i128;
        FixedPoint((wide / PRICE_SCALE as i128) as i64)
    }
}

impl Div for FixedPoint {
    type Output = FixedPoint;

    /// Dividend widened by the scale into 128 bits, truncated toward zero
    ///
    /// Panics on division by zero - that is a fatal contract violation
    /// upstream, not a condition this layer masks.
    #[inline(always)]
    fn div(self, other: FixedPoint) -> FixedPoint {
        let wide = self.0 as i128 * PRICE_SCALE as i128;
        FixedPoint((wide / other.0 as i128) as i64)
    }
}

impl fmt::Display for FixedPoint {
    /// Renders exactly 8 decimal places - the audit-log wire format
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.abs().0;
        write!(
            f,
            "{}{}.{:08}",
            sign,
            abs / PRICE_SCALE,
            abs % PRICE_SCALE
        )
    }
}

const _: () = assert!(std::mem::size_of::<FixedPoint>() == 8);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_construction() {
        assert_eq!(FixedPoint::ZERO.raw(), 0);
        assert_eq!(FixedPoint::ONE.raw(), PRICE_SCALE);
        assert_eq!(FixedPoint::from_int(5).raw(), 5 * PRICE_SCALE);
        assert_eq!(
            FixedPoint::from_parts(100, 50_000_000).to_f64(),
            100.5
        );
    }

    #[test]
    fn test_f64_round_trip() {
        // Property: from_f64(x).to_f64() within 1e-8 of x in the safe envelope
        for &x in &[0.0, 1.0, -1.0, 50_000.123_456_78, -0.000_000_01, 92_233.0] {
            let fp = FixedPoint::from_f64(x);
            assert!(
                (fp.to_f64() - x).abs() < 1e-8,
                "round trip failed for {}: got {}",
                x,
                fp.to_f64()
            );
        }
    }

    #[test]
    fn test_decimal_conversion() {
        let fp = FixedPoint::from_decimal(dec!(50000.12345678)).unwrap();
        assert_eq!(fp.raw(), 5_000_012_345_678);

        // Extra digits truncate toward zero
        let fp = FixedPoint::from_decimal(dec!(1.999999999)).unwrap();
        assert_eq!(fp.raw(), 199_999_999);

        // Out of range
        assert!(FixedPoint::from_decimal(dec!(99_999_999_999_999)).is_none());
    }

    #[test]
    fn test_add_sub_neg() {
        let a = FixedPoint::from_int(100);
        let b = FixedPoint::from_int(200);
        assert_eq!((a + b).to_int(), 300);
        assert_eq!((b - a).to_int(), 100);
        assert_eq!((-a).to_int(), -100);

        let mut c = a;
        c += b;
        assert_eq!(c.to_int(), 300);
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn test_associativity_in_safe_envelope() {
        // Property: (a+b)+c == a+(b+c) bit-exactly when the sum stays in range
        let a = FixedPoint::from_f64(123.456);
        let b = FixedPoint::from_f64(-987.654);
        let c = FixedPoint::from_f64(0.000_001);
        assert_eq!(((a + b) + c).raw(), (a + (b + c)).raw());
    }

    #[test]
    fn test_add_wraps() {
        // Documented rule: add/sub wrap in the 64-bit domain
        let wrapped = FixedPoint::MAX + FixedPoint::from_raw(1);
        assert_eq!(wrapped.raw(), i64::MIN);
    }

    #[test]
    fn test_mul_wide_intermediate() {
        // 10^6 * 10^6 = 10^12 - the raw product overflows i64 without
        // the 128-bit intermediate
        let m = FixedPoint::from_int(1_000_000);
        let r = m * m;
        assert_eq!(r.to_int(), 1_000_000_000_000);

        assert_eq!(
            (FixedPoint::from_f64(2.0) * FixedPoint::from_f64(3.0)).to_f64(),
            6.0
        );

        // Truncation toward zero, both signs
        let half = FixedPoint::from_raw(1); // 1e-8
        assert_eq!((half * half).raw(), 0);
        assert_eq!(((-half) * half).raw(), 0);
    }

    #[test]
    fn test_div() {
        let r = FixedPoint::from_int(10) / FixedPoint::from_int(2);
        assert_eq!(r.to_int(), 5);

        // 1 / 3 truncates toward zero
        let third = FixedPoint::ONE / FixedPoint::from_int(3);
        assert_eq!(third.raw(), 33_333_333);
        let neg_third = (-FixedPoint::ONE) / FixedPoint::from_int(3);
        assert_eq!(neg_third.raw(), -33_333_333);
    }

    #[test]
    #[should_panic]
    fn test_div_by_zero_panics() {
        let _ = FixedPoint::ONE / FixedPoint::ZERO;
    }

    #[test]
    fn test_abs_min_max() {
        let neg = FixedPoint::from_int(-50);
        let pos = FixedPoint::from_int(50);
        assert_eq!(neg.abs(), pos);
        assert_eq!(pos.abs(), pos);
        assert_eq!(FixedPoint::ZERO.abs(), FixedPoint::ZERO);

        assert_eq!(neg.min(pos), neg);
        assert_eq!(neg.max(pos), pos);
        assert_eq!(pos.min(pos), pos);
    }

    #[test]
    fn test_total_order() {
        let a = FixedPoint::from_int(1);
        let b = FixedPoint::from_int(2);
        assert!(a < b);
        assert!(b > a);
        assert!(a <= a && a >= a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_signum() {
        assert_eq!(FixedPoint::from_int(7).signum(), 1);
        assert_eq!(FixedPoint::from_int(-7).signum(), -1);
        assert_eq!(FixedPoint::ZERO.signum(), 0);
    }

    #[test]
    fn test_display_eight_decimals() {
        assert_eq!(FixedPoint::from_f64(50000.0).to_string(), "50000.00000000");
        assert_eq!(FixedPoint::from_f64(0.1).to_string(), "0.10000000");
        assert_eq!(
            FixedPoint::from_parts(-45001, -50_000_000).to_string(),
            "-45001.50000000"
        );
        assert_eq!(FixedPoint::from_raw(1).to_string(), "0.00000001");
    }
}
