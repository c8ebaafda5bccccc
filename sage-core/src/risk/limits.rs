//! Risk limit set
//!
//! All limits are fixed-point scaled integers in the same scale as
//! positions, exposure and order value (see the confidence-scaling
//! convention in the gate). Limits are validated once at startup; a
//! non-positive limit refuses to start.

use anyhow::Result;

/// Hard limits enforced by the risk gate
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    /// Maximum absolute position per symbol
    pub max_position_per_symbol: i64,
    /// Maximum total exposure across symbols
    pub max_total_exposure: i64,
    /// Maximum daily loss before the breaker trips
    pub max_daily_loss: i64,
    /// Maximum absolute value per order
    pub max_order_size: i64,
}

impl RiskLimits {
    /// Validate the limit set; called at startup
    pub fn validate(&self) -> Result<()> {
        if self.max_position_per_symbol <= 0 {
            anyhow::bail!("max_position_per_symbol must be positive");
        }
        if self.max_total_exposure <= 0 {
            anyhow::bail!("max_total_exposure must be positive");
        }
        if self.max_daily_loss <= 0 {
            anyhow::bail!("max_daily_loss must be positive");
        }
        if self.max_order_size <= 0 {
            anyhow::bail!("max_order_size must be positive");
        }
        if self.max_order_size > self.max_position_per_symbol {
            anyhow::bail!("max_order_size cannot exceed max_position_per_symbol");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RiskLimits {
        RiskLimits {
            max_position_per_symbol: 1_000_000,
            max_total_exposure: 10_000_000,
            max_daily_loss: 100_000,
            max_order_size: 50_000,
        }
    }

    #[test]
    fn test_valid_limits_pass() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_non_positive_limits_rejected() {
        let mut l = valid();
        l.max_position_per_symbol = 0;
        assert!(l.validate().is_err());

        let mut l = valid();
        l.max_total_exposure = -1;
        assert!(l.validate().is_err());

        let mut l = valid();
        l.max_daily_loss = 0;
        assert!(l.validate().is_err());

        let mut l = valid();
        l.max_order_size = 0;
        assert!(l.validate().is_err());
    }

    #[test]
    fn test_order_size_bounded_by_position_limit() {
        let mut l = valid();
        l.max_order_size = l.max_position_per_symbol + 1;
        assert!(l.validate().is_err());
    }
}
