//! Configuration loading and validation
//!
//! TOML file plus `SAGE_`-prefixed environment overrides, deserialized
//! through serde and validated before anything starts. Fatal contract
//! violations (capacity not a power of two, non-positive limits or
//! windows) refuse to start the engine here rather than surfacing later.

pub mod types;

pub use types::{
    AnalyticsSection, Config, CoreConfig, DurabilityConfig, LoggingConfig, QueueConfig, RiskConfig,
};

use crate::analytics::AnalyticsConfig;
use crate::core::FixedPoint;
use crate::risk::RiskLimits;
use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;

impl Config {
    /// Load configuration from a TOML file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loader = ConfigLoader::builder()
            // Defaults that a minimal file may omit
            .set_default("queues.connector_to_analytics", 65_536i64)?
            .set_default("queues.analytics_to_risk", 65_536i64)?
            .set_default("queues.risk_to_execution", 65_536i64)?
            .set_default("analytics.ewma_half_life", 50i64)?
            .set_default("analytics.regime_half_life", 100i64)?
            .set_default("analytics.max_zscore", "3.0")?
            .set_default("analytics.regime_threshold", "2.0")?
            .set_default("durability.audit_path", "sage_audit.log")?
            .set_default("durability.sync_interval_ms", 50i64)?
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("SAGE").separator("__"))
            .build()
            .context("failed to build configuration")?;

        let cfg: Config = loader
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the default location (`./config/default.toml`)
    pub fn load_default() -> Result<Self> {
        Self::load("config/default.toml")
    }

    /// Validate everything the engines assume
    pub fn validate(&self) -> Result<()> {
        for (name, capacity) in [
            ("connector_to_analytics", self.queues.connector_to_analytics),
            ("analytics_to_risk", self.queues.analytics_to_risk),
            ("risk_to_execution", self.queues.risk_to_execution),
        ] {
            if !capacity.is_power_of_two() || capacity < 16 {
                anyhow::bail!(
                    "queue capacity {} = {} must be a power of two >= 16",
                    name,
                    capacity
                );
            }
        }

        if self.analytics.ewma_half_life == 0 {
            anyhow::bail!("ewma_half_life must be positive");
        }
        if self.analytics.regime_half_life == 0 {
            anyhow::bail!("regime_half_life must be positive");
        }
        if self.analytics.max_zscore <= Decimal::ZERO {
            anyhow::bail!("max_zscore must be positive");
        }
        if self.analytics.regime_threshold <= Decimal::ZERO {
            anyhow::bail!("regime_threshold must be positive");
        }

        if self.durability.sync_interval_ms == 0 {
            anyhow::bail!("sync_interval_ms must be positive");
        }

        // Limits get the full check when resolved to fixed-point
        self.risk_limits()?;

        Ok(())
    }

    /// Resolve the decimal risk section into fixed-point limits
    pub fn risk_limits(&self) -> Result<RiskLimits> {
        let to_raw = |name: &str, d: Decimal| -> Result<i64> {
            FixedPoint::from_decimal(d)
                .map(FixedPoint::raw)
                .with_context(|| format!("risk.{} out of fixed-point range: {}", name, d))
        };

        let limits = RiskLimits {
            max_position_per_symbol: to_raw(
                "max_position_per_symbol",
                self.risk.max_position_per_symbol,
            )?,
            max_total_exposure: to_raw("max_total_exposure", self.risk.max_total_exposure)?,
            max_daily_loss: to_raw("max_daily_loss", self.risk.max_daily_loss)?,
            max_order_size: to_raw("max_order_size", self.risk.max_order_size)?,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Resolve the analytics section into engine parameters
    pub fn analytics_config(&self) -> Result<AnalyticsConfig> {
        let max_zscore = FixedPoint::from_decimal(self.analytics.max_zscore)
            .map(FixedPoint::raw)
            .context("max_zscore out of fixed-point range")?;
        let regime_threshold = FixedPoint::from_decimal(self.analytics.regime_threshold)
            .map(FixedPoint::raw)
            .context("regime_threshold out of fixed-point range")?;

        Ok(AnalyticsConfig {
            ewma_half_life: self.analytics.ewma_half_life,
            regime_half_life: self.analytics.regime_half_life,
            max_zscore,
            regime_threshold,
        })
    }
}
