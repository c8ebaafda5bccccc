//! Configuration structures
//!
//! Populated once at startup; there is no hot reloading. Prices and
//! limits are written as decimals in TOML and converted to fixed-point
//! when the risk limits are resolved.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level static configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub queues: QueueConfig,
    pub risk: RiskConfig,
    pub analytics: AnalyticsSection,
    pub durability: DurabilityConfig,
    #[serde(default)]
    pub cores: CoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue capacities - powers of two, validated at load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub connector_to_analytics: usize,
    pub analytics_to_risk: usize,
    pub risk_to_execution: usize,
}

/// Risk limits as written in the config file (decimal domain)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_position_per_symbol: Decimal,
    pub max_total_exposure: Decimal,
    pub max_daily_loss: Decimal,
    pub max_order_size: Decimal,
}

/// Analytics tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSection {
    /// EWMA half-life in ticks
    pub ewma_half_life: u32,
    /// Regime detector half-life in ticks
    pub regime_half_life: u32,
    /// Winsorization cap in sigmas
    pub max_zscore: Decimal,
    /// Regime-change threshold as a multiple of baseline vol
    pub regime_threshold: Decimal,
}

/// Audit durability knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurabilityConfig {
    /// Audit log file path
    pub audit_path: PathBuf,
    /// Background fsync cadence, milliseconds
    pub sync_interval_ms: u64,
}

/// Per-component core assignments; `None` leaves the thread floating
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub analytics: Option<usize>,
    pub risk: Option<usize>,
    pub execution: Option<usize>,
    /// Shared core for heartbeat / sync threads
    pub housekeeping: Option<usize>,
    /// `SCHED_FIFO` priority for the hot threads (Linux, needs
    /// CAP_SYS_NICE); `None` keeps normal scheduling
    pub realtime_priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
