//! The analytics stage: tick in, gated signal out
//!
//! Per-symbol state lives in a pre-allocated array indexed by
//! `symbol_id & (MAX_SYMBOLS - 1)`. The ingress validator guarantees
//! `symbol_id < MAX_SYMBOLS` before a tick ever reaches this stage; the
//! bitmask would silently alias otherwise, so that contract is a trust
//! boundary, not a convenience.
//!
//! Per-tick order of operations is fixed: update statistics, compute and
//! winsorize both z-scores, update the regime detector, then gate. The
//! engine never fails - it only suppresses, and every suppression path
//! increments a counter.

use super::regime::{MarketRegime, VolRegimeDetector};
use super::rolling::RollingStats;
use super::window::TickWindow;
use super::winsor::ZScoreCap;
use super::EwmaStats;
use crate::core::{Envelope, MessageKind, Signal, Tick, PRICE_SCALE, STRATEGY_MEAN_REVERSION};
use crate::core::FixedPoint;
use crate::perf::clock::monotonic_ns;
use crate::perf::metrics::{CacheAligned, LatencyHistogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use crate::core::MAX_SYMBOLS;

const SYMBOL_MASK: usize = MAX_SYMBOLS - 1;

/// Rolling statistics window length
const ROLLING_WINDOW: usize = 64;

/// Tick window length for momentum features
const TICK_WINDOW: usize = 256;

/// Momentum spans (ticks)
const MOMENTUM_SHORT: usize = 10;
const MOMENTUM_LONG: usize = 50;

/// Signal gate: |z| must exceed half a sigma
const SIGNAL_Z_THRESHOLD: i64 = PRICE_SCALE / 2;

/// Analytics tuning, resolved from configuration at startup
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsConfig {
    /// EWMA half-life in ticks
    pub ewma_half_life: u32,
    /// Regime detector half-life in ticks
    pub regime_half_life: u32,
    /// Winsorization cap, price-scaled (3-sigma default)
    pub max_zscore: i64,
    /// Regime-change threshold as a multiple of baseline vol, price-scaled
    pub regime_threshold: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ewma_half_life: 50,
            regime_half_life: 100,
            max_zscore: 3 * PRICE_SCALE,
            regime_threshold: 2 * PRICE_SCALE,
        }
    }
}

/// Per-symbol analytics state
///
/// Cache-line aligned so adjacent symbols never false-share. Mutated only
/// by the analytics thread; lifetime equals the engine's.
#[repr(align(64))]
struct SymbolState {
    ticks: TickWindow<TICK_WINDOW>,
    price_stats: RollingStats<ROLLING_WINDOW>,
    volume_stats: RollingStats<ROLLING_WINDOW>,
    price_ewma: EwmaStats,
    volume_ewma: EwmaStats,
    regime: VolRegimeDetector,
    /// Winsorized EWMA z-score of the latest tick
    last_ewma_z: i64,
    last_update_ns: u64,
    message_count: u64,
}

impl SymbolState {
    fn new(config: &AnalyticsConfig) -> Self {
        let mut regime = VolRegimeDetector::with_half_life(config.regime_half_life);
        regime.set_threshold(config.regime_threshold);
        Self {
            ticks: TickWindow::new(),
            price_stats: RollingStats::new(),
            volume_stats: RollingStats::new(),
            price_ewma: EwmaStats::with_half_life(config.ewma_half_life),
            volume_ewma: EwmaStats::with_half_life(config.ewma_half_life),
            regime,
            last_ewma_z: 0,
            last_update_ns: 0,
            message_count: 0,
        }
    }
}

/// Lock-free counters published by the analytics stage
///
/// Incremented by the hot thread with relaxed ordering, read by the
/// housekeeping thread.
pub struct AnalyticsMetrics {
    pub messages_processed: CacheAligned<AtomicU64>,
    pub signals_generated: CacheAligned<AtomicU64>,
    /// Would-be signals suppressed by the regime gate
    pub signals_gated: CacheAligned<AtomicU64>,
    /// Z-scores clipped by winsorization
    pub outliers_capped: CacheAligned<AtomicU64>,
    /// Stage-internal processing latency
    pub processing_latency: LatencyHistogram,
    /// Message receipt timestamp to signal decision
    pub e2e_latency: LatencyHistogram,
}

impl AnalyticsMetrics {
    pub fn new() -> Self {
        Self {
            messages_processed: CacheAligned::new(AtomicU64::new(0)),
            signals_generated: CacheAligned::new(AtomicU64::new(0)),
            signals_gated: CacheAligned::new(AtomicU64::new(0)),
            outliers_capped: CacheAligned::new(AtomicU64::new(0)),
            processing_latency: LatencyHistogram::new(),
            e2e_latency: LatencyHistogram::new(),
        }
    }
}

impl Default for AnalyticsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The analytics engine
///
/// Owns all per-symbol state; constructed once at startup, no allocation
/// after that.
pub struct AnalyticsEngine {
    states: Box<[SymbolState]>,
    capper: ZScoreCap,
    metrics: Arc<AnalyticsMetrics>,
    sequence: u64,
}

impl AnalyticsEngine {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let states = (0..MAX_SYMBOLS)
            .map(|_| SymbolState::new(config))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            states,
            capper: ZScoreCap::new(config.max_zscore),
            metrics: Arc::new(AnalyticsMetrics::new()),
            sequence: 0,
        }
    }

    /// Shared handle to the stage counters
    pub fn metrics(&self) -> Arc<AnalyticsMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Process one message; the returned envelope (if any) goes downstream
    #[inline]
    pub fn on_message(&mut self, env: &Envelope) -> Option<Envelope> {
        match env.kind() {
            MessageKind::Tick => {
                let tick = env.as_tick()?;
                self.on_tick(env, &tick)
            }
            // Heartbeats pass through so downstream liveness works
            MessageKind::Heartbeat => Some(*env),
            _ => None,
        }
    }

    fn on_tick(&mut self, env: &Envelope, tick: &Tick) -> Option<Envelope> {
        let start_ns = monotonic_ns();
        let metrics = &self.metrics;

        // Precondition (ingress-validated): symbol_id < MAX_SYMBOLS.
        // The mask aliases silently if that contract is broken.
        debug_assert!((tick.symbol_id as usize) < MAX_SYMBOLS);
        let state = &mut self.states[tick.symbol_id as usize & SYMBOL_MASK];

        // Update every accumulator, O(1) each
        state.ticks.push(tick.price, tick.quantity);
        state.price_stats.update(tick.price.raw());
        state.volume_stats.update(tick.quantity.raw());
        state.price_ewma.update(tick.price.raw());
        state.volume_ewma.update(tick.quantity.raw());
        state.last_update_ns = env.timestamp_ns;
        state.message_count += 1;

        // Rolling z-score, sigma clamped against zero
        let deviation = tick.price.raw() - state.price_stats.mean();
        let stddev = state.price_stats.stddev_approx();
        let mut z = if stddev > 0 {
            ((deviation as i128 * PRICE_SCALE as i128) / stddev as i128) as i64
        } else {
            0
        };
        if self.capper.is_outlier(z) {
            metrics.outliers_capped.fetch_add(1, Ordering::Relaxed);
            z = self.capper.cap(z);
        }

        // EWMA z-score (responsive counterpart), capped the same way
        let ewma_dev = tick.price.raw() - state.price_ewma.mean();
        let ewma_stddev = state.price_ewma.stddev_approx();
        state.last_ewma_z = if ewma_stddev > 0 {
            self.capper
                .cap(((ewma_dev as i128 * PRICE_SCALE as i128) / ewma_stddev as i128) as i64)
        } else {
            0
        };

        // Regime detection on the fresh variance
        state.regime.update(state.price_stats.variance());
        let regime = state.regime.regime();

        // Signal gate: meaningful deviation and a stable regime
        let wants_signal = z.abs() > SIGNAL_Z_THRESHOLD;
        let out = if wants_signal && regime != MarketRegime::RegimeChange {
            self.sequence += 1;
            let signal = Signal {
                symbol_id: tick.symbol_id,
                // Mean reversion: deviation sign, magnitude as confidence
                direction: if z > 0 { 1 } else { -1 },
                confidence: FixedPoint::from_raw(z.abs()),
                strategy: STRATEGY_MEAN_REVERSION,
                _reserved: [0; 6],
            };
            metrics.signals_generated.fetch_add(1, Ordering::Relaxed);
            Some(Envelope::signal(monotonic_ns(), self.sequence, signal))
        } else {
            if wants_signal {
                metrics.signals_gated.fetch_add(1, Ordering::Relaxed);
            }
            None
        };

        let end_ns = monotonic_ns();
        metrics.processing_latency.record(end_ns - start_ns);
        if end_ns > env.timestamp_ns {
            metrics.e2e_latency.record(end_ns - env.timestamp_ns);
        }
        metrics.messages_processed.fetch_add(1, Ordering::Relaxed);

        out
    }

    /// Momentum features for a symbol (short and long span)
    pub fn momentum(&self, symbol_id: u64) -> (FixedPoint, FixedPoint) {
        let state = &self.states[symbol_id as usize & SYMBOL_MASK];
        (
            state.ticks.momentum(MOMENTUM_SHORT),
            state.ticks.momentum(MOMENTUM_LONG),
        )
    }

    /// Current regime for a symbol
    pub fn regime(&self, symbol_id: u64) -> MarketRegime {
        self.states[symbol_id as usize & SYMBOL_MASK].regime.regime()
    }

    /// Winsorized EWMA z-score of a symbol's latest tick
    pub fn ewma_zscore(&self, symbol_id: u64) -> i64 {
        self.states[symbol_id as usize & SYMBOL_MASK].last_ewma_z
    }

    /// Messages seen for a symbol
    pub fn message_count(&self, symbol_id: u64) -> u64 {
        self.states[symbol_id as usize & SYMBOL_MASK].message_count
    }
}
