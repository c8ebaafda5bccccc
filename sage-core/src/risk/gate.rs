//! The risk gate itself
//!
//! Per signal: circuit-breaker short-circuit first, then four limit
//! predicates combined with non-short-circuiting `&` so the compiler can
//! lower the chain to conditional moves instead of branches. Approved
//! signals become market IOC order requests; the position table is
//! updated before the request is published.

use super::breaker::CircuitBreaker;
use super::limits::RiskLimits;
use super::position::PositionTable;
use crate::core::{
    Envelope, MessageKind, OrderRequest, Signal, ORDER_TYPE_MARKET, TIF_IOC,
};
use crate::core::FixedPoint;
use crate::perf::clock::monotonic_ns;
use crate::perf::metrics::{CacheAligned, LatencyHistogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free counters published by the risk stage
pub struct RiskMetrics {
    pub signals_received: CacheAligned<AtomicU64>,
    pub orders_approved: CacheAligned<AtomicU64>,
    pub orders_rejected: CacheAligned<AtomicU64>,
    /// Intent deltas unwound after an exchange reject
    pub orders_reversed: CacheAligned<AtomicU64>,
    pub latency: LatencyHistogram,
}

impl RiskMetrics {
    pub fn new() -> Self {
        Self {
            signals_received: CacheAligned::new(AtomicU64::new(0)),
            orders_approved: CacheAligned::new(AtomicU64::new(0)),
            orders_rejected: CacheAligned::new(AtomicU64::new(0)),
            orders_reversed: CacheAligned::new(AtomicU64::new(0)),
            latency: LatencyHistogram::new(),
        }
    }
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The risk stage: signal in, approved order request out
pub struct RiskGate {
    limits: RiskLimits,
    positions: PositionTable,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<RiskMetrics>,
    /// Request-id sequence, monotonic within this gate
    sequence: u64,
}

impl RiskGate {
    pub fn new(limits: RiskLimits, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            limits,
            positions: PositionTable::new(),
            breaker,
            metrics: Arc::new(RiskMetrics::new()),
            sequence: 0,
        }
    }

    pub fn metrics(&self) -> Arc<RiskMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn positions(&self) -> &PositionTable {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut PositionTable {
        &mut self.positions
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Process one message; approved orders go downstream
    #[inline]
    pub fn on_message(&mut self, env: &Envelope) -> Option<Envelope> {
        match env.kind() {
            MessageKind::Signal => {
                let signal = env.as_signal()?;
                self.on_signal(&signal)
            }
            // Exchange reject came back from execution: unwind the intent
            MessageKind::OrderCancel => {
                let order = env.as_order_cancel()?;
                self.on_exchange_reject(&order);
                None
            }
            MessageKind::Heartbeat => Some(*env),
            _ => None,
        }
    }

    /// Compensate a rejected order
    ///
    /// The position moved when this request was approved; the exchange
    /// refused it, so the delta is reversed here - never silently.
    fn on_exchange_reject(&mut self, order: &OrderRequest) {
        let order_value = order.quantity.raw() * order.side as i64;
        self.positions
            .reverse(order.symbol_id, order_value, monotonic_ns());
        self.metrics.orders_reversed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_signal(&mut self, signal: &Signal) -> Option<Envelope> {
        let start_ns = monotonic_ns();
        self.metrics
            .signals_received
            .fetch_add(1, Ordering::Relaxed);

        // Fastest path: the breaker rejects everything while tripped
        if self.breaker.is_tripped() {
            self.metrics.orders_rejected.fetch_add(1, Ordering::Relaxed);
            self.metrics.latency.record(monotonic_ns() - start_ns);
            return None;
        }

        // Confidence is price-scaled and direction is a unit, so order
        // value lands in the same scale as positions and exposure
        let order_value = signal.confidence.raw() * signal.direction as i64;
        let new_position = self.positions.position(signal.symbol_id) + order_value;

        // All four limits as one conjunction; `&` (not `&&`) keeps the
        // evaluation branch-free
        let position_ok = new_position.abs() <= self.limits.max_position_per_symbol;
        let size_ok = order_value.abs() <= self.limits.max_order_size;
        let exposure_ok = self.positions.total_exposure() + order_value.abs()
            <= self.limits.max_total_exposure;
        let pnl_ok = self.positions.daily_pnl() > -self.limits.max_daily_loss;

        if !(position_ok & size_ok & exposure_ok & pnl_ok) {
            self.metrics.orders_rejected.fetch_add(1, Ordering::Relaxed);
            self.metrics.latency.record(monotonic_ns() - start_ns);
            return None;
        }

        self.sequence += 1;
        let order = OrderRequest {
            order_id: self.sequence,
            symbol_id: signal.symbol_id,
            price: FixedPoint::ZERO, // market order
            quantity: signal.confidence,
            side: signal.direction,
            order_type: ORDER_TYPE_MARKET,
            time_in_force: TIF_IOC,
            _reserved: [0; 5],
        };

        let now_ns = monotonic_ns();
        // Intent accounting: the position moves before the order leaves
        // this stage; a downstream reject must reverse this delta
        self.positions.apply_delta(signal.symbol_id, order_value, now_ns);

        self.metrics.orders_approved.fetch_add(1, Ordering::Relaxed);
        self.metrics.latency.record(monotonic_ns() - start_ns);

        Some(Envelope::order_request(now_ns, self.sequence, order))
    }
}
