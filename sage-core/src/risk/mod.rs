//! The risk gate: accept or reject every signal in constant time
//!
//! Four limits (position, order size, total exposure, daily loss) behind
//! a circuit-breaker short-circuit. The position table is updated before
//! the order is published - position reflects intent, not confirmation -
//! so a later exchange reject needs a compensating reverse delta.

pub mod breaker;
pub mod gate;
pub mod limits;
pub mod position;

pub use breaker::{BreakerReason, CircuitBreaker};
pub use gate::{RiskGate, RiskMetrics};
pub use limits::RiskLimits;
pub use position::{PnlAggregates, PositionSlot, PositionTable};
