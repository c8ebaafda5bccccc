//! Leaf types shared by every pipeline stage
//!
//! - [`FixedPoint`]: deterministic 8-decimal arithmetic over a 64-bit integer
//! - [`Envelope`]: the 64-byte, cache-line aligned message that crosses
//!   every inter-stage queue
//!
//! Both are `Copy` and allocation-free; ownership transfers by value.

pub mod fixed_point;
pub mod message;

pub use fixed_point::{FixedPoint, PRICE_SCALE};
pub use message::{
    AlertSeverity, ComponentStatus, Envelope, Heartbeat, MessageKind, OrderRequest, RiskAlert,
    Signal, Tick, FLAG_ASK, FLAG_BID, FLAG_TRADE, MAX_SYMBOLS, ORDER_TYPE_IOC, ORDER_TYPE_LIMIT,
    ORDER_TYPE_MARKET, STRATEGY_MEAN_REVERSION, STRATEGY_MOMENTUM, TIF_DAY, TIF_IOC,
};
