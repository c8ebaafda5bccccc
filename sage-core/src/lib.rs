//! SAGE Core - Deterministic Low-Latency Trading Pipeline
//!
//! A five-stage, single-host trading pipeline targeting microsecond-class
//! internal latency with predictable tail behavior:
//!
//! ```text
//!  CONNECTOR → [Q1] → ANALYTICS → [Q2] → RISK → [Q3] → EXECUTION → EXCHANGE
//!                                                          │
//!                                                          ▼
//!                                                      AUDIT LOG
//! ```
//!
//! Each pair of adjacent stages communicates through exactly one bounded
//! single-producer / single-consumer queue. Every record that crosses a
//! queue is a 64-byte, cache-line aligned [`Envelope`].
//!
//! ## Design Principles
//!
//! - **Zero allocations on the steady-state path** - all queues, per-symbol
//!   state, the position table and the FIX encode buffer are allocated once
//!   at startup and never resized
//! - **Cache-line isolation** - producer/consumer indices, per-symbol slots
//!   and shared counters each live on their own 64-byte line
//! - **Deterministic arithmetic** - every price and quantity is a
//!   [`FixedPoint`] (i64 scaled by 10^8) with 128-bit mul/div intermediates
//! - **No unwinding across stages** - errors surface as `bool` returns,
//!   counter increments and audit records; the hot loops never block on
//!   locks, allocations or I/O
//!
//! ## Core Modules
//!
//! - [`core`] - [`FixedPoint`] arithmetic and the [`Envelope`] message
//! - [`queue`] - the lock-free SPSC transport between stages
//! - [`analytics`] - per-symbol O(1) statistics, regime detection and
//!   signal gating
//! - [`risk`] - branchless multi-limit checks, position tracking and the
//!   circuit breaker
//! - [`execution`] - order-id issuance, FIX encoding and the lifecycle
//!   audit log (`ORDER → SENT → ACK | REJECT | FILL | ERROR`)
//! - [`pipeline`] - thread wiring, CPU pinning, shutdown and the
//!   periodic audit-sync thread
//!
//! ## Usage Example
//!
//! ```no_run
//! use sage_core::config::Config;
//! use sage_core::execution::NullTransport;
//! use sage_core::pipeline::{Runner, ShutdownFlag};
//! use sage_core::queue;
//!
//! let config = Config::load_default()?;
//! let shutdown = ShutdownFlag::install()?;
//!
//! let (mut ticks_in, ticks_out) = queue::channel(config.queues.connector_to_analytics);
//! let runner = Runner::start(&config, ticks_out, NullTransport::default(), shutdown.clone())?;
//!
//! // ... feed ticks into `ticks_in` from a connector ...
//! # let _ = &mut ticks_in;
//!
//! shutdown.request();
//! runner.join()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod analytics;
pub mod config;
pub mod core;
pub mod execution;
pub mod feed;
pub mod perf;
pub mod pipeline;
pub mod queue;
pub mod risk;
pub mod utils;

// Re-export the leaf types everything else is built on
pub use crate::core::{Envelope, FixedPoint, MessageKind, PRICE_SCALE};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{
        Envelope, FixedPoint, MessageKind, OrderRequest, RiskAlert, Tick, PRICE_SCALE,
    };
    pub use crate::queue::{channel, Consumer, Producer};
    pub use crate::{Error, Result};
}
