//! Performance utilities shared by every stage
//!
//! - **CPU affinity**: pin hot threads to dedicated cores, real-time
//!   priority on Linux
//! - **Clock**: process-wide monotonic nanoseconds so end-to-end latency
//!   is comparable across stages
//! - **Metrics**: cache-aligned lock-free counters and a fixed-bucket
//!   latency histogram with percentile queries

pub mod clock;
pub mod cpu;
pub mod metrics;

pub use clock::{monotonic_ns, wall_clock_ns};
pub use cpu::{num_cores, pin_to_core, set_realtime_priority, setup_hot_thread};
pub use metrics::{CacheAligned, LatencyHistogram, LatencySummary};
