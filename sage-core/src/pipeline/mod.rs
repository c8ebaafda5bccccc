//! Pipeline wiring: threads, shutdown, housekeeping
//!
//! The runner owns every engine and queue as a plain value - no process
//! globals - and spawns one pinned hot thread per stage plus the
//! housekeeping threads (1 Hz status, loss watchdog, periodic audit
//! sync) on a shared core. Hot loops are tight spins that poll the
//! shutdown flag each iteration and yield only through a CPU pause hint.

pub mod runner;
pub mod shutdown;

pub use runner::{PipelineStats, Runner};
pub use shutdown::ShutdownFlag;
