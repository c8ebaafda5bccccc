//! CPU placement for the pipeline threads
//!
//! Each stage's hot thread is pinned to the core named in the `[cores]`
//! configuration section and, when `realtime_priority` is set, elevated
//! to `SCHED_FIFO`. Migrations evict the cache and show up as tail
//! latency, so pinning matters more than priority; both degrade
//! gracefully when the host refuses them (laptops, containers, missing
//! `CAP_SYS_NICE`), leaving the thread running unpinned with a warning.

use anyhow::Result;
use tracing::{debug, warn};

/// Apply a stage's placement configuration to the calling thread
///
/// `None` entries are skipped; failures warn and continue - a refused
/// core or priority must never stop the pipeline from starting.
pub fn setup_hot_thread(core: Option<usize>, realtime_priority: Option<i32>) {
    if let Some(core) = core {
        if let Err(e) = pin_to_core(core) {
            warn!("running unpinned: {}", e);
        }
    }
    if let Some(priority) = realtime_priority {
        if let Err(e) = set_realtime_priority(priority) {
            warn!("running at normal priority: {}", e);
        }
    }
}

/// Pin the calling thread to one core
pub fn pin_to_core(core: usize) -> Result<()> {
    let available = core_affinity::get_core_ids().unwrap_or_default();
    if !available.iter().any(|id| id.id == core) {
        anyhow::bail!("core {} not present on this host ({} cores)", core, available.len());
    }
    if !core_affinity::set_for_current(core_affinity::CoreId { id: core }) {
        anyhow::bail!("affinity request for core {} refused", core);
    }
    debug!("thread pinned to core {}", core);
    Ok(())
}

/// Request `SCHED_FIFO` scheduling for the calling thread (Linux)
///
/// Needs `CAP_SYS_NICE` or root; the OS error is surfaced so operators
/// can tell a capability problem from a bad priority value.
pub fn set_realtime_priority(priority: i32) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        // SAFETY: pid 0 targets the calling thread; param lives across
        // the call
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            anyhow::bail!(
                "SCHED_FIFO:{} refused: {}",
                priority,
                std::io::Error::last_os_error()
            );
        }
        debug!("thread scheduling set to SCHED_FIFO:{}", priority);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        anyhow::bail!(
            "real-time scheduling (requested priority {}) is Linux-only",
            priority
        )
    }
}

/// Cores visible to this process
pub fn num_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
}
