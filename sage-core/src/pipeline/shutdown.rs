//! Process-wide shutdown flag
//!
//! A single atomic bool, set by the signal handler on termination-class
//! signals and polled by every hot loop on each iteration of its outer
//! polling loop. Signal handlers do nothing but set the flag
//! (async-signal-safe); all actual teardown runs on normal threads.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle to the process shutdown flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create the flag and register it for SIGINT / SIGTERM
    pub fn install() -> Result<Self> {
        let shutdown = Self::new();

        #[cfg(unix)]
        {
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown.flag))?;
            signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown.flag))?;
            tracing::info!("signal handlers installed (SIGINT, SIGTERM)");
        }

        Ok(shutdown)
    }

    /// Request shutdown programmatically
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Polled by the hot loops every iteration
    #[inline(always)]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
