//! Order id generation
//!
//! A 64-bit id: wall-clock seconds at engine start in the upper 32 bits,
//! an atomically incremented counter in the lower 32. Ids are
//! time-sortable across processes started in different seconds and
//! collision-free within a process until counter wrap.
//!
//! Restart hazard: two processes started within the same second would
//! share the upper half. Construction therefore waits for the next whole
//! second before capturing the timestamp - a bounded (< 1 s), init-time
//! only delay.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Process-scoped order id source
#[derive(Debug)]
pub struct OrderIdGenerator {
    startup_secs: u64,
    counter: AtomicU32,
}

impl OrderIdGenerator {
    /// Capture the next whole second as the id epoch
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);

        // Sleep to the next second boundary so a restart within the same
        // second cannot reissue ids
        let remainder = Duration::from_nanos(now.subsec_nanos() as u64);
        if !remainder.is_zero() {
            std::thread::sleep(Duration::from_secs(1) - remainder);
        }

        Self::with_epoch(now.as_secs() + u64::from(!remainder.is_zero()))
    }

    /// Build with an explicit epoch second (tests, replay)
    pub fn with_epoch(startup_secs: u64) -> Self {
        Self {
            startup_secs,
            counter: AtomicU32::new(0),
        }
    }

    /// Issue the next id
    #[inline(always)]
    pub fn generate(&self) -> u64 {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        (self.startup_secs << 32) | u64::from(count)
    }

    pub fn startup_secs(&self) -> u64 {
        self.startup_secs
    }
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
