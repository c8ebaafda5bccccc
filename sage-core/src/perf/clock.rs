//! Process-wide clocks
//!
//! Envelope timestamps and latency measurements all come from
//! [`monotonic_ns`], which counts nanoseconds from a single process-wide
//! epoch. Two readings taken on different threads are therefore directly
//! comparable, which is what makes end-to-end (message timestamp → now)
//! latency meaningful.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process-wide monotonic epoch
///
/// The epoch is fixed on first use; the clock never goes backwards.
#[inline]
pub fn monotonic_ns() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// Wall-clock nanoseconds since the Unix epoch
///
/// Not monotonic across NTP steps; used for id generation and display,
/// never for latency arithmetic.
#[inline]
pub fn wall_clock_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Wall-clock seconds since the Unix epoch
#[inline]
pub fn wall_clock_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_wall_clock_is_sane() {
        // Some time after 2020-01-01
        assert!(wall_clock_secs() > 1_577_836_800);
        assert!(wall_clock_ns() > 1_577_836_800 * 1_000_000_000);
    }
}
