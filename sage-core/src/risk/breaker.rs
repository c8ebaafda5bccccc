//! Circuit breaker
//!
//! A latch: once tripped, every signal is rejected until a manual reset.
//! Tripping is idempotent (compare-and-set) and safe from any thread -
//! the housekeeping path trips it asynchronously when daily PnL crosses
//! the loss limit, while the risk thread reads it on every signal.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::{error, warn};

/// Why the breaker tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerReason {
    None = 0,
    HighErrorRate = 1,
    LatencySpike = 2,
    DailyLossBreach = 3,
    ManualHalt = 4,
}

impl From<u8> for BreakerReason {
    fn from(v: u8) -> Self {
        match v {
            1 => BreakerReason::HighErrorRate,
            2 => BreakerReason::LatencySpike,
            3 => BreakerReason::DailyLossBreach,
            4 => BreakerReason::ManualHalt,
            _ => BreakerReason::None,
        }
    }
}

impl fmt::Display for BreakerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerReason::None => "none",
            BreakerReason::HighErrorRate => "high error rate",
            BreakerReason::LatencySpike => "latency spike",
            BreakerReason::DailyLossBreach => "daily loss breach",
            BreakerReason::ManualHalt => "manual halt",
        };
        f.write_str(s)
    }
}

/// Latched trading halt
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    tripped: AtomicBool,
    reason: AtomicU8,
}

impl CircuitBreaker {
    pub const fn new() -> Self {
        Self {
            tripped: AtomicBool::new(false),
            reason: AtomicU8::new(BreakerReason::None as u8),
        }
    }

    /// Trip the breaker; idempotent, first caller wins the reason
    pub fn trip(&self, reason: BreakerReason) {
        if self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.reason.store(reason as u8, Ordering::Release);
            error!("CIRCUIT BREAKER TRIPPED: {}", reason);
        }
    }

    /// Manual reset after the condition has been investigated
    pub fn reset(&self) {
        if self.tripped.swap(false, Ordering::AcqRel) {
            warn!(
                "circuit breaker reset (was: {})",
                BreakerReason::from(self.reason.load(Ordering::Acquire))
            );
        }
        self.reason
            .store(BreakerReason::None as u8, Ordering::Release);
    }

    /// Checked on every signal
    #[inline(always)]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Relaxed)
    }

    pub fn reason(&self) -> BreakerReason {
        BreakerReason::from(self.reason.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_closed() {
        let b = CircuitBreaker::new();
        assert!(!b.is_tripped());
        assert_eq!(b.reason(), BreakerReason::None);
    }

    #[test]
    fn test_trip_and_reset() {
        let b = CircuitBreaker::new();
        b.trip(BreakerReason::DailyLossBreach);
        assert!(b.is_tripped());
        assert_eq!(b.reason(), BreakerReason::DailyLossBreach);

        b.reset();
        assert!(!b.is_tripped());
        assert_eq!(b.reason(), BreakerReason::None);
    }

    #[test]
    fn test_trip_is_idempotent_first_reason_wins() {
        let b = CircuitBreaker::new();
        b.trip(BreakerReason::LatencySpike);
        b.trip(BreakerReason::ManualHalt);
        assert_eq!(b.reason(), BreakerReason::LatencySpike);
    }

    #[test]
    fn test_trip_from_another_thread() {
        let b = Arc::new(CircuitBreaker::new());
        let other = Arc::clone(&b);
        std::thread::spawn(move || other.trip(BreakerReason::ManualHalt))
            .join()
            .unwrap();
        assert!(b.is_tripped());
        assert_eq!(b.reason(), BreakerReason::ManualHalt);
    }
}
