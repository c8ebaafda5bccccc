//! Lock-free counters and latency histograms
//!
//! Counters use relaxed atomics on their own cache lines; the hot threads
//! increment them and the 1 Hz housekeeping threads read them. None of
//! this is a synchronization primitive - snapshots are consistent with
//! some recent point in the happens-before relation, nothing stronger.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-aligned wrapper for any type
///
/// Puts the value on its own 64-byte line so unrelated data can never
/// false-share with it.
#[repr(C, align(64))]
pub struct CacheAligned<T> {
    inner: T,
}

impl<T> CacheAligned<T> {
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn get(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

/// Fixed-bucket latency histogram
///
/// 128 buckets of 100 ns (0 to 12.8 us) plus an overflow bucket at the
/// top. O(1) record, O(buckets) percentile query. All state is atomic so
/// hot threads record while housekeeping threads read.
pub struct LatencyHistogram {
    buckets: Box<[AtomicU64]>,
    total_count: CacheAligned<AtomicU64>,
    total_ns: AtomicU64,
    min_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl LatencyHistogram {
    pub const BUCKET_WIDTH_NS: u64 = 100;
    pub const NUM_BUCKETS: usize = 128;

    pub fn new() -> Self {
        let buckets = (0..Self::NUM_BUCKETS)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buckets,
            total_count: CacheAligned::new(AtomicU64::new(0)),
            total_ns: AtomicU64::new(0),
            min_ns: AtomicU64::new(u64::MAX),
            max_ns: AtomicU64::new(0),
        }
    }

    /// Record one latency sample
    #[inline(always)]
    pub fn record(&self, latency_ns: u64) {
        let bucket = ((latency_ns / Self::BUCKET_WIDTH_NS) as usize).min(Self::NUM_BUCKETS - 1);
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(latency_ns, Ordering::Relaxed);
        self.min_ns.fetch_min(latency_ns, Ordering::Relaxed);
        self.max_ns.fetch_max(latency_ns, Ordering::Relaxed);
    }

    /// Approximate percentile (0-100), rounded up to the bucket ceiling
    pub fn percentile(&self, pct: f64) -> u64 {
        let total = self.total_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }

        let target = ((total as f64) * pct / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            if cumulative >= target {
                return (i as u64 + 1) * Self::BUCKET_WIDTH_NS;
            }
        }
        self.max_ns.load(Ordering::Relaxed)
    }

    pub fn p50(&self) -> u64 {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> u64 {
        self.percentile(99.0)
    }

    pub fn p999(&self) -> u64 {
        self.percentile(99.9)
    }

    pub fn mean(&self) -> u64 {
        let count = self.total_count.load(Ordering::Relaxed);
        if count == 0 {
            0
        } else {
            self.total_ns.load(Ordering::Relaxed) / count
        }
    }

    pub fn count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    pub fn min(&self) -> u64 {
        self.min_ns.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max_ns.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            p50: self.p50(),
            p99: self.p99(),
            p999: self.p999(),
            mean: self.mean(),
            count: self.count(),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time histogram summary for status lines
#[derive(Debug, Clone, Copy)]
pub struct LatencySummary {
    pub p50: u64,
    pub p99: u64,
    pub p999: u64,
    pub mean: u64,
    pub count: u64,
}
