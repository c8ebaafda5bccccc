//! Lock-free single-producer / single-consumer ring buffer
//!
//! The producer and consumer indices grow monotonically in the usize
//! domain (wrapping arithmetic keeps the ordering correct across register
//! wrap); the physical slot is `index & (capacity - 1)`.
//!
//! Design points:
//!
//! - The indices live on separate cache lines (`CachePadded`) so the two
//!   cores never false-share.
//! - Each side keeps a local cached copy of the other side's index and
//!   re-reads the authoritative atomic only when the cached view says the
//!   ring is full (producer) or empty (consumer). This halves cross-core
//!   cache traffic on the hot path.
//! - The element copy is ordered against index publication: the producer
//!   stores the slot before its release store of the index, the consumer
//!   reads the slot after its acquire load.
//!
//! The single-producer / single-consumer contract is enforced by
//! ownership: [`channel`] hands out exactly one [`Producer`] and one
//! [`Consumer`], each `Send` but not clonable.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner<T> {
    /// Producer index: next slot to write. Written only by the producer.
    head: CachePadded<AtomicUsize>,
    /// Consumer index: next slot to read. Written only by the consumer.
    tail: CachePadded<AtomicUsize>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
}

// The ring hands each slot to exactly one side at a time; T itself is
// plain data (Copy), so moving it across threads is safe.
unsafe impl<T: Copy + Send> Send for Inner<T> {}
unsafe impl<T: Copy + Send> Sync for Inner<T> {}

/// Create a bounded SPSC channel
///
/// `capacity` must be a power of two and at least 16 - anything else is a
/// fatal contract violation detected here, before the pipeline starts.
/// Storage is allocated once; nothing on the push/pop path allocates.
pub fn channel<T: Copy + Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity.is_power_of_two(),
        "SPSC capacity must be a power of two, got {}",
        capacity
    );
    assert!(capacity >= 16, "SPSC capacity must be >= 16, got {}", capacity);

    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let inner = Arc::new(Inner {
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        slots,
        mask: capacity - 1,
    });

    (
        Producer {
            inner: Arc::clone(&inner),
            cached_tail: 0,
        },
        Consumer {
            inner,
            cached_head: 0,
        },
    )
}

/// Producer half of an SPSC channel
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
    /// Local view of the consumer index, refreshed only on apparent full
    cached_tail: usize,
}

impl<T: Copy + Send> Producer<T> {
    /// Publish one item if the ring is not full
    ///
    /// Never blocks, never allocates. Returns `false` when full.
    #[inline(always)]
    pub fn try_push(&mut self, item: T) -> bool {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        let next = head.wrapping_add(1);

        // Full check against the cached consumer index first
        if next.wrapping_sub(self.cached_tail) > inner.slots.len() {
            self.cached_tail = inner.tail.load(Ordering::Acquire);
            if next.wrapping_sub(self.cached_tail) > inner.slots.len() {
                return false;
            }
        }

        // Slot store happens before the release publication below
        unsafe {
            (*inner.slots[head & inner.mask].get()).write(item);
        }
        inner.head.store(next, Ordering::Release);
        true
    }

    /// Spin until the item is accepted
    ///
    /// Latency hazard: this busy-waits with a CPU pause hint. Internal
    /// stages use it because they must never drop; size queues so that
    /// steady state never fills them.
    #[inline]
    pub fn push_blocking(&mut self, item: T) {
        while !self.try_push(item) {
            std::hint::spin_loop();
        }
    }

    /// Approximate occupancy - observational only, not a synchronization
    /// primitive
    pub fn size_approx(&self) -> usize {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    pub fn full_approx(&self) -> bool {
        self.size_approx() >= self.inner.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }
}

/// Consumer half of an SPSC channel
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
    /// Local view of the producer index, refreshed only on apparent empty
    cached_head: usize,
}

impl<T: Copy + Send> Consumer<T> {
    /// Retrieve one item if the ring is not empty
    ///
    /// Never blocks. Returns `None` when empty.
    #[inline(always)]
    pub fn try_pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);

        // Empty check against the cached producer index first
        if self.cached_head == tail {
            self.cached_head = inner.head.load(Ordering::Acquire);
            if self.cached_head == tail {
                return None;
            }
        }

        // Slot read happens after the acquire load above
        let item = unsafe { (*inner.slots[tail & inner.mask].get()).assume_init() };
        inner.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Retrieve up to `dst.len()` items in push order
    ///
    /// Returns the number of items copied (0 when empty).
    #[inline]
    pub fn try_pop_batch(&mut self, dst: &mut [T]) -> usize {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        let head = inner.head.load(Ordering::Acquire);

        let available = head.wrapping_sub(tail);
        let count = available.min(dst.len());
        if count == 0 {
            return 0;
        }

        for (i, slot) in dst.iter_mut().enumerate().take(count) {
            *slot = unsafe { (*inner.slots[tail.wrapping_add(i) & inner.mask].get()).assume_init() };
        }

        self.cached_head = head;
        inner.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    /// Spin until an item arrives
    ///
    /// Latency hazard: busy-waits with a CPU pause hint.
    #[inline]
    pub fn pop_blocking(&mut self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            std::hint::spin_loop();
        }
    }

    /// Approximate occupancy - observational only
    pub fn size_approx(&self) -> usize {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    pub fn empty_approx(&self) -> bool {
        self.size_approx() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }
}
