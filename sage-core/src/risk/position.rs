//! Position and PnL tracking
//!
//! One cache-aligned slot per symbol, mutated only by the risk thread.
//! The aggregates (total exposure, daily PnL) are published through
//! atomics so the housekeeping thread can watch them without touching
//! the slots.
//!
//! Invariant: session realized PnL plus unrealized PnL equals reported
//! session PnL.

use crate::core::{FixedPoint, MAX_SYMBOLS};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

const SYMBOL_MASK: usize = MAX_SYMBOLS - 1;

/// Per-symbol position state, one cache line
#[derive(Debug, Clone, Copy, Default)]
#[repr(C, align(64))]
pub struct PositionSlot {
    /// Positive = long, negative = short
    pub quantity: i64,
    /// Average entry price, fixed-point scaled
    pub avg_entry_price: i64,
    /// Unrealized PnL at the last mark
    pub unrealized_pnl: i64,
    /// Realized PnL for the session
    pub realized_pnl: i64,
    /// Last update timestamp, nanoseconds
    pub last_update_ns: u64,
    /// Trades this session
    pub trade_count: u32,
    _reserved: [u8; 12],
}

const _: () = assert!(std::mem::size_of::<PositionSlot>() == 64);

/// Aggregates published for read-only external inspection
///
/// Written (release) by the risk thread, read (acquire) by housekeeping.
pub struct PnlAggregates {
    total_exposure: CachePadded<AtomicI64>,
    daily_pnl: CachePadded<AtomicI64>,
}

impl PnlAggregates {
    fn new() -> Self {
        Self {
            total_exposure: CachePadded::new(AtomicI64::new(0)),
            daily_pnl: CachePadded::new(AtomicI64::new(0)),
        }
    }

    #[inline(always)]
    pub fn total_exposure(&self) -> i64 {
        self.total_exposure.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn daily_pnl(&self) -> i64 {
        self.daily_pnl.load(Ordering::Acquire)
    }
}

/// Pre-allocated position table, one slot per symbol
///
/// Single writer (the risk thread); O(1) lookup by symbol index.
pub struct PositionTable {
    slots: Box<[PositionSlot]>,
    aggregates: Arc<PnlAggregates>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self {
            slots: vec![PositionSlot::default(); MAX_SYMBOLS].into_boxed_slice(),
            aggregates: Arc::new(PnlAggregates::new()),
        }
    }

    /// Shared handle for read-only observers
    pub fn aggregates(&self) -> Arc<PnlAggregates> {
        Arc::clone(&self.aggregates)
    }

    /// Apply a signed delta to a symbol's position
    ///
    /// Called by the gate before the order is published (intent
    /// accounting). Exposure moves by the change in absolute quantity.
    #[inline(always)]
    pub fn apply_delta(&mut self, symbol_id: u64, delta: i64, now_ns: u64) -> i64 {
        let slot = &mut self.slots[symbol_id as usize & SYMBOL_MASK];

        let old_qty = slot.quantity;
        let new_qty = old_qty + delta;
        slot.quantity = new_qty;
        slot.trade_count += 1;
        slot.last_update_ns = now_ns;

        let exposure_change = new_qty.abs() - old_qty.abs();
        self.aggregates
            .total_exposure
            .fetch_add(exposure_change, Ordering::Release);

        new_qty
    }

    /// Reverse a previously applied delta (exchange reject path)
    #[inline]
    pub fn reverse(&mut self, symbol_id: u64, delta: i64, now_ns: u64) -> i64 {
        self.apply_delta(symbol_id, -delta, now_ns)
    }

    /// Record a fill, maintaining average entry price and realized PnL
    ///
    /// Increasing the position re-weights the average entry; reducing it
    /// realizes PnL against the average entry at the fill price.
    pub fn on_fill(&mut self, symbol_id: u64, price: FixedPoint, qty: i64, now_ns: u64) {
        let slot = &mut self.slots[symbol_id as usize & SYMBOL_MASK];
        let old_qty = slot.quantity;

        let increases = old_qty == 0 || (old_qty > 0) == (qty > 0);
        if increases {
            // Weighted average entry over the combined quantity
            let total = old_qty.abs() + qty.abs();
            if total != 0 {
                let weighted = old_qty.abs() as i128 * slot.avg_entry_price as i128
                    + qty.abs() as i128 * price.raw() as i128;
                slot.avg_entry_price = (weighted / total as i128) as i64;
            }
        } else {
            // Closing (part of) the position realizes PnL
            let closed = qty.abs().min(old_qty.abs());
            let direction = old_qty.signum();
            let pnl_per_unit = (price.raw() - slot.avg_entry_price) * direction;
            let realized =
                (pnl_per_unit as i128 * closed as i128 / crate::core::PRICE_SCALE as i128) as i64;
            slot.realized_pnl += realized;
            self.aggregates
                .daily_pnl
                .fetch_add(realized, Ordering::Release);
        }

        slot.quantity = old_qty + qty;
        if slot.quantity == 0 {
            slot.avg_entry_price = 0;
        }
        slot.trade_count += 1;
        slot.last_update_ns = now_ns;

        let exposure_change = slot.quantity.abs() - old_qty.abs();
        self.aggregates
            .total_exposure
            .fetch_add(exposure_change, Ordering::Release);
    }

    /// Mark a symbol to a price, refreshing unrealized PnL
    pub fn mark(&mut self, symbol_id: u64, price: FixedPoint) {
        let slot = &mut self.slots[symbol_id as usize & SYMBOL_MASK];
        if slot.quantity == 0 {
            slot.unrealized_pnl = 0;
            return;
        }
        let per_unit = price.raw() - slot.avg_entry_price;
        slot.unrealized_pnl =
            (per_unit as i128 * slot.quantity as i128 / crate::core::PRICE_SCALE as i128) as i64;
    }

    /// Record externally computed realized PnL (loss-limit accounting)
    pub fn record_pnl(&mut self, delta: i64) {
        self.aggregates.daily_pnl.fetch_add(delta, Ordering::Release);
    }

    #[inline(always)]
    pub fn position(&self, symbol_id: u64) -> i64 {
        self.slots[symbol_id as usize & SYMBOL_MASK].quantity
    }

    pub fn slot(&self, symbol_id: u64) -> &PositionSlot {
        &self.slots[symbol_id as usize & SYMBOL_MASK]
    }

    /// Session PnL for a symbol: realized plus unrealized
    pub fn session_pnl(&self, symbol_id: u64) -> i64 {
        let slot = self.slot(symbol_id);
        slot.realized_pnl + slot.unrealized_pnl
    }

    pub fn total_exposure(&self) -> i64 {
        self.aggregates.total_exposure()
    }

    pub fn daily_pnl(&self) -> i64 {
        self.aggregates.daily_pnl()
    }

    /// Reset every slot and aggregate (session roll)
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = PositionSlot::default();
        }
        self.aggregates.total_exposure.store(0, Ordering::Release);
        self.aggregates.daily_pnl.store(0, Ordering::Release);
    }
}

impl Default for PositionTable {
    fn default() -> Self {
        Self::new()
    }
}
