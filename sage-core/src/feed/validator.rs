//! Ingress contract validation - a trust boundary, not a formality
//!
//! The analytics stage looks symbols up with `symbol_id & (MAX_SYMBOLS-1)`.
//! That mask silently aliases out-of-range ids, which corrupts another
//! symbol's statistics, so `symbol_id < MAX_SYMBOLS` is validated here and
//! never re-checked on the hot path. Price and quantity must be strictly
//! positive. Violations are rejected at ingress with a counter increment
//! and never reach the core.

use crate::core::{Tick, MAX_SYMBOLS};
use crate::perf::metrics::CacheAligned;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why a tick was refused at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    /// `symbol_id >= MAX_SYMBOLS` - would alias under the bitmask
    SymbolOutOfRange { symbol_id: u64 },
    /// Price must be strictly positive
    NonPositivePrice { raw: i64 },
    /// Quantity must be strictly positive
    NonPositiveQuantity { raw: i64 },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::SymbolOutOfRange { symbol_id } => {
                write!(f, "symbol id {} out of range (max {})", symbol_id, MAX_SYMBOLS)
            }
            ContractViolation::NonPositivePrice { raw } => {
                write!(f, "non-positive price (raw {})", raw)
            }
            ContractViolation::NonPositiveQuantity { raw } => {
                write!(f, "non-positive quantity (raw {})", raw)
            }
        }
    }
}

impl std::error::Error for ContractViolation {}

/// Stateless validator with rejection counters
pub struct TickValidator {
    rejects: CacheAligned<AtomicU64>,
}

impl TickValidator {
    pub fn new() -> Self {
        Self {
            rejects: CacheAligned::new(AtomicU64::new(0)),
        }
    }

    /// Check the connector contract for one tick
    #[inline]
    pub fn validate(&self, tick: &Tick) -> Result<(), ContractViolation> {
        let violation = if tick.symbol_id >= MAX_SYMBOLS as u64 {
            Some(ContractViolation::SymbolOutOfRange {
                symbol_id: tick.symbol_id,
            })
        } else if !tick.price.is_positive() {
            Some(ContractViolation::NonPositivePrice {
                raw: tick.price.raw(),
            })
        } else if !tick.quantity.is_positive() {
            Some(ContractViolation::NonPositiveQuantity {
                raw: tick.quantity.raw(),
            })
        } else {
            None
        };

        match violation {
            Some(v) => {
                self.rejects.fetch_add(1, Ordering::Relaxed);
                Err(v)
            }
            None => Ok(()),
        }
    }

    pub fn rejects(&self) -> u64 {
        self.rejects.load(Ordering::Relaxed)
    }
}

impl Default for TickValidator {
    fn default() -> Self {
        Self::new()
    }
}
