//! Decoded exchange responses
//!
//! The wire format from the exchange is decoded elsewhere; the core
//! consumes these events addressed by exchange order id. They cross a
//! queue into the execution thread, so they are fixed-size `Copy` values
//! with inline strings rather than heap-backed ones.

use crate::core::FixedPoint;
use std::fmt;

/// Fixed-capacity inline string for `Copy` event payloads
///
/// Clips at a UTF-8 boundary; the capacity for reject reasons matches
/// the audit log's reason field width.
#[derive(Clone, Copy)]
pub struct InlineStr<const N: usize> {
    buf: [u8; N],
    len: u8,
}

impl<const N: usize> InlineStr<N> {
    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = [0u8; N];
        buf[..end].copy_from_slice(&s.as_bytes()[..end]);
        Self {
            buf,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Construction clipped at a char boundary
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }
}

impl<const N: usize> From<&str> for InlineStr<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> fmt::Display for InlineStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> fmt::Debug for InlineStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Exchange-assigned ack id (may be empty)
pub type AckId = InlineStr<24>;

/// Reject / error reason, clipped to the audit field width
pub type RejectReason = InlineStr<63>;

/// One decoded exchange response, addressed by exchange order id
#[derive(Debug, Clone, Copy)]
pub enum ExchangeEvent {
    Ack {
        order_id: u64,
        ack_id: AckId,
    },
    Fill {
        order_id: u64,
        symbol_id: u64,
        price: FixedPoint,
        quantity: FixedPoint,
    },
    Reject {
        order_id: u64,
        reason: RejectReason,
    },
}
