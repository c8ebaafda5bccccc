//! Unified pipeline message: 64 bytes, one cache line
//!
//! Every record crossing an inter-stage queue is an [`Envelope`]: an
//! 8-byte receipt timestamp, an 8-byte per-producer sequence id, a 1-byte
//! kind tag, 7 reserved bytes, and a 40-byte payload overlaid by the tag.
//! The envelope is trivially copyable and transfers ownership by value.
//!
//! Layout:
//!
//! ```text
//!   [0-7]   timestamp_ns   local receipt time, nanoseconds
//!   [8-15]  sequence_id    monotonic per producer
//!   [16]    kind           1-byte tag
//!   [17-23] reserved
//!   [24-63] payload        variant selected by the tag
//! ```

use super::fixed_point::FixedPoint;
use std::fmt;

/// Symbol-id space shared by every stage
///
/// The connector contract requires `symbol_id < MAX_SYMBOLS`; per-symbol
/// tables index with `symbol_id & (MAX_SYMBOLS - 1)`, which aliases
/// silently if the contract is broken, so ingress validates it.
pub const MAX_SYMBOLS: usize = 256;

/// Message kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Invalid = 0,
    Tick = 1,
    Signal = 2,
    OrderRequest = 3,
    OrderAck = 4,
    OrderFill = 5,
    OrderCancel = 6,
    RiskAlert = 7,
    Heartbeat = 8,
    Shutdown = 9,
}

// Tick flag bits
pub const FLAG_BID: u32 = 0x01;
pub const FLAG_ASK: u32 = 0x02;
pub const FLAG_TRADE: u32 = 0x04;

// Order type codes carried on the wire payload
pub const ORDER_TYPE_MARKET: u8 = 1;
pub const ORDER_TYPE_LIMIT: u8 = 2;
pub const ORDER_TYPE_IOC: u8 = 3;

// Time-in-force codes
pub const TIF_DAY: u8 = 0;
pub const TIF_IOC: u8 = 1;

// Strategy tags attached to signals
pub const STRATEGY_MEAN_REVERSION: u8 = 1;
pub const STRATEGY_MOMENTUM: u8 = 2;

/// Market data tick (trade or quote), 32 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Tick {
    pub price: FixedPoint,
    pub quantity: FixedPoint,
    pub symbol_id: u64,
    /// Bit set: [`FLAG_BID`] | [`FLAG_ASK`] | [`FLAG_TRADE`]
    pub flags: u32,
    pub exchange_id: u8,
    pub _reserved: [u8; 3],
}

impl Tick {
    pub fn trade(symbol_id: u64, price: FixedPoint, quantity: FixedPoint) -> Self {
        Self {
            price,
            quantity,
            symbol_id,
            flags: FLAG_TRADE,
            exchange_id: 0,
            _reserved: [0; 3],
        }
    }
}

/// Trading signal from analytics, 24 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Signal {
    pub symbol_id: u64,
    /// Confidence in [0, 1], fixed-point scaled
    pub confidence: FixedPoint,
    /// +1 buy, -1 sell, 0 neutral
    pub direction: i8,
    pub strategy: u8,
    pub _reserved: [u8; 6],
}

/// Order request from risk to execution, 40 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct OrderRequest {
    pub order_id: u64,
    pub symbol_id: u64,
    pub price: FixedPoint,
    pub quantity: FixedPoint,
    /// +1 buy, -1 sell
    pub side: i8,
    pub order_type: u8,
    pub time_in_force: u8,
    pub _reserved: [u8; 5],
}

/// Risk alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertSeverity {
    Info = 0,
    Warn = 1,
    Critical = 2,
}

impl From<u8> for AlertSeverity {
    fn from(v: u8) -> Self {
        match v {
            1 => AlertSeverity::Warn,
            2 => AlertSeverity::Critical,
            _ => AlertSeverity::Info,
        }
    }
}

/// Risk alert from the risk stage, 40 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct RiskAlert {
    pub timestamp_ns: u64,
    pub exposure: i64,
    pub daily_pnl: i64,
    /// [`AlertSeverity`] as u8
    pub severity: u8,
    pub _reserved: [u8; 15],
}

impl RiskAlert {
    pub fn new(timestamp_ns: u64, exposure: i64, daily_pnl: i64, severity: AlertSeverity) -> Self {
        Self {
            timestamp_ns,
            exposure,
            daily_pnl,
            severity: severity as u8,
            _reserved: [0; 15],
        }
    }
}

/// Component liveness status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentStatus {
    Ok = 0,
    Degraded = 1,
    Failing = 2,
}

/// Heartbeat for liveness detection, 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Heartbeat {
    pub sequence: u64,
    pub component_id: u32,
    /// [`ComponentStatus`] as u8
    pub status: u8,
    pub _reserved: [u8; 3],
}

/// Payload overlay, 40 bytes
///
/// The active variant is selected by [`Envelope::kind`]; access goes
/// through the tag-checked accessors on [`Envelope`].
#[derive(Clone, Copy)]
#[repr(C)]
union Payload {
    tick: Tick,
    signal: Signal,
    order: OrderRequest,
    alert: RiskAlert,
    heartbeat: Heartbeat,
    raw: [u8; 40],
}

/// Pipeline message envelope - exactly 64 bytes, cache-line aligned
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct Envelope {
    /// Local receipt time, nanoseconds
    pub timestamp_ns: u64,
    /// Monotonic sequence id, per producer
    pub sequence_id: u64,
    kind: MessageKind,
    _reserved: [u8; 7],
    payload: Payload,
}

impl Envelope {
    fn with_payload(timestamp_ns: u64, sequence_id: u64, kind: MessageKind, payload: Payload) -> Self {
        Self {
            timestamp_ns,
            sequence_id,
            kind,
            _reserved: [0; 7],
            payload,
        }
    }

    pub fn tick(timestamp_ns: u64, sequence_id: u64, tick: Tick) -> Self {
        Self::with_payload(timestamp_ns, sequence_id, MessageKind::Tick, Payload { tick })
    }

    pub fn signal(timestamp_ns: u64, sequence_id: u64, signal: Signal) -> Self {
        Self::with_payload(timestamp_ns, sequence_id, MessageKind::Signal, Payload { signal })
    }

    pub fn order_request(timestamp_ns: u64, sequence_id: u64, order: OrderRequest) -> Self {
        Self::with_payload(
            timestamp_ns,
            sequence_id,
            MessageKind::OrderRequest,
            Payload { order },
        )
    }

    /// An order request being taken back (exchange reject / cancel);
    /// the payload is the request whose intent must be unwound
    pub fn order_cancel(timestamp_ns: u64, sequence_id: u64, order: OrderRequest) -> Self {
        Self::with_payload(
            timestamp_ns,
            sequence_id,
            MessageKind::OrderCancel,
            Payload { order },
        )
    }

    pub fn risk_alert(timestamp_ns: u64, sequence_id: u64, alert: RiskAlert) -> Self {
        Self::with_payload(
            timestamp_ns,
            sequence_id,
            MessageKind::RiskAlert,
            Payload { alert },
        )
    }

    pub fn heartbeat(timestamp_ns: u64, sequence_id: u64, component_id: u32) -> Self {
        let heartbeat = Heartbeat {
            sequence: sequence_id,
            component_id,
            status: ComponentStatus::Ok as u8,
            _reserved: [0; 3],
        };
        Self::with_payload(
            timestamp_ns,
            sequence_id,
            MessageKind::Heartbeat,
            Payload { heartbeat },
        )
    }

    pub fn shutdown(timestamp_ns: u64, sequence_id: u64) -> Self {
        Self::with_payload(
            timestamp_ns,
            sequence_id,
            MessageKind::Shutdown,
            Payload { raw: [0; 40] },
        )
    }

    #[inline(always)]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.kind != MessageKind::Invalid
    }

    /// Payload as a tick, if the tag says so
    #[inline(always)]
    pub fn as_tick(&self) -> Option<Tick> {
        // Union read is sound: the constructor for this tag wrote this variant
        (self.kind == MessageKind::Tick).then(|| unsafe { self.payload.tick })
    }

    #[inline(always)]
    pub fn as_signal(&self) -> Option<Signal> {
        (self.kind == MessageKind::Signal).then(|| unsafe { self.payload.signal })
    }

    #[inline(always)]
    pub fn as_order_request(&self) -> Option<OrderRequest> {
        (self.kind == MessageKind::OrderRequest).then(|| unsafe { self.payload.order })
    }

    #[inline(always)]
    pub fn as_order_cancel(&self) -> Option<OrderRequest> {
        (self.kind == MessageKind::OrderCancel).then(|| unsafe { self.payload.order })
    }

    #[inline(always)]
    pub fn as_risk_alert(&self) -> Option<RiskAlert> {
        (self.kind == MessageKind::RiskAlert).then(|| unsafe { self.payload.alert })
    }

    #[inline(always)]
    pub fn as_heartbeat(&self) -> Option<Heartbeat> {
        (self.kind == MessageKind::Heartbeat).then(|| unsafe { self.payload.heartbeat })
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Envelope");
        s.field("timestamp_ns", &self.timestamp_ns)
            .field("sequence_id", &self.sequence_id)
            .field("kind", &self.kind);
        match self.kind {
            MessageKind::Tick => s.field("payload", &self.as_tick().unwrap()).finish(),
            MessageKind::Signal => s.field("payload", &self.as_signal().unwrap()).finish(),
            MessageKind::OrderRequest => {
                s.field("payload", &self.as_order_request().unwrap()).finish()
            }
            MessageKind::OrderCancel => {
                s.field("payload", &self.as_order_cancel().unwrap()).finish()
            }
            MessageKind::RiskAlert => s.field("payload", &self.as_risk_alert().unwrap()).finish(),
            MessageKind::Heartbeat => s.field("payload", &self.as_heartbeat().unwrap()).finish(),
            _ => s.finish(),
        }
    }
}

// One cache line, exactly
const _: () = assert!(std::mem::size_of::<Envelope>() == 64);
const _: () = assert!(std::mem::align_of::<Envelope>() == 64);
const _: () = assert!(std::mem::size_of::<Payload>() == 40);
const _: () = assert!(std::mem::size_of::<Tick>() == 32);
const _: () = assert!(std::mem::size_of::<Signal>() == 24);
const _: () = assert!(std::mem::size_of::<OrderRequest>() == 40);
const _: () = assert!(std::mem::size_of::<RiskAlert>() == 40);
const _: () = assert!(std::mem::size_of::<Heartbeat>() == 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_layout() {
        assert_eq!(std::mem::size_of::<Envelope>(), 64);
        assert_eq!(std::mem::align_of::<Envelope>(), 64);
    }

    #[test]
    fn test_tick_round_trip() {
        let tick = Tick::trade(
            1,
            FixedPoint::from_f64(50_000.0),
            FixedPoint::from_f64(0.1),
        );
        let env = Envelope::tick(12_345_678, 1, tick);

        assert_eq!(env.timestamp_ns, 12_345_678);
        assert_eq!(env.sequence_id, 1);
        assert_eq!(env.kind(), MessageKind::Tick);
        assert!(env.is_valid());

        let got = env.as_tick().unwrap();
        assert_eq!(got.price.to_f64(), 50_000.0);
        assert_eq!(got.quantity.to_f64(), 0.1);
        assert_eq!(got.flags, FLAG_TRADE);
    }

    #[test]
    fn test_accessor_tag_mismatch() {
        let env = Envelope::heartbeat(0, 7, 3);
        assert!(env.as_tick().is_none());
        assert!(env.as_signal().is_none());
        assert!(env.as_order_request().is_none());

        let hb = env.as_heartbeat().unwrap();
        assert_eq!(hb.sequence, 7);
        assert_eq!(hb.component_id, 3);
        assert_eq!(hb.status, ComponentStatus::Ok as u8);
    }

    #[test]
    fn test_signal_payload() {
        let sig = Signal {
            symbol_id: 42,
            confidence: FixedPoint::from_f64(0.75),
            direction: -1,
            strategy: STRATEGY_MEAN_REVERSION,
            _reserved: [0; 6],
        };
        let env = Envelope::signal(1, 2, sig);
        assert_eq!(env.as_signal().unwrap(), sig);
    }

    #[test]
    fn test_order_cancel_carries_the_request() {
        let order = OrderRequest {
            order_id: 7,
            symbol_id: 4,
            price: FixedPoint::ZERO,
            quantity: FixedPoint::from_f64(2.0),
            side: 1,
            order_type: ORDER_TYPE_MARKET,
            time_in_force: TIF_IOC,
            _reserved: [0; 5],
        };
        let env = Envelope::order_cancel(1, 2, order);
        assert_eq!(env.kind(), MessageKind::OrderCancel);
        assert_eq!(env.as_order_cancel().unwrap(), order);
        assert!(env.as_order_request().is_none());
    }

    #[test]
    fn test_envelope_is_copy() {
        let env = Envelope::shutdown(0, 0);
        let copy = env;
        assert_eq!(copy.kind(), MessageKind::Shutdown);
        assert_eq!(env.kind(), MessageKind::Shutdown);
    }

    #[test]
    fn test_alert_severity_from_u8() {
        assert_eq!(AlertSeverity::from(0), AlertSeverity::Info);
        assert_eq!(AlertSeverity::from(1), AlertSeverity::Warn);
        assert_eq!(AlertSeverity::from(2), AlertSeverity::Critical);
        assert_eq!(AlertSeverity::from(99), AlertSeverity::Info);
    }
}
