//! The execution stage: order request in, wire bytes out, audit always
//!
//! Per-request flow (order is non-negotiable):
//!
//! 1. issue a fresh exchange order id
//! 2. log `ORDER` - before any wire action
//! 3. encode the FIX message into the pre-allocated buffer
//! 4. send via the transport
//! 5. log `SENT` on success, `ERROR` with `SEND_FAILED` otherwise
//!
//! Asynchronous exchange events (`ACK`/`FILL`/`REJECT`) arrive as
//! [`ExchangeEvent`]s and are routed into the audit log by order id. The
//! engine keeps an in-flight table of exchange id → request: when the
//! exchange rejects, the position delta the risk gate applied on intent
//! must be unwound, so the original request is sent back upstream as an
//! `OrderCancel` envelope over the reversal channel and the risk stage
//! applies the compensating delta. A failed send is not retried - the id
//! is burned and the counters record the loss.

use super::audit::AuditLog;
use super::events::ExchangeEvent;
use super::fix::FixEncoder;
use super::order_id::OrderIdGenerator;
use crate::core::{Envelope, FixedPoint, MessageKind, OrderRequest};
use crate::perf::clock::monotonic_ns;
use crate::perf::metrics::{CacheAligned, LatencyHistogram};
use crate::queue::Producer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Size of the pre-allocated FIX encode buffer
const FIX_BUFFER_SIZE: usize = 512;

/// In-flight table capacity reserved at startup
const PENDING_CAPACITY: usize = 4_096;

/// Opaque delivery to the exchange
///
/// The core does not own the transport; it relies only on this
/// predicate. `true` means the bytes left the process, nothing more.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> bool;
}

/// Transport that counts bytes and always succeeds (simulation, tests)
#[derive(Debug, Default)]
pub struct NullTransport {
    bytes_sent: u64,
    messages_sent: u64,
}

impl NullTransport {
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }
}

impl Transport for NullTransport {
    fn send(&mut self, bytes: &[u8]) -> bool {
        self.bytes_sent += bytes.len() as u64;
        self.messages_sent += 1;
        true
    }
}

/// Lock-free counters published by the execution stage
pub struct ExecutionMetrics {
    pub orders_sent: CacheAligned<AtomicU64>,
    pub orders_failed: CacheAligned<AtomicU64>,
    /// Exchange rejects that pushed a compensating reversal upstream
    pub reversals_published: CacheAligned<AtomicU64>,
    pub bytes_sent: CacheAligned<AtomicU64>,
    pub latency: LatencyHistogram,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            orders_sent: CacheAligned::new(AtomicU64::new(0)),
            orders_failed: CacheAligned::new(AtomicU64::new(0)),
            reversals_published: CacheAligned::new(AtomicU64::new(0)),
            bytes_sent: CacheAligned::new(AtomicU64::new(0)),
            latency: LatencyHistogram::new(),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The execution engine
pub struct ExecutionEngine<T: Transport> {
    id_gen: OrderIdGenerator,
    audit: Arc<AuditLog>,
    transport: T,
    fix_buf: Box<[u8; FIX_BUFFER_SIZE]>,
    /// In-flight requests by exchange order id; entries leave on a
    /// terminal event (fill or reject). Capacity reserved at startup.
    pending: HashMap<u64, OrderRequest>,
    /// Compensation path back to the risk stage
    reversals: Option<Producer<Envelope>>,
    reversal_seq: u64,
    metrics: Arc<ExecutionMetrics>,
}

impl<T: Transport> ExecutionEngine<T> {
    pub fn new(id_gen: OrderIdGenerator, audit: Arc<AuditLog>, transport: T) -> Self {
        Self {
            id_gen,
            audit,
            transport,
            fix_buf: Box::new([0; FIX_BUFFER_SIZE]),
            pending: HashMap::with_capacity(PENDING_CAPACITY),
            reversals: None,
            reversal_seq: 0,
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Attach the reversal channel back to the risk stage
    ///
    /// Without it, exchange rejects are audit-logged but nobody unwinds
    /// the intent delta - wire this in any deployment that trades.
    pub fn with_reversals(mut self, reversals: Producer<Envelope>) -> Self {
        self.reversals = Some(reversals);
        self
    }

    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        Arc::clone(&self.audit)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests currently awaiting a terminal exchange response
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Process one message from the upstream queue
    #[inline]
    pub fn on_message(&mut self, env: &Envelope) {
        if env.kind() == MessageKind::OrderRequest {
            if let Some(order) = env.as_order_request() {
                self.process_order(&order);
            }
        }
        // Heartbeats terminate here; there is no downstream queue
    }

    /// Full lifecycle for one order request
    pub fn process_order(&mut self, order: &OrderRequest) -> u64 {
        let start_ns = monotonic_ns();

        let exchange_order_id = self.id_gen.generate();

        // Intent first. If we die after this line, the record exists.
        self.audit.log_order(exchange_order_id, order);
        self.pending.insert(exchange_order_id, *order);

        let len = FixEncoder::encode_new_order(
            &mut self.fix_buf[..],
            exchange_order_id,
            order.symbol_id,
            order.side,
            order.price,
            order.quantity,
        );

        if self.transport.send(&self.fix_buf[..len]) {
            self.audit.log_sent(exchange_order_id);
            self.metrics.orders_sent.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .bytes_sent
                .fetch_add(len as u64, Ordering::Relaxed);
        } else {
            self.audit.log_error(exchange_order_id, "SEND_FAILED");
            self.metrics.orders_failed.fetch_add(1, Ordering::Relaxed);
        }

        self.metrics.latency.record(monotonic_ns() - start_ns);
        exchange_order_id
    }

    /// Dispatch one decoded exchange response
    pub fn on_exchange_event(&mut self, event: &ExchangeEvent) {
        match event {
            ExchangeEvent::Ack { order_id, ack_id } => self.on_ack(*order_id, ack_id.as_str()),
            ExchangeEvent::Fill {
                order_id,
                symbol_id,
                price,
                quantity,
            } => self.on_fill(*order_id, *symbol_id, *price, *quantity),
            ExchangeEvent::Reject { order_id, reason } => {
                self.on_reject(*order_id, reason.as_str())
            }
        }
    }

    /// Exchange acknowledged the order
    pub fn on_ack(&self, order_id: u64, exchange_ack_id: &str) {
        self.audit.log_ack(order_id, exchange_ack_id);
    }

    /// Exchange reported an execution (terminal for IOC orders)
    pub fn on_fill(&mut self, order_id: u64, symbol_id: u64, price: FixedPoint, qty: FixedPoint) {
        self.audit.log_fill(order_id, symbol_id, price, qty);
        self.pending.remove(&order_id);
    }

    /// Exchange rejected the order
    ///
    /// Logs the reject, then unwinds the intent: the risk gate moved the
    /// position when it approved this request, so the original request
    /// goes back upstream for a compensating reverse delta.
    pub fn on_reject(&mut self, order_id: u64, reason: &str) {
        self.audit.log_reject(order_id, reason);

        if let Some(order) = self.pending.remove(&order_id) {
            if let Some(reversals) = self.reversals.as_mut() {
                self.reversal_seq += 1;
                reversals.push_blocking(Envelope::order_cancel(
                    monotonic_ns(),
                    self.reversal_seq,
                    order,
                ));
                self.metrics
                    .reversals_published
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
