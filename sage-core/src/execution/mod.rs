//! Order execution: id issuance, wire encoding, lifecycle audit
//!
//! Every order follows `ORDER → SENT → ACK | REJECT | FILL | ERROR`, and
//! the `ORDER` record hits the audit log before any wire action - intent
//! must be durable even if the process dies mid-send. The audit file is
//! the system of record; [`recovery`] rebuilds order dispositions from it
//! after a restart.
//!
//! Exchange rejects unwind intent: the risk stage moved the position
//! when it approved a request, so a reject pushes the original request
//! back upstream over the reversal channel for a compensating delta.

pub mod audit;
pub mod engine;
pub mod events;
pub mod fix;
pub mod order_id;
pub mod recovery;

pub use audit::AuditLog;
pub use engine::{ExecutionEngine, ExecutionMetrics, NullTransport, Transport};
pub use events::{AckId, ExchangeEvent, InlineStr, RejectReason};
pub use fix::FixEncoder;
pub use order_id::OrderIdGenerator;
pub use recovery::{reconcile, OrderDisposition, Reconciliation};
