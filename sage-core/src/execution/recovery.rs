//! Restart reconciliation from the audit log
//!
//! After a crash the audit file is the only truth about what left the
//! process. Replaying it partitions every order id into:
//!
//! - **complete** - `SENT` followed by `ACK` or `FILL`: the exchange saw it
//! - **needs exchange query** - `SENT` but no response: state unknown,
//!   ask the exchange
//! - **unsent** - `ORDER` only (or `ERROR` before any `SENT`): the
//!   exchange never received it
//!
//! The `sync` cadence bounds how much of the tail can be missing after
//! power loss; everything that made it to stable storage reconciles here.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Where an order stands after replaying the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDisposition {
    /// ORDER + SENT + (ACK | FILL)
    Complete,
    /// ORDER + SENT, no exchange response on record
    NeedsExchangeQuery,
    /// ORDER only - never transmitted
    Unsent,
    /// Terminal without transmission (REJECT or ERROR before SENT)
    Failed,
}

#[derive(Debug, Default)]
struct OrderTrace {
    ordered: bool,
    sent: bool,
    responded: bool,
    failed: bool,
}

/// Result of an audit-log replay
#[derive(Debug, Default)]
pub struct Reconciliation {
    dispositions: BTreeMap<u64, OrderDisposition>,
    /// Lines that were not parseable as records (headers excluded)
    pub malformed_lines: u64,
}

impl Reconciliation {
    pub fn disposition(&self, order_id: u64) -> Option<OrderDisposition> {
        self.dispositions.get(&order_id).copied()
    }

    pub fn ids_with(&self, disposition: OrderDisposition) -> Vec<u64> {
        self.dispositions
            .iter()
            .filter(|(_, d)| **d == disposition)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn complete(&self) -> Vec<u64> {
        self.ids_with(OrderDisposition::Complete)
    }

    pub fn needs_exchange_query(&self) -> Vec<u64> {
        self.ids_with(OrderDisposition::NeedsExchangeQuery)
    }

    pub fn unsent(&self) -> Vec<u64> {
        self.ids_with(OrderDisposition::Unsent)
    }

    pub fn len(&self) -> usize {
        self.dispositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispositions.is_empty()
    }
}

/// Replay an audit file and partition its order ids
pub fn reconcile<P: AsRef<Path>>(path: P) -> Result<Reconciliation> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("failed to open audit log {:?}", path.as_ref()))?;
    let reader = BufReader::new(file);

    let mut traces: BTreeMap<u64, OrderTrace> = BTreeMap::new();
    let mut malformed = 0u64;

    for line in reader.lines() {
        let line = line.context("failed to read audit line")?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // TIMESTAMP|EVENT|ORDER_ID[|...]
        let mut parts = line.splitn(4, '|');
        let (Some(_ts), Some(event), Some(id_str)) = (parts.next(), parts.next(), parts.next())
        else {
            malformed += 1;
            continue;
        };
        let Ok(order_id) = id_str.parse::<u64>() else {
            malformed += 1;
            continue;
        };

        let trace = traces.entry(order_id).or_default();
        match event {
            "ORDER" => trace.ordered = true,
            "SENT" => trace.sent = true,
            "ACK" | "FILL" => trace.responded = true,
            "REJECT" | "ERROR" => trace.failed = true,
            _ => malformed += 1,
        }
    }

    let dispositions = traces
        .into_iter()
        .map(|(id, t)| {
            let disposition = if t.sent && t.responded {
                OrderDisposition::Complete
            } else if t.sent {
                OrderDisposition::NeedsExchangeQuery
            } else if t.failed {
                OrderDisposition::Failed
            } else {
                OrderDisposition::Unsent
            };
            (id, disposition)
        })
        .collect();

    Ok(Reconciliation {
        dispositions,
        malformed_lines: malformed,
    })
}
