//! Market data ingress
//!
//! Real connectors (WebSocket/REST, JSON decoding) live outside the core;
//! this module holds the contract they must honor toward it and a
//! simulated source used by the binaries and tests.

pub mod simulated;
pub mod validator;

pub use simulated::SimulatedFeed;
pub use validator::{ContractViolation, TickValidator};
