//! Bounded lock-free transport between pipeline stages
//!
//! Exactly one queue joins each pair of adjacent stages. The queue moves
//! fixed-size, trivially copyable records between one producer thread and
//! one consumer thread without locks and with bounded memory.

pub mod spsc;

pub use spsc::{channel, Consumer, Producer};
