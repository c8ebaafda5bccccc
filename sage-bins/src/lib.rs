//! Shared code for the SAGE binaries

pub mod common;
