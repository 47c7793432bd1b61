//! sparsegram diagnostics server library entry.
//!
//! Wires config, the shared registry, and the HTTP dump endpoints into one
//! router. Consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
