//! Top-level facade crate for sparsegram.
//!
//! Re-exports the core types and the diagnostics server library so users can
//! depend on a single crate.

pub mod core {
    pub use sparsegram_core::*;
}

pub mod server {
    pub use sparsegram_server::*;
}

pub use sparsegram_core::record_sparse;
