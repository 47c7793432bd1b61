//! sparsegram core: sparse histograms, their process-wide registry, and the
//! wire codec used to merge them across processes.
//!
//! This crate carries no async runtime so it can be linked into any process
//! that wants to count things.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. A corrupt buffer
//! from another process surfaces as `SparsegramError::MalformedBuffer` and
//! never alters local state.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod error;
pub mod metric;
pub mod registry;
pub mod sample_map;
pub mod sparse;

pub use codec::{DecodeLimits, WireRecord};
pub use error::{ErrorKind, Result, SparsegramError};
pub use metric::{Metric, MetricType, Snapshot, UMA_TARGETED_FLAG};
pub use registry::Registry;
pub use sample_map::{Count, Sample, SampleMap};
pub use sparse::SparseHistogram;
