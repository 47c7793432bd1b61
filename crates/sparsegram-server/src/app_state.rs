//! Shared application state for the diagnostics server.

use std::sync::Arc;

use sparsegram_core::error::Result;
use sparsegram_core::{Registry, SparseHistogram};

/// Sparse histogram of HTTP response status codes served by this process.
pub const HTTP_STATUS_METRIC: &str = "sparsegram.http.status";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: &'static Registry,
    http_status: Arc<SparseHistogram>,
}

impl AppState {
    /// Build application state around `registry`.
    /// Returns Result so main can report a name conflict instead of panicking.
    pub fn new(registry: &'static Registry) -> Result<Self> {
        let http_status = registry.sparse_histogram(HTTP_STATUS_METRIC)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                registry,
                http_status,
            }),
        })
    }

    pub fn registry(&self) -> &'static Registry {
        self.inner.registry
    }

    pub fn http_status(&self) -> &Arc<SparseHistogram> {
        &self.inner.http_status
    }
}
