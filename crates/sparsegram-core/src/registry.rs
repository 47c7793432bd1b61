//! Process-wide registry: `name -> metric`, one live metric per name.
//!
//! - Lookups take only a shard read lock and clone the `Arc` out.
//! - Creation is speculative: the metric is built outside any lock, then
//!   installed only if the name is still vacant. The loser's object is
//!   dropped and every caller gets the winner.
//! - Entries are never removed. Callers are expected to keep the returned
//!   handle and record against it directly.

use std::any::Any;
use std::fmt::Write;
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::codec::{self, DecodeLimits};
use crate::error::{Result, SparsegramError};
use crate::metric::{Metric, MetricType, Snapshot, UMA_TARGETED_FLAG};
use crate::sample_map::Sample;
use crate::sparse::SparseHistogram;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

pub struct Registry {
    metrics: DashMap<String, Arc<dyn Metric>>,
    limits: DecodeLimits,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_limits(DecodeLimits::default())
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self {
            metrics: DashMap::new(),
            limits,
        }
    }

    /// The process-wide registry, created with default limits on first use.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Create the process-wide registry with `limits`.
    ///
    /// Fails if anything already touched [`Registry::global`].
    pub fn init_global(limits: DecodeLimits) -> Result<&'static Registry> {
        GLOBAL.set(Registry::with_limits(limits)).map_err(|_| {
            SparsegramError::Internal("global registry already initialized".into())
        })?;
        Ok(Registry::global())
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    /// Get or create the sparse histogram named `name`.
    pub fn sparse_histogram(&self, name: &str) -> Result<Arc<SparseHistogram>> {
        self.sparse_histogram_with_flags(name, 0)
    }

    /// Like [`Registry::sparse_histogram`], then sets `flags` on the handle.
    ///
    /// Flags accumulate: a handle created by another call site keeps the
    /// flags it already had.
    pub fn sparse_histogram_with_flags(&self, name: &str, flags: u32) -> Result<Arc<SparseHistogram>> {
        let metric = self.get_or_create(name, MetricType::SparseHistogram, || -> Arc<dyn Metric> {
            Arc::new(SparseHistogram::with_limits(name, self.limits))
        })?;
        let histogram = downcast::<SparseHistogram>(name, MetricType::SparseHistogram, metric)?;
        if flags != 0 {
            histogram.set_flags(flags);
        }
        Ok(histogram)
    }

    /// Install `metric` unless its name is taken; returns whichever metric
    /// owns the name afterwards.
    pub fn register(&self, metric: Arc<dyn Metric>) -> Result<Arc<dyn Metric>> {
        let name = metric.name().to_owned();
        let requested = metric.metric_type();
        self.get_or_create(&name, requested, move || metric)
    }

    fn get_or_create<F>(&self, name: &str, requested: MetricType, create: F) -> Result<Arc<dyn Metric>>
    where
        F: FnOnce() -> Arc<dyn Metric>,
    {
        if let Some(existing) = self.find(name) {
            return check_type(name, requested, existing);
        }

        self.validate_name(name)?;
        let candidate = create();

        let winner = match self.metrics.entry(name.to_owned()) {
            Entry::Occupied(e) => {
                tracing::debug!(metric = %name, "lost creation race; using existing metric");
                Arc::clone(e.get())
            }
            Entry::Vacant(e) => {
                tracing::debug!(metric = %name, kind = %requested, "metric created");
                Arc::clone(e.insert(candidate).value())
            }
        };
        check_type(name, requested, winner)
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(SparsegramError::InvalidArgument(
                "metric name must not be empty".into(),
            ));
        }
        if name.len() > self.limits.max_name_bytes {
            return Err(SparsegramError::InvalidArgument(format!(
                "metric name is {} bytes, limit {}",
                name.len(),
                self.limits.max_name_bytes
            )));
        }
        Ok(())
    }

    /// Existing metric for `name`. Never creates.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.metrics.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Existing sparse histogram for `name`; `None` if absent or of another type.
    pub fn find_sparse(&self, name: &str) -> Option<Arc<SparseHistogram>> {
        self.find(name)?.into_any().downcast::<SparseHistogram>().ok()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every metric, ordered by name.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.matching("").iter().map(|m| m.snapshot()).collect()
    }

    /// Decode a buffer from another process and merge it into the metric of
    /// the same name, creating it if needed.
    pub fn merge_wire_buffer(&self, buf: &[u8]) -> Result<Arc<dyn Metric>> {
        let record = codec::decode_with_limits(buf, &self.limits).map_err(|e| {
            tracing::warn!(error = %e, "rejected wire buffer");
            e
        })?;
        // Sparse is the only kind this registry can create from a record.
        record.expect_type(MetricType::SparseHistogram)?;
        let histogram = self.sparse_histogram(&record.name)?;
        histogram.merge_record(&record)?;
        let metric: Arc<dyn Metric> = histogram;
        Ok(metric)
    }

    /// Plain-text dump of every metric whose name contains `query`.
    pub fn render_text(&self, query: &str) -> String {
        let mut out = String::new();
        for metric in self.matching(query) {
            metric.write_text(&mut out);
            out.push('\n');
        }
        out
    }

    /// HTML dump of every metric whose name contains `query`.
    pub fn render_html(&self, query: &str) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "<html><head><title>Histograms: {}</title></head><body>",
            crate::sparse::escape_html(query)
        );
        for metric in self.matching(query) {
            metric.write_html(&mut out);
            out.push_str("<br><hr><br>");
        }
        out.push_str("</body></html>");
        out
    }

    /// Metrics whose name contains `query`, sorted by name. Cloned out so no
    /// registry lock is held while a metric takes its own lock.
    fn matching(&self, query: &str) -> Vec<Arc<dyn Metric>> {
        let mut found: Vec<Arc<dyn Metric>> = self
            .metrics
            .iter()
            .filter(|r| r.key().contains(query))
            .map(|r| Arc::clone(r.value()))
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        found
    }
}

fn check_type(name: &str, requested: MetricType, metric: Arc<dyn Metric>) -> Result<Arc<dyn Metric>> {
    let existing = metric.metric_type();
    if existing != requested {
        return Err(SparsegramError::DuplicateNameConflict {
            name: name.to_owned(),
            existing,
            requested,
        });
    }
    Ok(metric)
}

fn downcast<M: Any + Send + Sync>(
    name: &str,
    requested: MetricType,
    metric: Arc<dyn Metric>,
) -> Result<Arc<M>> {
    let existing = metric.metric_type();
    metric
        .into_any()
        .downcast::<M>()
        .map_err(|_| SparsegramError::DuplicateNameConflict {
            name: name.to_owned(),
            existing,
            requested,
        })
}

/// Record into a call-site cache owned by [`record_sparse!`](crate::record_sparse).
///
/// The first call resolves `name` in the global registry and marks it
/// [`UMA_TARGETED_FLAG`]; later calls reuse the cached handle. A failed
/// resolution is cached too and logged once.
#[doc(hidden)]
pub fn record_cached(slot: &OnceLock<Option<Arc<SparseHistogram>>>, name: &str, sample: Sample) {
    let handle = slot.get_or_init(|| match Registry::global().sparse_histogram_with_flags(name, UMA_TARGETED_FLAG) {
        Ok(h) => Some(h),
        Err(e) => {
            tracing::error!(metric = %name, error = %e, "cannot record sparse histogram");
            None
        }
    });
    if let Some(h) = handle {
        if let Err(e) = h.add(sample) {
            tracing::error!(metric = %name, sample, error = %e, "sparse sample dropped");
        }
    }
}

/// Record `sample` into the global sparse histogram `name`.
///
/// The handle is resolved once per call site, so `name` must not vary
/// between executions of the same call site.
#[macro_export]
macro_rules! record_sparse {
    ($name:expr, $sample:expr) => {{
        static HANDLE: ::std::sync::OnceLock<
            ::std::option::Option<::std::sync::Arc<$crate::sparse::SparseHistogram>>,
        > = ::std::sync::OnceLock::new();
        $crate::registry::record_cached(&HANDLE, $name, $sample)
    }};
}
