//! Metric capability shared by every metric kind held in a [`Registry`].
//!
//! [`Registry`]: crate::registry::Registry

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec;
use crate::error::Result;
use crate::sample_map::{Count, Sample, SampleMap};

/// Flag set by call sites reporting to the upload pipeline. Flags appear in
/// dump headers only; they are never encoded on the wire.
pub const UMA_TARGETED_FLAG: u32 = 0x1;

/// Type tag carried on the wire and checked before any merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MetricType {
    Histogram = 0,
    LinearHistogram = 1,
    BooleanHistogram = 2,
    CustomHistogram = 3,
    SparseHistogram = 4,
}

impl MetricType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(MetricType::Histogram),
            1 => Some(MetricType::LinearHistogram),
            2 => Some(MetricType::BooleanHistogram),
            3 => Some(MetricType::CustomHistogram),
            4 => Some(MetricType::SparseHistogram),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Histogram => "HISTOGRAM",
            MetricType::LinearHistogram => "LINEAR_HISTOGRAM",
            MetricType::BooleanHistogram => "BOOLEAN_HISTOGRAM",
            MetricType::CustomHistogram => "CUSTOM_HISTOGRAM",
            MetricType::SparseHistogram => "SPARSE_HISTOGRAM",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable point-in-time copy of one metric: identity plus samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    metric_type: MetricType,
    name: String,
    samples: SampleMap,
}

impl Snapshot {
    pub fn new(metric_type: MetricType, name: impl Into<String>, samples: SampleMap) -> Self {
        Self {
            metric_type,
            name: name.into(),
            samples,
        }
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &SampleMap {
        &self.samples
    }

    pub fn total_count(&self) -> Count {
        self.samples.total_count()
    }

    pub fn into_samples(self) -> SampleMap {
        self.samples
    }

    /// Serialize with the wire codec.
    pub fn encode(&self) -> Result<Bytes> {
        codec::encode(self)
    }
}

/// Uniform capability of a named metric.
///
/// Implementations own their state behind their own lock; callers only ever
/// observe it through [`Metric::snapshot`] or the render methods.
pub trait Metric: fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn metric_type(&self) -> MetricType;

    fn add(&self, sample: Sample) -> Result<()>;

    fn add_count(&self, sample: Sample, count: Count) -> Result<()>;

    fn snapshot(&self) -> Snapshot;

    /// Decode `buf` and merge its samples. On error the metric is unchanged.
    fn merge_wire_buffer(&self, buf: &[u8]) -> Result<()>;

    /// Append the plain-text dump to `out`.
    fn write_text(&self, out: &mut String);

    /// Append the HTML dump to `out`.
    fn write_html(&self, out: &mut String);

    fn render_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn render_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn encode(&self) -> Result<Bytes> {
        codec::encode(&self.snapshot())
    }

    /// Upcast used by the registry for typed lookups.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
