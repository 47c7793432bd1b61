//! Named sparse histogram: one [`SampleMap`] behind one lock.
//!
//! All access goes through the handle's own lock; the live map is never
//! exposed. Readers get owned snapshots, so encoding or rendering can happen
//! after the lock is released.

use std::any::Any;
use std::fmt::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::codec::{self, DecodeLimits, WireRecord};
use crate::error::{Result, SparsegramError};
use crate::metric::{Metric, MetricType, Snapshot};
use crate::sample_map::{Count, Sample, SampleMap};

#[derive(Debug, Default)]
struct State {
    samples: SampleMap,
    /// Samples already handed out by `snapshot_delta`.
    logged: SampleMap,
}

/// A counter keyed by arbitrary integer samples.
#[derive(Debug)]
pub struct SparseHistogram {
    name: String,
    limits: DecodeLimits,
    flags: AtomicU32,
    state: Mutex<State>,
}

/// Width of the bar drawn for the largest count in the HTML dump.
const GRAPH_WIDTH: usize = 72;

impl SparseHistogram {
    /// Create a detached handle. Use [`Registry::sparse_histogram`] to get the
    /// process-wide one.
    ///
    /// [`Registry::sparse_histogram`]: crate::registry::Registry::sparse_histogram
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_limits(name, DecodeLimits::default())
    }

    pub fn with_limits(name: impl Into<String>, limits: DecodeLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            flags: AtomicU32::new(0),
            state: Mutex::new(State::default()),
        }
    }

    pub fn flags(&self) -> u32 {
        self.flags.load(Ordering::Relaxed)
    }

    /// Add `flags` to the ones already set.
    pub fn set_flags(&self, flags: u32) {
        self.flags.fetch_or(flags, Ordering::Relaxed);
    }

    pub fn clear_flags(&self, flags: u32) {
        self.flags.fetch_and(!flags, Ordering::Relaxed);
    }

    /// Sum of all recorded counts.
    pub fn total_count(&self) -> Count {
        self.lock().samples.total_count()
    }

    /// Samples recorded since the previous call, which are then marked logged.
    ///
    /// Merged-in samples count as recorded, so a process relaying deltas it
    /// received will relay them again.
    pub fn snapshot_delta(&self) -> Result<Snapshot> {
        let mut state = self.lock();
        let mut delta = state.samples.clone();
        delta.subtract(&state.logged)?;
        state.logged = state.samples.clone();
        Ok(Snapshot::new(MetricType::SparseHistogram, &self.name, delta))
    }

    /// Merge an already decoded record of the same type and name.
    pub fn merge_record(&self, record: &WireRecord) -> Result<()> {
        record.expect_type(MetricType::SparseHistogram)?;
        self.expect_name(&record.name)?;
        let incoming = record.to_sample_map()?;
        self.lock().samples.merge_from(&incoming)
    }

    /// Merge a snapshot of the same type and name.
    pub fn merge_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.metric_type() != MetricType::SparseHistogram {
            return Err(SparsegramError::TypeMismatch {
                expected: MetricType::SparseHistogram,
                found: snapshot.metric_type().tag(),
            });
        }
        self.expect_name(snapshot.name())?;
        self.lock().samples.merge_from(snapshot.samples())
    }

    fn expect_name(&self, found: &str) -> Result<()> {
        if found != self.name {
            return Err(SparsegramError::NameMismatch {
                expected: self.name.clone(),
                found: found.to_owned(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // SampleMap validates before writing, so a poisoned state is consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_header(&self, name: &str, samples: &SampleMap, newline: &str, out: &mut String) {
        let _ = write!(
            out,
            "Histogram: {} recorded {} samples",
            name,
            samples.total_count()
        );
        let flags = self.flags();
        if flags != 0 {
            let _ = write!(out, ", flags = {flags:#x}");
        }
        out.push_str(newline);
    }
}

/// One `sample: count` line per sample, padded so the bars line up, then a
/// bar scaled to the largest count and the share of the total.
fn write_graph(samples: &SampleMap, out: &mut String) {
    let labels: Vec<(String, Count)> = samples
        .iter()
        .map(|(sample, count)| (format!("{sample}: {count}"), count))
        .collect();
    let width = labels.iter().map(|(l, _)| l.len()).max().unwrap_or(0) + 1;
    let largest = labels.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let total = samples.total_count();

    for (label, count) in &labels {
        let filled = if largest == 0 {
            0
        } else {
            (GRAPH_WIDTH as f64 * *count as f64 / largest as f64) as usize
        };
        let pct = if total == 0 {
            0.0
        } else {
            *count as f64 * 100.0 / total as f64
        };
        let _ = write!(
            out,
            "{label:<width$}{}O{} ({count} = {pct:.1}%)<br>",
            "-".repeat(filled),
            " ".repeat(GRAPH_WIDTH - filled.min(GRAPH_WIDTH)),
        );
    }
}

impl Metric for SparseHistogram {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric_type(&self) -> MetricType {
        MetricType::SparseHistogram
    }

    fn add(&self, sample: Sample) -> Result<()> {
        self.lock().samples.add(sample)
    }

    fn add_count(&self, sample: Sample, count: Count) -> Result<()> {
        self.lock().samples.add_count(sample, count)
    }

    fn snapshot(&self) -> Snapshot {
        let samples = self.lock().samples.clone();
        Snapshot::new(MetricType::SparseHistogram, &self.name, samples)
    }

    fn merge_wire_buffer(&self, buf: &[u8]) -> Result<()> {
        let record = codec::decode_with_limits(buf, &self.limits).map_err(|e| {
            tracing::warn!(metric = %self.name, error = %e, "rejected wire buffer");
            e
        })?;
        self.merge_record(&record)
    }

    fn write_text(&self, out: &mut String) {
        let samples = self.lock().samples.clone();
        self.write_header(&self.name, &samples, "\n", out);
        for (sample, count) in &samples {
            let _ = writeln!(out, "{sample}: {count}");
        }
    }

    fn write_html(&self, out: &mut String) {
        let samples = self.lock().samples.clone();
        out.push_str("<PRE>");
        self.write_header(&escape_html(&self.name), &samples, "<br>", out);
        write_graph(&samples, out);
        out.push_str("</PRE>");
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn errors_histogram() -> SparseHistogram {
        let h = SparseHistogram::new("errors");
        for _ in 0..3 {
            h.add(404).unwrap();
        }
        h.add(500).unwrap();
        h
    }

    #[test]
    fn render_text_lists_samples_in_order() {
        let h = errors_histogram();
        assert_eq!(h.total_count(), 4);
        assert_eq!(
            h.render_text(),
            "Histogram: errors recorded 4 samples\n404: 3\n500: 1\n"
        );
    }

    #[test]
    fn render_empty() {
        let h = SparseHistogram::new("empty");
        assert_eq!(h.render_text(), "Histogram: empty recorded 0 samples\n");
    }

    #[test]
    fn render_html_escapes_name() {
        let h = SparseHistogram::new("a<b>&c");
        h.add(-1).unwrap();
        let bar = "-".repeat(GRAPH_WIDTH);
        assert_eq!(
            h.render_html(),
            format!("<PRE>Histogram: a&lt;b&gt;&amp;c recorded 1 samples<br>-1: 1 {bar}O (1 = 100.0%)<br></PRE>")
        );
    }

    #[test]
    fn render_html_scales_bars_to_largest_count() {
        let h = errors_histogram();
        let html = h.render_html();
        let full = "-".repeat(GRAPH_WIDTH);
        let third = "-".repeat(GRAPH_WIDTH / 3);
        let pad = " ".repeat(GRAPH_WIDTH - GRAPH_WIDTH / 3);
        assert_eq!(
            html,
            format!(
                "<PRE>Histogram: errors recorded 4 samples<br>\
                 404: 3 {full}O (3 = 75.0%)<br>\
                 500: 1 {third}O{pad} (1 = 25.0%)<br></PRE>"
            )
        );
    }

    #[test]
    fn render_html_empty_has_header_only() {
        let h = SparseHistogram::new("idle");
        assert_eq!(h.render_html(), "<PRE>Histogram: idle recorded 0 samples<br></PRE>");
    }

    #[test]
    fn flags_shown_in_header_not_on_wire() {
        let h = errors_histogram();
        let plain = h.encode().unwrap();
        h.set_flags(crate::metric::UMA_TARGETED_FLAG);
        assert_eq!(h.flags(), 0x1);
        assert_eq!(
            h.render_text(),
            "Histogram: errors recorded 4 samples, flags = 0x1\n404: 3\n500: 1\n"
        );
        assert!(h
            .render_html()
            .starts_with("<PRE>Histogram: errors recorded 4 samples, flags = 0x1<br>"));
        assert_eq!(h.encode().unwrap(), plain);

        h.clear_flags(crate::metric::UMA_TARGETED_FLAG);
        assert_eq!(h.flags(), 0);
        assert!(!h.render_text().contains("flags"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let h = errors_histogram();
        let snap = h.snapshot();
        h.add(1).unwrap();
        assert_eq!(snap.total_count(), 4);
        assert_eq!(h.total_count(), 5);
        assert_eq!(snap.name(), "errors");
        assert_eq!(snap.metric_type(), MetricType::SparseHistogram);
    }

    #[test]
    fn zero_count_rejected_and_lock_released() {
        let h = SparseHistogram::new("x");
        let err = h.add_count(1, 0).unwrap_err();
        assert_eq!(err.kind().as_str(), "INVALID_ARGUMENT");
        // lock must be free again
        h.add(1).unwrap();
        assert_eq!(h.total_count(), 1);
    }

    #[test]
    fn delta_reports_only_new_samples() {
        let h = SparseHistogram::new("d");
        h.add(1).unwrap();
        h.add(2).unwrap();
        assert_eq!(h.snapshot_delta().unwrap().total_count(), 2);

        h.add(2).unwrap();
        let delta = h.snapshot_delta().unwrap();
        assert_eq!(delta.samples().iter().collect::<Vec<_>>(), vec![(2, 1)]);

        assert!(h.snapshot_delta().unwrap().samples().is_empty());
        assert_eq!(h.total_count(), 3);
    }

    #[test]
    fn merge_adds_rather_than_replaces() {
        let producer = SparseHistogram::new("seven");
        let consumer = SparseHistogram::new("seven");
        for _ in 0..5 {
            producer.add(7).unwrap();
            consumer.add(7).unwrap();
        }
        consumer.merge_wire_buffer(&producer.encode().unwrap()).unwrap();
        assert_eq!(consumer.snapshot().samples().count(7), 10);
        assert_eq!(consumer.total_count(), 10);
    }

    #[test]
    fn merge_checks_name() {
        let a = errors_histogram();
        let b = SparseHistogram::new("other");
        let err = b.merge_wire_buffer(&a.encode().unwrap()).unwrap_err();
        assert_eq!(err.kind().as_str(), "NAME_MISMATCH");
        assert_eq!(b.total_count(), 0);

        let err = b.merge_snapshot(&a.snapshot()).unwrap_err();
        assert_eq!(err.kind().as_str(), "NAME_MISMATCH");
    }
}
