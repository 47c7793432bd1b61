//! Sparse sample store: `sample -> count` with no pre-allocated buckets.
//!
//! The store performs no locking of its own; the owning handle serializes
//! access. Every mutation is all-or-nothing: overflow and invalid arguments
//! are detected before anything is written.

use std::collections::btree_map::{self, BTreeMap};

use crate::error::{Result, SparsegramError};

/// A caller-chosen value being counted. Not a bucket index.
pub type Sample = i64;

/// Number of occurrences of one sample.
pub type Count = u64;

/// Ordered mapping from sample to occurrence count.
///
/// Invariants: every stored count is `>= 1`, and `total_count()` equals the
/// sum of the counts yielded by `iter()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleMap {
    counts: BTreeMap<Sample, Count>,
    total: Count,
}

impl SampleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `sample` by one.
    pub fn add(&mut self, sample: Sample) -> Result<()> {
        self.add_count(sample, 1)
    }

    /// Increment `sample` by `count`. A zero count is rejected.
    pub fn add_count(&mut self, sample: Sample, count: Count) -> Result<()> {
        if count == 0 {
            return Err(SparsegramError::InvalidArgument(format!(
                "count for sample {sample} must be positive"
            )));
        }
        let total = self
            .total
            .checked_add(count)
            .ok_or(SparsegramError::CountOverflow { sample })?;

        match self.counts.entry(sample) {
            btree_map::Entry::Vacant(e) => {
                e.insert(count);
            }
            btree_map::Entry::Occupied(mut e) => {
                let next = e
                    .get()
                    .checked_add(count)
                    .ok_or(SparsegramError::CountOverflow { sample })?;
                *e.get_mut() = next;
            }
        }
        self.total = total;
        Ok(())
    }

    /// Count recorded for `sample` (0 if never seen).
    pub fn count(&self, sample: Sample) -> Count {
        self.counts.get(&sample).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total_count(&self) -> Count {
        self.total
    }

    /// Number of distinct samples.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(sample, count)` pairs in ascending sample order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.counts.iter(),
        }
    }

    /// Add every pair of `other` into `self`.
    ///
    /// Merging is commutative and associative. On overflow nothing is merged.
    pub fn merge_from(&mut self, other: &SampleMap) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        let total = self.total.checked_add(other.total).ok_or_else(|| {
            // Report the first sample whose addition tips the total over.
            let sample = other.counts.keys().next().copied().unwrap_or_default();
            SparsegramError::CountOverflow { sample }
        })?;
        for (&sample, &count) in &other.counts {
            if self.count(sample).checked_add(count).is_none() {
                return Err(SparsegramError::CountOverflow { sample });
            }
        }

        for (&sample, &count) in &other.counts {
            *self.counts.entry(sample).or_insert(0) += count;
        }
        self.total = total;
        Ok(())
    }

    /// Remove `other`'s counts from `self`, dropping samples that reach zero.
    ///
    /// Fails with `InvalidArgument` (and changes nothing) if any count would
    /// go negative.
    pub fn subtract(&mut self, other: &SampleMap) -> Result<()> {
        for (&sample, &count) in &other.counts {
            if self.count(sample) < count {
                return Err(SparsegramError::InvalidArgument(format!(
                    "cannot subtract {count} from sample {sample} holding {}",
                    self.count(sample)
                )));
            }
        }

        for (&sample, &count) in &other.counts {
            if let btree_map::Entry::Occupied(mut e) = self.counts.entry(sample) {
                *e.get_mut() -= count;
                if *e.get() == 0 {
                    e.remove();
                }
            }
        }
        self.total -= other.total;
        Ok(())
    }
}

/// Ascending iterator over a [`SampleMap`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, Sample, Count>,
}

impl Iterator for Iter<'_> {
    type Item = (Sample, Count);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(&s, &c)| (s, c))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a SampleMap {
    type Item = (Sample, Count);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
