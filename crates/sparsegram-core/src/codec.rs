//! Wire codec for metric snapshots (panic-free).
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! type_tag   u32
//! name_len   u32
//! name       [u8; name_len]   UTF-8
//! pair_count u32
//! pairs      pair_count * (sample i64, count u64)
//! ```
//!
//! Parsing rules:
//! - Never index the buffer; always check `remaining()` before a `get_*`.
//! - Never trust a declared length: bound it against the limits and against
//!   the bytes actually left.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, SparsegramError};
use crate::metric::{MetricType, Snapshot};
use crate::sample_map::{Count, Sample, SampleMap};

/// Encoded size of one `(sample, count)` pair.
pub const PAIR_LEN: usize = 16;

/// Bounds applied to declared lengths while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_name_bytes: usize,
    pub max_pairs: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_name_bytes: 1024,
            max_pairs: 1 << 20,
        }
    }
}

/// Decoded wire buffer. Consumed immediately by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    /// Raw tag; may name a type this build does not know.
    pub type_tag: u32,
    pub name: String,
    /// Pairs in buffer order. Every count is `>= 1`.
    pub pairs: Vec<(Sample, Count)>,
}

impl WireRecord {
    pub fn metric_type(&self) -> Option<MetricType> {
        MetricType::from_tag(self.type_tag)
    }

    /// Fold the pairs into a store. Fails on count overflow.
    pub fn to_sample_map(&self) -> Result<SampleMap> {
        let mut samples = SampleMap::new();
        for &(sample, count) in &self.pairs {
            samples.add_count(sample, count)?;
        }
        Ok(samples)
    }

    /// Check the record can be merged into a metric of `expected` type.
    pub fn expect_type(&self, expected: MetricType) -> Result<()> {
        if self.type_tag != expected.tag() {
            return Err(SparsegramError::TypeMismatch {
                expected,
                found: self.type_tag,
            });
        }
        Ok(())
    }
}

/// Serialize a snapshot. Pairs are written in ascending sample order.
pub fn encode(snapshot: &Snapshot) -> Result<Bytes> {
    let name = snapshot.name().as_bytes();
    let name_len = u32::try_from(name.len())
        .map_err(|_| SparsegramError::InvalidArgument("metric name too long to encode".into()))?;
    let pair_count = u32::try_from(snapshot.samples().len())
        .map_err(|_| SparsegramError::InvalidArgument("too many samples to encode".into()))?;

    let mut buf = BytesMut::with_capacity(12 + name.len() + snapshot.samples().len() * PAIR_LEN);
    buf.put_u32_le(snapshot.metric_type().tag());
    buf.put_u32_le(name_len);
    buf.put_slice(name);
    buf.put_u32_le(pair_count);
    for (sample, count) in snapshot.samples() {
        buf.put_i64_le(sample);
        buf.put_u64_le(count);
    }
    Ok(buf.freeze())
}

/// Decode with default limits.
pub fn decode(buf: &[u8]) -> Result<WireRecord> {
    decode_with_limits(buf, &DecodeLimits::default())
}

/// Decode a single record. The buffer must contain exactly one record.
pub fn decode_with_limits(mut buf: &[u8], limits: &DecodeLimits) -> Result<WireRecord> {
    let type_tag = read_u32(&mut buf, "type tag")?;

    let name_len = read_u32(&mut buf, "name length")? as usize;
    if name_len == 0 {
        return Err(SparsegramError::malformed("empty metric name"));
    }
    if name_len > limits.max_name_bytes {
        return Err(SparsegramError::malformed(format!(
            "name length {name_len} exceeds limit {}",
            limits.max_name_bytes
        )));
    }
    let name_bytes = buf.get(..name_len).ok_or_else(|| {
        SparsegramError::malformed(format!(
            "name length {name_len} past end of buffer ({} bytes left)",
            buf.remaining()
        ))
    })?;
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| SparsegramError::malformed("name is not valid UTF-8"))?
        .to_owned();
    buf.advance(name_len);

    let pair_count = read_u32(&mut buf, "pair count")? as usize;
    if pair_count > limits.max_pairs {
        return Err(SparsegramError::malformed(format!(
            "pair count {pair_count} exceeds limit {}",
            limits.max_pairs
        )));
    }
    let needed = pair_count
        .checked_mul(PAIR_LEN)
        .ok_or_else(|| SparsegramError::malformed("pair count overflows buffer size"))?;
    if buf.remaining() < needed {
        return Err(SparsegramError::malformed(format!(
            "declared {pair_count} pairs but only {} bytes left",
            buf.remaining()
        )));
    }
    if buf.remaining() > needed {
        return Err(SparsegramError::malformed(format!(
            "{} trailing bytes after last pair",
            buf.remaining() - needed
        )));
    }

    let mut pairs = Vec::with_capacity(pair_count);
    for _ in 0..pair_count {
        let sample = buf.get_i64_le();
        let count = buf.get_u64_le();
        if count == 0 {
            return Err(SparsegramError::malformed(format!(
                "zero count for sample {sample}"
            )));
        }
        pairs.push((sample, count));
    }

    Ok(WireRecord {
        type_tag,
        name,
        pairs,
    })
}

fn read_u32(buf: &mut &[u8], field: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(SparsegramError::malformed(format!("buffer too short for {field}")));
    }
    Ok(buf.get_u32_le())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn errors_snapshot() -> Snapshot {
        let mut samples = SampleMap::new();
        samples.add_count(404, 3).unwrap();
        samples.add_count(500, 1).unwrap();
        Snapshot::new(MetricType::SparseHistogram, "errors", samples)
    }

    #[test]
    fn layout_is_bit_exact() {
        let buf = encode(&errors_snapshot()).unwrap();
        let expected = hex::decode(concat!(
            "04000000",                         // type tag
            "06000000", "6572726f7273",         // "errors"
            "02000000",                         // pair count
            "9401000000000000", "0300000000000000", // 404 x3
            "f401000000000000", "0100000000000000", // 500 x1
        ))
        .unwrap();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn decode_reverses_encode() {
        let snap = errors_snapshot();
        let rec = decode(&encode(&snap).unwrap()).unwrap();
        assert_eq!(rec.metric_type(), Some(MetricType::SparseHistogram));
        assert_eq!(rec.name, "errors");
        assert_eq!(rec.pairs, snap.samples().iter().collect::<Vec<_>>());
        assert_eq!(&rec.to_sample_map().unwrap(), snap.samples());
    }

    #[test]
    fn negative_samples_survive() {
        let mut samples = SampleMap::new();
        samples.add(i64::MIN).unwrap();
        samples.add(-1).unwrap();
        let snap = Snapshot::new(MetricType::SparseHistogram, "neg", samples);
        let rec = decode(&encode(&snap).unwrap()).unwrap();
        assert_eq!(rec.pairs, vec![(i64::MIN, 1), (-1, 1)]);
    }

    #[test]
    fn truncated_pairs_rejected() {
        let buf = encode(&errors_snapshot()).unwrap();
        let err = decode(&buf[..buf.len() - 1]).unwrap_err();
        assert_eq!(err.kind().as_str(), "MALFORMED_BUFFER");
    }

    #[test]
    fn every_prefix_is_rejected() {
        let buf = encode(&errors_snapshot()).unwrap();
        for end in 0..buf.len() {
            assert!(decode(&buf[..end]).is_err(), "prefix len {end} decoded");
        }
    }

    #[test]
    fn huge_pair_count_rejected_before_allocation() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(4);
        buf.put_u32_le(1);
        buf.put_u8(b'x');
        buf.put_u32_le(u32::MAX);
        let err = decode(&buf).unwrap_err();
        assert_eq!(err.kind().as_str(), "MALFORMED_BUFFER");

        let limits = DecodeLimits {
            max_name_bytes: 8,
            max_pairs: usize::MAX,
        };
        let err = decode_with_limits(&buf, &limits).unwrap_err();
        assert_eq!(err.kind().as_str(), "MALFORMED_BUFFER");
    }

    #[test]
    fn name_limit_enforced() {
        let snap = Snapshot::new(MetricType::SparseHistogram, "a".repeat(9), SampleMap::new());
        let buf = encode(&snap).unwrap();
        let limits = DecodeLimits {
            max_name_bytes: 8,
            max_pairs: 16,
        };
        assert!(decode_with_limits(&buf, &limits).is_err());
        assert!(decode(&buf).is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let buf = encode(&Snapshot::new(MetricType::SparseHistogram, "", SampleMap::new())).unwrap();
        let err = decode(&buf).unwrap_err();
        assert_eq!(err.kind().as_str(), "MALFORMED_BUFFER");
    }

}
