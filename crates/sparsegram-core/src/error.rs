//! Shared error type across sparsegram crates.

use thiserror::Error;

use crate::metric::MetricType;

/// Stable error codes, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-positive count or otherwise unusable argument.
    InvalidArgument,
    /// Wire record declares a different metric type than the target.
    TypeMismatch,
    /// Wire record belongs to a differently named metric.
    NameMismatch,
    /// Truncated or internally inconsistent wire buffer.
    MalformedBuffer,
    /// A metric of another type already owns the name.
    DuplicateNameConflict,
    /// A count would exceed `u64::MAX`.
    CountOverflow,
    /// Configuration rejected by validation.
    InvalidConfig,
    /// Anything else (I/O, startup).
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::TypeMismatch => "TYPE_MISMATCH",
            ErrorKind::NameMismatch => "NAME_MISMATCH",
            ErrorKind::MalformedBuffer => "MALFORMED_BUFFER",
            ErrorKind::DuplicateNameConflict => "DUPLICATE_NAME_CONFLICT",
            ErrorKind::CountOverflow => "COUNT_OVERFLOW",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SparsegramError>;

/// Unified error type used by core and server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SparsegramError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("type mismatch: expected {expected}, found tag {found}")]
    TypeMismatch { expected: MetricType, found: u32 },
    #[error("name mismatch: expected {expected:?}, found {found:?}")]
    NameMismatch { expected: String, found: String },
    #[error("malformed buffer: {0}")]
    MalformedBuffer(String),
    #[error("metric {name:?} already registered as {existing}, requested {requested}")]
    DuplicateNameConflict {
        name: String,
        existing: MetricType,
        requested: MetricType,
    },
    #[error("count overflow for sample {sample}")]
    CountOverflow { sample: i64 },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl SparsegramError {
    /// Map to the stable error code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SparsegramError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SparsegramError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            SparsegramError::NameMismatch { .. } => ErrorKind::NameMismatch,
            SparsegramError::MalformedBuffer(_) => ErrorKind::MalformedBuffer,
            SparsegramError::DuplicateNameConflict { .. } => ErrorKind::DuplicateNameConflict,
            SparsegramError::CountOverflow { .. } => ErrorKind::CountOverflow,
            SparsegramError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            SparsegramError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        SparsegramError::MalformedBuffer(msg.into())
    }
}
