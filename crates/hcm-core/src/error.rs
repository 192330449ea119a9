//! Error types shared by the control plane.
//!
//! Every failure that leaves a crate boundary is classified into an
//! [`ErrorKind`]. The task executor uses the kind, and nothing else, to decide
//! whether a failed Action run is retried.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::IdError;

/// Result type for control plane operations.
pub type Result<T> = std::result::Result<T, HcmError>;

/// Classification of a failure, used for retry decisions and for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing Action input. Never retried.
    InvalidParameter,

    /// A Vendor Adapter call failed. Retried with backoff.
    UpstreamUnavailable,

    /// A Storage Layer call failed. Retried with backoff.
    StorageFailure,

    /// Stored data contradicts an invariant. Never retried; needs an operator.
    InvariantViolation,

    /// The run was cancelled by its submitter. Never retried.
    Cancelled,
}

impl ErrorKind {
    /// Whether the executor may retry a run that failed with this kind.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::UpstreamUnavailable | Self::StorageFailure)
    }

    /// Stable string form used in logs and API responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid_parameter",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::StorageFailure => "storage_failure",
            Self::InvariantViolation => "invariant_violation",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in control plane operations.
#[derive(Debug, thiserror::Error)]
pub enum HcmError {
    /// Action input failed to decode or validate.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Vendor Adapter call failed.
    #[error("upstream unavailable: {vendor} - {message}")]
    UpstreamUnavailable {
        /// The vendor (or gateway) that failed.
        vendor: String,
        /// Error message.
        message: String,
    },

    /// Storage Layer call failed.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Stored state contradicts an invariant (for example, two pull tasks
    /// for one billing key).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The execution context was cancelled before the work finished.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl HcmError {
    /// The retry classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) | Self::InvalidId(_) => ErrorKind::InvalidParameter,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Whether the executor may retry after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create an upstream error.
    pub fn upstream(vendor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            vendor: vendor.into(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailure(message.into())
    }

    /// Create an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}
