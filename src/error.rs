//! Error types for dataset preparation and container I/O.

use thiserror::Error;

/// Errors raised by the data model, the pipeline and the container codec.
///
/// Every variant is fatal: operations validate their input before mutating
/// anything, so an error never leaves a dataset half-transformed.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Shape or type mismatch between records.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Split name outside `train`, `validation`, `test`.
    #[error("unknown split '{0}' (expected train, validation or test)")]
    UnknownSplit(String),

    /// Header field name not present in the layout.
    #[error("'{0}' is not a field of this header")]
    UnknownField(String),

    /// Record side selector other than attributes or targets.
    #[error("unrecognized target '{0}' (expected attributes or targets)")]
    InvalidTarget(String),

    /// Element type other than float or double.
    #[error("unsupported element type '{0}' (expected float or double)")]
    InvalidType(String),

    /// Container declares a layout this reader does not know.
    #[error("unknown container format version {0}")]
    UnknownFormatVersion(u16),

    /// Stratified extraction could not reach the requested tolerance.
    #[error("class balancing failed after {iterations} swaps: {reason}")]
    BalancingFailed {
        /// Swaps performed before giving up.
        iterations: usize,
        /// What stopped the search.
        reason: String,
    },

    /// Conflicting or out-of-range operation parameters.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Flat index past the end of a container or resource.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Length at the time of the request.
        len: usize,
    },

    /// Container bytes are truncated or inconsistent with the header.
    #[error("corrupt container: {0}")]
    Corrupt(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatasetError {
    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition(reason.into())
    }

    /// Creates an unknown split error.
    #[must_use]
    pub fn unknown_split(name: impl Into<String>) -> Self {
        Self::UnknownSplit(name.into())
    }

    /// Creates an unknown header field error.
    #[must_use]
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    /// Creates an invalid target error.
    #[must_use]
    pub fn invalid_target(name: impl Into<String>) -> Self {
        Self::InvalidTarget(name.into())
    }

    /// Creates an invalid type error.
    #[must_use]
    pub fn invalid_type(name: impl Into<String>) -> Self {
        Self::InvalidType(name.into())
    }

    /// Creates a balancing failure.
    #[must_use]
    pub fn balancing_failed(iterations: usize, reason: impl Into<String>) -> Self {
        Self::BalancingFailed {
            iterations,
            reason: reason.into(),
        }
    }

    /// Creates an invalid parameters error.
    #[must_use]
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters(reason.into())
    }

    /// Creates an out-of-range error.
    #[must_use]
    pub const fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Creates a corrupt container error.
    #[must_use]
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt(reason.into())
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
