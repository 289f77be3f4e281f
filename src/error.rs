//! Error and Result types for listening statistics.

use thiserror::Error;

/// A convenience `Result` type for analysis operations.
pub type Result<T> = std::result::Result<T, StatsError>;

/// The error type for analysis operations.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Nothing to analyse: the input was empty or no event survived filtering.
    #[error("No valid listening data ({received} events received)")]
    NoValidData {
        /// Number of events handed to the operation before filtering.
        received: usize,
    },

    /// A caller-supplied parameter is out of range or unknown.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The history payload is not a JSON array of records.
    #[error("Malformed history payload: {0}")]
    MalformedHistory(#[source] serde_json::Error),

    /// A computed result could not be encoded for the cache.
    #[error("Cache encoding error: {0}")]
    CacheEncoding(#[source] serde_json::Error),
}

impl StatsError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        StatsError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// `NoValidData` unless there is at least one item to analyse.
    pub(crate) fn ensure_non_empty<T>(items: &[T]) -> Result<()> {
        if items.is_empty() {
            Err(StatsError::NoValidData { received: 0 })
        } else {
            Ok(())
        }
    }

    /// True when the error means "nothing to show" rather than a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, StatsError::NoValidData { .. })
    }
}
