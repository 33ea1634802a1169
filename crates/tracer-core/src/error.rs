//! Error types for tracer-core.

use thiserror::Error;
use tracer_graph::NodeId;

use crate::log_store::VehicleId;

/// Result type for tracer-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while ingesting a dataset.
///
/// Any of these rejects the whole load; the previously loaded dataset stays
/// in place.
#[derive(Debug, Error)]
pub enum Error {
    /// A record is missing a field or has a value that cannot be normalized.
    #[error("malformed record at index {index}: {reason}")]
    MalformedData { index: usize, reason: String },

    /// A log event names a node that is not part of the facility graph.
    #[error("record at index {index}: vehicle {vehicle} reported unknown location {location}")]
    UnknownLocation {
        index: usize,
        vehicle: VehicleId,
        location: NodeId,
    },

    /// The dataset is not a JSON array of records.
    #[error("malformed dataset: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this is a parse-level failure (as opposed to a data-quality one).
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedData { .. } | Error::Json(_))
    }

    pub(crate) fn malformed(index: usize, reason: impl ToString) -> Self {
        Error::MalformedData {
            index,
            reason: reason.to_string(),
        }
    }
}

/// Reasons a raw timestamp cannot be turned into a tick count.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TimestampError {
    #[error("timestamp is empty")]
    Empty,

    #[error("timestamp {0} is negative")]
    Negative(f64),

    #[error("timestamp {0} is not a whole number")]
    Fractional(f64),

    #[error("timestamp {0} is not a finite number")]
    NotFinite(f64),

    #[error("timestamp {0} is too large")]
    TooLarge(f64),

    #[error("timestamp {0:?} is not H:MM, H:MM:SS or an integer")]
    InvalidText(String),

    #[error("timestamp {text:?} has a {field} field of {value}, expected 0-59")]
    OutOfRange {
        text: String,
        field: &'static str,
        value: u64,
    },
}
