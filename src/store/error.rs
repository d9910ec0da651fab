//! Store error types
//!
//! Errors raised by the series registry and propagated through the rule
//! graph and query engine.

use thiserror::Error;

/// Errors that can occur in the series registry
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced key does not exist
    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    /// Key already exists (series creation or rename target)
    #[error("Series already exists: {0}")]
    SeriesExists(String),

    /// Sample timestamp is not strictly greater than the last stored one
    #[error("Out-of-order sample for {key}: timestamp {timestamp} <= last {last}")]
    OutOfOrderSample {
        /// Series key
        key: String,
        /// Rejected timestamp
        timestamp: i64,
        /// Last stored timestamp
        last: i64,
    },

    /// A record lock was poisoned by a panicking writer
    #[error("Series record lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
