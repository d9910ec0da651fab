//! Rule graph error types
//!
//! Precondition violations for rule mutations. Every failed mutation leaves
//! the graph exactly as it was; there is no partial edge rewrite to clean up.

use crate::store::StoreError;
use std::fmt;

/// Errors that can occur during rule graph operations
#[derive(Debug)]
pub enum RuleError {
    /// The destination series is already fed by a compaction rule
    DuplicateSource(String),

    /// Source and destination are the same key
    SelfLoop(String),

    /// No rule exists between the given source and destination
    RuleNotFound {
        /// Source key
        source: String,
        /// Destination key
        destination: String,
    },

    /// Bucket duration must be positive
    InvalidBucket(u64),

    /// Malformed compaction policy string
    InvalidPolicy(String),

    /// Underlying registry error
    Store(StoreError),
}

// Manual impls instead of `#[derive(thiserror::Error)]`: the `RuleNotFound`
// variant has a field named `source`, which thiserror unconditionally treats
// as the error source and `String` does not implement `Error`.
impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::DuplicateSource(key) => {
                write!(f, "Destination {} already has a source rule", key)
            }
            RuleError::SelfLoop(key) => {
                write!(f, "Compaction rule may not point a series at itself: {}", key)
            }
            RuleError::RuleNotFound {
                source,
                destination,
            } => write!(f, "No rule from {} to {}", source, destination),
            RuleError::InvalidBucket(bucket) => write!(f, "Invalid bucket duration: {}", bucket),
            RuleError::InvalidPolicy(policy) => write!(f, "Invalid compaction policy: {}", policy),
            RuleError::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for RuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuleError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RuleError {
    fn from(err: StoreError) -> Self {
        RuleError::Store(err)
    }
}

/// Result type for rule graph operations
pub type RuleResult<T> = Result<T, RuleError>;
