//! Query error types
//!
//! Defines all error conditions for multi-range query parsing and execution.
//! Syntax problems are caught before any data is fetched; fetch failures
//! from the store propagate as query-level failures and are never converted
//! to empty results.

use thiserror::Error;

/// Errors that can occur during multi-range query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Malformed query text (bad bounds, GROUPBY arity, unknown reducer,
    /// trailing tokens). Rejected wholesale before any fetch.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Range fetch or filter resolution failed in the store
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Query execution failed
    #[error("Execution error: {0}")]
    Execution(String),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
