//! Multi-Range Query Engine
//!
//! Parses and executes queries that read many series at once: a label filter
//! selects the series set, an inclusive time range bounds the read, and an
//! optional GROUPBY clause collapses the set into one synthetic series per
//! label value.
//!
//! - **ast**: Parsed query form and the reducer set
//! - **parser**: nom parser for the textual query tail
//! - **engine**: Execution over the filter-resolver / range-fetcher seams
//! - **result**: Output shape handed to the protocol layer
//! - **error**: Error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tideline::query::QueryEngine;
//! use tideline::store::SeriesRegistry;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(SeriesRegistry::new());
//! registry.create_series(
//!     "cpu1",
//!     [("metric_family".to_string(), "cpu".to_string())].into(),
//! )?;
//! registry.append("cpu1", 1, 100.0)?;
//!
//! let engine = QueryEngine::for_registry(registry);
//! let results = engine.execute_str("- + FILTER metric_family=cpu").await?;
//! assert_eq!(results.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod parser;
pub mod result;

pub use ast::{GroupBy, LabelMatcher, MatchOp, RangeQuery, RangeQueryBuilder, Reducer};
pub use engine::{FilterResolver, QueryEngine, RangeFetcher};
pub use error::{QueryError, QueryResult};
pub use parser::parse_range_query;
pub use result::SeriesResult;
