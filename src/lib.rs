//! # Tideline
//!
//! A time-series store built around two cooperating subsystems: a compaction
//! rule graph that stays consistent while keys are renamed, and a multi-range
//! query engine that reads many series at once with optional group-by-label
//! reduction.
//!
//! ## Features
//!
//! - **Rule graph**: Source → destination compaction edges with symmetric
//!   back-links, atomic under concurrent rename
//! - **Multi-range queries**: Label filters, inclusive time ranges, and
//!   GROUPBY/REDUCE over sparse timestamp unions
//! - **Policy strings**: Compact `"avg:1h;max:1d"` notation for standing
//!   compaction rules
//! - **Fine-grained locking**: Per-series locks acquired in a canonical
//!   order, never a global write lock
//!
//! ## Modules
//!
//! - [`store`]: Series registry, records, and core types
//! - [`rules`]: Compaction rule graph and policy parsing
//! - [`query`]: Multi-range query parser and engine
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tideline::query::QueryEngine;
//! use tideline::rules::RuleGraph;
//! use tideline::store::{Aggregator, SeriesRegistry};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(SeriesRegistry::new());
//!     registry.create_series(
//!         "cpu:user",
//!         [("metric_family".to_string(), "cpu".to_string())].into(),
//!     )?;
//!     registry.create_series("cpu:user:hourly", Default::default())?;
//!     registry.append("cpu:user", 1, 42.0)?;
//!
//!     // Standing compaction edge, kept consistent across renames
//!     let rules = RuleGraph::new(Arc::clone(&registry));
//!     rules.create_rule("cpu:user", "cpu:user:hourly", Aggregator::Avg, 3_600_000)?;
//!
//!     // Multi-series range query
//!     let engine = QueryEngine::for_registry(registry);
//!     let results = engine.execute_str("- + FILTER metric_family=cpu").await?;
//!     println!("{} series matched", results.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod query;
pub mod rules;
pub mod store;

// Re-export top-level types for convenience
pub use store::{
    Aggregator, CompactionRule, KeyId, Label, LabelSet, Sample, SeriesInfo, SeriesRecord,
    SeriesRegistry, StoreError, StoreResult, TimeRange,
};

pub use rules::{parse_policy, PolicyRule, RuleError, RuleGraph, RuleResult};

pub use query::{
    parse_range_query, GroupBy, LabelMatcher, MatchOp, QueryEngine, QueryError, QueryResult,
    RangeQuery, Reducer, SeriesResult,
};

pub use config::{Config, ConfigError, LoggingConfig, QueryConfig, RulesConfig};
