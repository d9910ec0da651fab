//! Compaction Rule Graph
//!
//! Directed source → destination compaction edges over the series registry:
//!
//! - **graph**: rule creation/deletion and rename propagation
//! - **policy**: compaction policy string parsing and materialization
//! - **error**: error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tideline::rules::RuleGraph;
//! use tideline::store::{Aggregator, LabelSet, SeriesRegistry};
//!
//! let registry = Arc::new(SeriesRegistry::new());
//! registry.create_series("requests", LabelSet::new()).unwrap();
//! registry.create_series("requests_hourly", LabelSet::new()).unwrap();
//!
//! let graph = RuleGraph::new(Arc::clone(&registry));
//! graph.create_rule("requests", "requests_hourly", Aggregator::Sum, 3_600_000).unwrap();
//!
//! // The store's rename path notifies the graph; every edge follows.
//! graph.on_rename("requests", "requests_total").unwrap();
//! let info = registry.describe("requests_hourly").unwrap();
//! assert_eq!(info.source_key.as_deref(), Some("requests_total"));
//! ```

mod error;
mod graph;
mod policy;

pub use error::{RuleError, RuleResult};
pub use graph::RuleGraph;
pub use policy::{parse_policy, PolicyRule};
