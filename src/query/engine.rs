//! Multi-Range Query Engine
//!
//! Answers "for every series matching a label filter over a time range, give
//! me its samples — optionally grouped by a label and reduced to one series
//! per group".
//!
//! # Execution pipeline
//!
//! ```text
//! RangeQuery → Filter Resolver → Range Fetcher per series
//!            → (group by label value → timestamp union → pointwise reduce)
//!            → first-N truncate → sorted output
//! ```
//!
//! The filter resolver and range fetcher are external collaborators behind
//! trait seams; [`SeriesRegistry`] implements both so the engine runs
//! self-contained in tests and single-process deployments.
//!
//! Results are assembled privately and surface only on success: a cancelled
//! or failed query never leaves partial group state visible to anyone.

use crate::query::ast::{LabelMatcher, RangeQuery};
use crate::query::error::{QueryError, QueryResult};
use crate::query::parser::parse_range_query;
use crate::query::result::SeriesResult;
use crate::store::{KeyId, Label, LabelSet, Sample, SeriesRegistry, StoreError, TimeRange};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolves a filter expression to the matching set of series
///
/// An empty match set is a valid outcome, not an error.
#[async_trait]
pub trait FilterResolver: Send + Sync {
    /// Return every series whose labels satisfy all matchers
    async fn resolve(&self, matchers: &[LabelMatcher])
        -> Result<Vec<(KeyId, LabelSet)>, StoreError>;
}

/// Fetches the ordered samples of one series inside a time range
///
/// Returned timestamps are strictly increasing with no duplicates.
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    /// Fetch samples with timestamps inside the inclusive range
    async fn fetch_range(&self, id: &str, range: TimeRange) -> Result<Vec<Sample>, StoreError>;
}

#[async_trait]
impl FilterResolver for SeriesRegistry {
    async fn resolve(
        &self,
        matchers: &[LabelMatcher],
    ) -> Result<Vec<(KeyId, LabelSet)>, StoreError> {
        let all = self.all_series()?;
        Ok(all
            .into_iter()
            .filter(|(_, labels)| matchers.iter().all(|m| m.matches(labels)))
            .collect())
    }
}

#[async_trait]
impl RangeFetcher for SeriesRegistry {
    async fn fetch_range(&self, id: &str, range: TimeRange) -> Result<Vec<Sample>, StoreError> {
        SeriesRegistry::fetch_range(self, id, range)
    }
}

/// The multi-range query engine
pub struct QueryEngine {
    /// Filter expression → series set
    resolver: Arc<dyn FilterResolver>,
    /// Per-series sample reads
    fetcher: Arc<dyn RangeFetcher>,
    /// Upper bound on fetched samples per query, from
    /// `QueryConfig.max_result_samples`
    result_cap: Option<usize>,
}

impl QueryEngine {
    /// Create an engine over explicit collaborators
    pub fn new(resolver: Arc<dyn FilterResolver>, fetcher: Arc<dyn RangeFetcher>) -> Self {
        Self {
            resolver,
            fetcher,
            result_cap: None,
        }
    }

    /// Create an engine backed entirely by a series registry
    pub fn for_registry(registry: Arc<SeriesRegistry>) -> Self {
        Self {
            resolver: Arc::clone(&registry) as Arc<dyn FilterResolver>,
            fetcher: registry as Arc<dyn RangeFetcher>,
            result_cap: None,
        }
    }

    /// Cap the total samples a single query may fetch
    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = Some(cap);
        self
    }

    /// Parse and execute a query string
    pub async fn execute_str(&self, input: &str) -> QueryResult<Vec<SeriesResult>> {
        let query = parse_range_query(input)?;
        self.execute(&query).await
    }

    /// Execute a parsed query
    pub async fn execute(&self, query: &RangeQuery) -> QueryResult<Vec<SeriesResult>> {
        let matched = self.resolver.resolve(&query.matchers).await?;
        tracing::debug!(
            "Multi-range query matched {} series (group_by: {})",
            matched.len(),
            query.group_by.is_some()
        );

        match &query.group_by {
            None => self.execute_flat(query, matched).await,
            Some(_) => self.execute_grouped(query, matched).await,
        }
    }

    /// No-group-by path: one output series per match, ascending by key
    async fn execute_flat(
        &self,
        query: &RangeQuery,
        mut matched: Vec<(KeyId, LabelSet)>,
    ) -> QueryResult<Vec<SeriesResult>> {
        matched.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fetched = 0usize;
        let mut out = Vec::with_capacity(matched.len());
        for (id, labels) in matched {
            let mut samples = self.fetcher.fetch_range(&id, query.range).await?;
            fetched += samples.len();
            self.check_cap(fetched)?;
            if let Some(n) = query.count {
                samples.truncate(n);
            }
            let labels = query.with_labels.then(|| sorted_labels(&labels));
            out.push(SeriesResult::new(id, labels, samples));
        }
        Ok(out)
    }

    /// Group-by path: partition by label value, align the sparse timestamp
    /// union, reduce pointwise over present values
    async fn execute_grouped(
        &self,
        query: &RangeQuery,
        matched: Vec<(KeyId, LabelSet)>,
    ) -> QueryResult<Vec<SeriesResult>> {
        let group_by = match &query.group_by {
            Some(g) => g,
            None => return Ok(Vec::new()),
        };

        // Partition by label value. A series lacking the label is excluded
        // from every group; BTreeMap keeps groups in ascending value order,
        // which is part of the output contract.
        let mut groups: BTreeMap<String, Vec<KeyId>> = BTreeMap::new();
        for (id, labels) in &matched {
            if let Some(value) = labels.get(&group_by.label) {
                groups.entry(value.clone()).or_default().push(id.clone());
            }
        }

        let mut fetched = 0usize;
        let mut out = Vec::with_capacity(groups.len());
        for (value, members) in groups {
            // Sparse union of member timestamps: members need not all carry
            // a value at any given timestamp.
            let mut aligned: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
            for id in &members {
                let samples = self.fetcher.fetch_range(id, query.range).await?;
                fetched += samples.len();
                self.check_cap(fetched)?;
                for sample in samples {
                    aligned
                        .entry(sample.timestamp)
                        .or_default()
                        .push(sample.value);
                }
            }

            let mut samples: Vec<Sample> = aligned
                .into_iter()
                .filter_map(|(ts, values)| {
                    group_by.reducer.apply(&values).map(|v| Sample::new(ts, v))
                })
                .collect();
            if let Some(n) = query.count {
                samples.truncate(n);
            }

            let name = format!("{}={}", group_by.label, value);
            let labels = query
                .with_labels
                .then(|| vec![Label::new(&group_by.label, &value)]);
            out.push(SeriesResult::new(name, labels, samples));
        }
        Ok(out)
    }

    fn check_cap(&self, fetched: usize) -> QueryResult<()> {
        match self.result_cap {
            Some(cap) if fetched > cap => Err(QueryError::Execution(format!(
                "query would fetch more than {} samples",
                cap
            ))),
            _ => Ok(()),
        }
    }
}

/// Order a label set by name for deterministic output
fn sorted_labels(labels: &LabelSet) -> Vec<Label> {
    let mut out: Vec<Label> = labels
        .iter()
        .map(|(name, value)| Label::new(name, value))
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}
