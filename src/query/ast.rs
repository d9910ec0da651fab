//! Multi-range query AST
//!
//! Defines the parsed form of a multi-series range query: the time range,
//! the label matchers handed to the filter resolver, and the optional
//! group-by-label reduction.
//!
//! # Example queries
//!
//! ```text
//! - + FILTER metric_family=cpu
//! - + WITHLABELS FILTER metric_family=cpu GROUPBY metric_name REDUCE max
//! 1000 2000 COUNT 10 FILTER host=web1 role!=canary
//! ```

use crate::store::TimeRange;
use serde::{Deserialize, Serialize};

/// A parsed multi-range query ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    /// Inclusive time range to read
    pub range: TimeRange,
    /// Label matchers resolved to a series set by the filter resolver
    pub matchers: Vec<LabelMatcher>,
    /// Attach label metadata to each output series
    pub with_labels: bool,
    /// Keep only the earliest `count` samples per output series, applied
    /// after any reduction
    pub count: Option<usize>,
    /// Optional group-by-label reduction
    pub group_by: Option<GroupBy>,
}

impl RangeQuery {
    /// Start building a query over the given range
    pub fn over(range: TimeRange) -> RangeQueryBuilder {
        RangeQueryBuilder::new(range)
    }

    /// Start building a query over the full time axis
    pub fn all_time() -> RangeQueryBuilder {
        RangeQueryBuilder::new(TimeRange::all())
    }
}

/// How a matcher compares a label value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// Label present and equal
    Eq,
    /// Label absent, or present and different
    Ne,
}

/// A single label matcher in the filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    /// Label name
    pub name: String,
    /// Comparison operator
    pub op: MatchOp,
    /// Value to compare against
    pub value: String,
}

impl LabelMatcher {
    /// Equality matcher: `name=value`
    pub fn eq(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Eq,
            value: value.into(),
        }
    }

    /// Inequality matcher: `name!=value`
    pub fn ne(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Ne,
            value: value.into(),
        }
    }

    /// Evaluate this matcher against a label set
    pub fn matches(&self, labels: &crate::store::LabelSet) -> bool {
        match labels.get(&self.name) {
            Some(value) => match self.op {
                MatchOp::Eq => value == &self.value,
                MatchOp::Ne => value != &self.value,
            },
            // Absent label: only "not equal" holds.
            None => self.op == MatchOp::Ne,
        }
    }
}

/// GROUPBY clause: partition by a label value and reduce each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    /// Label whose value keys the partitions
    pub label: String,
    /// Reducer collapsing each partition into one synthetic series
    pub reducer: Reducer,
}

impl GroupBy {
    /// Create a new group-by clause
    pub fn new(label: impl Into<String>, reducer: Reducer) -> Self {
        Self {
            label: label.into(),
            reducer,
        }
    }
}

/// Reducers available to GROUPBY
///
/// A closed set validated at parse time; each variant is a commutative,
/// associative fold over the values present at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Maximum of present values
    Max,
    /// Minimum of present values
    Min,
    /// Sum of present values
    Sum,
    /// Arithmetic mean of present values
    Avg,
    /// Number of present values
    Count,
}

impl Reducer {
    /// Apply the reducer to the values present at one timestamp
    ///
    /// Returns `None` for an empty slice; a timestamp with no contributing
    /// members is omitted from the output.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        Some(match self {
            Self::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Self::Sum => values.iter().sum(),
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Count => values.len() as f64,
        })
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Sum => write!(f, "sum"),
            Self::Avg => write!(f, "avg"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Builder for constructing queries programmatically
#[derive(Debug, Clone)]
pub struct RangeQueryBuilder {
    range: TimeRange,
    matchers: Vec<LabelMatcher>,
    with_labels: bool,
    count: Option<usize>,
    group_by: Option<GroupBy>,
}

impl RangeQueryBuilder {
    /// Create a builder over the given range
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            matchers: Vec::new(),
            with_labels: false,
            count: None,
            group_by: None,
        }
    }

    /// Add a label matcher
    pub fn matcher(mut self, matcher: LabelMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Add an equality matcher
    pub fn filter(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.matcher(LabelMatcher::eq(name, value))
    }

    /// Attach label metadata to output series
    pub fn with_labels(mut self) -> Self {
        self.with_labels = true;
        self
    }

    /// Keep only the earliest `count` samples per output series
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Group by a label and reduce each partition
    pub fn group_by(mut self, label: impl Into<String>, reducer: Reducer) -> Self {
        self.group_by = Some(GroupBy::new(label, reducer));
        self
    }

    /// Build the query
    pub fn build(self) -> RangeQuery {
        RangeQuery {
            range: self.range,
            matchers: self.matchers,
            with_labels: self.with_labels,
            count: self.count,
            group_by: self.group_by,
        }
    }
}
