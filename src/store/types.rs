//! Core data types for the Tideline series store
//!
//! This module defines the fundamental types shared by the rule graph and the
//! query engine:
//! - `Sample`: a single (timestamp, value) measurement
//! - `Label` / `LabelSet`: series metadata used for filtering and grouping
//! - `TimeRange`: an inclusive time interval for range reads
//! - `Aggregator`: the closed set of compaction aggregation functions
//! - `CompactionRule` and `SeriesRecord`: the per-key record the graph mutates

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque key identifier, as handed to us by the underlying store.
pub type KeyId = String;

/// Mapping from label name to label value. Names are unique; insertion order
/// carries no meaning.
pub type LabelSet = HashMap<String, String>;

/// A single time-series sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// The measured value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A single (name, value) label, the ordered form used in query output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
    /// Label value
    pub value: String,
}

impl Label {
    /// Create a new label
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Inclusive time range for queries: `[start, end]`
///
/// Open-ended bounds use the `i64` extremes, matching the `-`/`+` sentinels
/// of the query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (inclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Sentinel for "earliest possible sample"
    pub const EARLIEST: i64 = i64::MIN;
    /// Sentinel for "latest possible sample"
    pub const LATEST: i64 = i64::MAX;

    /// Create a new inclusive range
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Range covering all samples
    pub fn all() -> Self {
        Self {
            start: Self::EARLIEST,
            end: Self::LATEST,
        }
    }

    /// Range from `start` with an open upper bound
    pub fn since(start: i64) -> Self {
        Self {
            start,
            end: Self::LATEST,
        }
    }

    /// Range up to `end` with an open lower bound
    pub fn until(end: i64) -> Self {
        Self {
            start: Self::EARLIEST,
            end,
        }
    }

    /// Check whether a timestamp falls inside this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// True if the range cannot contain any sample
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Aggregation functions available to compaction rules
///
/// A closed set: rule creation validates against it, and the variants are
/// stable identifiers in rule listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    /// Arithmetic mean of the bucket
    Avg,
    /// Sum of the bucket
    Sum,
    /// Minimum value in the bucket
    Min,
    /// Maximum value in the bucket
    Max,
    /// Max minus min over the bucket
    Range,
    /// Number of samples in the bucket
    Count,
    /// First sample in the bucket
    First,
    /// Last sample in the bucket
    Last,
}

impl Aggregator {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "avg" | "average" => Some(Self::Avg),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "range" => Some(Self::Range),
            "count" => Some(Self::Count),
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

impl std::fmt::Display for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "AVG"),
            Self::Sum => write!(f, "SUM"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
            Self::Range => write!(f, "RANGE"),
            Self::Count => write!(f, "COUNT"),
            Self::First => write!(f, "FIRST"),
            Self::Last => write!(f, "LAST"),
        }
    }
}

/// A directed compaction edge: this series continuously feeds `destination`
/// by aggregating into fixed-width buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionRule {
    /// Key of the series this rule feeds
    pub destination: KeyId,
    /// Aggregation applied per bucket
    pub aggregator: Aggregator,
    /// Downsampling window in milliseconds (always positive)
    pub bucket_duration: u64,
}

impl CompactionRule {
    /// Create a new rule
    pub fn new(destination: impl Into<KeyId>, aggregator: Aggregator, bucket_duration: u64) -> Self {
        Self {
            destination: destination.into(),
            aggregator,
            bucket_duration,
        }
    }
}

/// The mutable per-key record owned by the registry
///
/// `rules` is ordered: insertion order is creation order and renames mutate
/// entries in place without reordering. `source_link` is a non-owning
/// back-reference to the series whose outgoing rule currently feeds this one.
#[derive(Debug, Clone)]
pub struct SeriesRecord {
    /// Current key of this series
    pub id: KeyId,
    /// Label set used by filter resolution and grouping
    pub labels: LabelSet,
    /// Source series feeding this one, if this series is a compaction
    /// destination
    pub source_link: Option<KeyId>,
    /// Outgoing compaction rules, in creation order
    pub rules: Vec<CompactionRule>,
    /// Raw samples, ascending by timestamp, no duplicates
    pub(crate) samples: Vec<Sample>,
}

impl SeriesRecord {
    /// Create an empty record
    pub fn new(id: impl Into<KeyId>, labels: LabelSet) -> Self {
        Self {
            id: id.into(),
            labels,
            source_link: None,
            rules: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Find the position of the outgoing rule feeding `destination`
    pub fn rule_position(&self, destination: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.destination == destination)
    }
}

/// Read-only snapshot of a series, for rule listings and introspection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesInfo {
    /// Key of the series
    pub id: KeyId,
    /// Labels, sorted by name for deterministic output
    pub labels: Vec<Label>,
    /// Source series feeding this one, if any
    pub source_key: Option<KeyId>,
    /// Outgoing rules in creation order
    pub rules: Vec<CompactionRule>,
    /// Number of stored samples
    pub sample_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(10, 20);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(9));
        assert!(!range.contains(21));
    }

    #[test]
    fn test_time_range_open_ends() {
        assert!(TimeRange::all().contains(i64::MIN));
        assert!(TimeRange::all().contains(i64::MAX));
        assert!(TimeRange::since(5).contains(i64::MAX));
        assert!(!TimeRange::since(5).contains(4));
        assert!(TimeRange::until(5).contains(i64::MIN));
        assert!(!TimeRange::until(5).contains(6));
    }

    #[test]
    fn test_time_range_empty() {
        assert!(TimeRange::new(10, 5).is_empty());
        assert!(!TimeRange::new(5, 5).is_empty());
    }

    #[test]
    fn test_aggregator_roundtrip() {
        for agg in [
            Aggregator::Avg,
            Aggregator::Sum,
            Aggregator::Min,
            Aggregator::Max,
            Aggregator::Range,
            Aggregator::Count,
            Aggregator::First,
            Aggregator::Last,
        ] {
            let parsed = Aggregator::from_str(&agg.to_string());
            assert_eq!(parsed, Some(agg));
        }
        assert_eq!(Aggregator::from_str("median"), None);
    }

    #[test]
    fn test_rule_position() {
        let mut record = SeriesRecord::new("a", LabelSet::new());
        record.rules.push(CompactionRule::new("b", Aggregator::Avg, 5000));
        record.rules.push(CompactionRule::new("c", Aggregator::Sum, 1000));

        assert_eq!(record.rule_position("b"), Some(0));
        assert_eq!(record.rule_position("c"), Some(1));
        assert_eq!(record.rule_position("d"), None);
    }
}
