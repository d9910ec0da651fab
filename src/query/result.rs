//! Query result shape
//!
//! The ordered output consumed by the protocol layer: one entry per output
//! series, each carrying its display name, optional label metadata, and
//! ascending samples.

use crate::store::{Label, Sample};
use serde::Serialize;

/// One output series of a multi-range query
///
/// For ungrouped queries `name` is the series key; for grouped queries it is
/// the synthesized `"<label>=<value>"` identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesResult {
    /// Display name of the output series
    pub name: String,
    /// Label metadata, present only when the query asked for it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Label>>,
    /// Samples, ascending by timestamp
    pub samples: Vec<Sample>,
}

impl SeriesResult {
    /// Create a new result series
    pub fn new(name: impl Into<String>, labels: Option<Vec<Label>>, samples: Vec<Sample>) -> Self {
        Self {
            name: name.into(),
            labels,
            samples,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the series carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
