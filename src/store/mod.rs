//! Tideline Series Store
//!
//! The in-process registry of series records shared by the rule graph and
//! the query engine:
//!
//! - **types**: Core data structures (Sample, Label, TimeRange, SeriesRecord)
//! - **registry**: Concurrency-safe key → record map with per-record locks
//! - **error**: Error types
//!
//! # Locking
//!
//! ```text
//! RwLock<HashMap<KeyId, Arc<SeriesHandle>>>   (brief map guards only)
//!                      │
//!                      └── Mutex<SeriesRecord> per series, acquired in
//!                          ascending lock_rank order for multi-record ops
//! ```

pub mod error;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use error::{StoreError, StoreResult};
pub use registry::SeriesRegistry;
pub use types::{
    Aggregator, CompactionRule, KeyId, Label, LabelSet, Sample, SeriesInfo, SeriesRecord,
    TimeRange,
};
