//! Series Registry
//!
//! Process-wide, concurrency-safe map from key to series record. Locking is
//! fine-grained: the map itself sits behind an `RwLock`, and every record has
//! its own `Mutex`. Multi-record operations (rule mutation, rename
//! propagation, series deletion) lock the affected records in ascending
//! `lock_rank` order, so overlapping mutations cannot deadlock while renames
//! of disjoint subgraphs proceed fully in parallel.
//!
//! # Lock protocol
//!
//! - The map guard is never held while acquiring a record lock. Accessors
//!   clone the `Arc<SeriesHandle>` out of the map and drop the guard first.
//! - `lock_rank` is assigned once at creation and never changes, unlike the
//!   key, so the acquisition order stays canonical across renames.

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{KeyId, Label, LabelSet, Sample, SeriesInfo, SeriesRecord, TimeRange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// A shareable handle to one series record
#[derive(Debug)]
pub struct SeriesHandle {
    /// Stable lock-ordering token, assigned at creation
    pub(crate) lock_rank: u64,
    /// The record itself
    pub(crate) record: Mutex<SeriesRecord>,
}

impl SeriesHandle {
    /// Lock the underlying record, surfacing poisoning as an error
    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, SeriesRecord>> {
        self.record
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

/// Lock a rank-sorted, deduplicated set of handles in order
///
/// Callers must sort by `lock_rank` and dedup first; the guards borrow from
/// the passed slice.
pub(crate) fn lock_ranked<'a>(
    handles: &'a [Arc<SeriesHandle>],
) -> StoreResult<Vec<MutexGuard<'a, SeriesRecord>>> {
    debug_assert!(handles.windows(2).all(|w| w[0].lock_rank < w[1].lock_rank));
    handles.iter().map(|h| h.lock()).collect()
}

/// Sort and deduplicate a set of handles into canonical lock order
pub(crate) fn rank_sorted(mut handles: Vec<Arc<SeriesHandle>>) -> Vec<Arc<SeriesHandle>> {
    handles.sort_by_key(|h| h.lock_rank);
    handles.dedup_by_key(|h| h.lock_rank);
    handles
}

/// The registry of all live series
#[derive(Debug, Default)]
pub struct SeriesRegistry {
    /// Key → record handle
    series: RwLock<HashMap<KeyId, Arc<SeriesHandle>>>,
    /// Source of `lock_rank` values
    next_rank: AtomicU64,
}

impl SeriesRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live series
    pub fn len(&self) -> usize {
        self.series.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a key exists
    pub fn contains(&self, id: &str) -> bool {
        self.series.read().map(|m| m.contains_key(id)).unwrap_or(false)
    }

    /// Register a new series under `id`
    pub fn create_series(&self, id: impl Into<KeyId>, labels: LabelSet) -> StoreResult<()> {
        let id = id.into();
        let mut map = self
            .series
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if map.contains_key(&id) {
            return Err(StoreError::SeriesExists(id));
        }

        let rank = self.next_rank.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(SeriesHandle {
            lock_rank: rank,
            record: Mutex::new(SeriesRecord::new(id.clone(), labels)),
        });
        tracing::debug!("Created series {}", id);
        map.insert(id, handle);
        Ok(())
    }

    /// Remove a series and detach every compaction edge referencing it
    ///
    /// The source (if this series was a destination) loses its rule entry,
    /// and every destination of this series has its `source_link` cleared.
    pub fn delete_series(&self, id: &str) -> StoreResult<()> {
        let removed = {
            let mut map = self
                .series
                .write()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            map.remove(id)
                .ok_or_else(|| StoreError::SeriesNotFound(id.to_string()))?
        };

        // Snapshot the edges, then lock the neighborhood in rank order and
        // detach. Rewrites are keyed on the removed id, so concurrent renames
        // of neighbors cannot misdirect them.
        let (source_id, dest_ids) = {
            let record = removed.lock()?;
            let dests: Vec<KeyId> = record.rules.iter().map(|r| r.destination.clone()).collect();
            (record.source_link.clone(), dests)
        };

        let mut handles = Vec::with_capacity(1 + dest_ids.len());
        if let Some(src) = &source_id {
            if let Ok(h) = self.handle(src) {
                handles.push(h);
            }
        }
        for dest in &dest_ids {
            if let Ok(h) = self.handle(dest) {
                handles.push(h);
            }
        }

        let handles = rank_sorted(handles);
        let mut guards = lock_ranked(&handles)?;
        for guard in guards.iter_mut() {
            guard.rules.retain(|r| r.destination != id);
            if guard.source_link.as_deref() == Some(id) {
                guard.source_link = None;
            }
        }

        tracing::debug!("Deleted series {}", id);
        Ok(())
    }

    /// Append a sample; timestamps must be strictly increasing per series
    pub fn append(&self, id: &str, timestamp: i64, value: f64) -> StoreResult<()> {
        let handle = self.handle(id)?;
        let mut record = handle.lock()?;
        if let Some(last) = record.samples.last() {
            if timestamp <= last.timestamp {
                return Err(StoreError::OutOfOrderSample {
                    key: id.to_string(),
                    timestamp,
                    last: last.timestamp,
                });
            }
        }
        record.samples.push(Sample::new(timestamp, value));
        Ok(())
    }

    /// Read-only snapshot of one series: labels, source link, ordered rules
    pub fn describe(&self, id: &str) -> StoreResult<SeriesInfo> {
        let handle = self.handle(id)?;
        let record = handle.lock()?;

        let mut labels: Vec<Label> = record
            .labels
            .iter()
            .map(|(name, value)| Label::new(name, value))
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(SeriesInfo {
            id: record.id.clone(),
            labels,
            source_key: record.source_link.clone(),
            rules: record.rules.clone(),
            sample_count: record.samples.len(),
        })
    }

    /// Fetch samples whose timestamps fall in the inclusive range
    pub fn fetch_range(&self, id: &str, range: TimeRange) -> StoreResult<Vec<Sample>> {
        let handle = self.handle(id)?;
        let record = handle.lock()?;
        Ok(record
            .samples
            .iter()
            .filter(|s| range.contains(s.timestamp))
            .copied()
            .collect())
    }

    /// All live series with their labels
    ///
    /// Clones the handle set under the map guard, then locks records one at a
    /// time, per the lock protocol.
    pub fn all_series(&self) -> StoreResult<Vec<(KeyId, LabelSet)>> {
        let handles: Vec<Arc<SeriesHandle>> = {
            let map = self
                .series
                .read()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            map.values().cloned().collect()
        };

        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let record = handle.lock()?;
            out.push((record.id.clone(), record.labels.clone()));
        }
        Ok(out)
    }

    /// Look up the handle for a key
    pub(crate) fn handle(&self, id: &str) -> StoreResult<Arc<SeriesHandle>> {
        let map = self
            .series
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        map.get(id)
            .cloned()
            .ok_or_else(|| StoreError::SeriesNotFound(id.to_string()))
    }

    /// Move the map entry from `old` to `new` in one step
    ///
    /// Verifies both preconditions under the write guard so the re-key either
    /// happens fully or not at all. Record fields are untouched; the rule
    /// graph rewrites them with the record locks held.
    pub(crate) fn rekey(&self, old: &str, new: &str) -> StoreResult<()> {
        let mut map = self
            .series
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if map.contains_key(new) {
            return Err(StoreError::SeriesExists(new.to_string()));
        }
        let handle = map
            .remove(old)
            .ok_or_else(|| StoreError::SeriesNotFound(old.to_string()))?;
        map.insert(new.to_string(), handle);
        Ok(())
    }
}
