//! Compaction Rule Graph
//!
//! Maintains the directed source → destination compaction edges and keeps
//! them consistent and order-preserving across key renames.
//!
//! # Invariants
//!
//! - Graph symmetry: a rule `S → D` in `S.rules` always has the mirrored
//!   `D.source_link == S.id`, and vice versa.
//! - A destination is fed by exactly one source; a source may fan out.
//! - No self-loops.
//! - Rename relabels identifiers inside existing records; it never creates,
//!   destroys, or reorders rule entries.
//!
//! # Rename propagation
//!
//! `on_rename` touches exactly the renamed record, its source (found through
//! the `source_link` back-reference, not a scan), and the destinations of its
//! outgoing rules: O(1 + out-degree), never O(total keys). The affected
//! records are locked in ascending `lock_rank` order, so renames of disjoint
//! subgraphs run concurrently and overlapping ones serialize without
//! deadlock.

use crate::rules::error::{RuleError, RuleResult};
use crate::rules::policy::PolicyRule;
use crate::store::registry::{lock_ranked, rank_sorted};
use crate::store::{Aggregator, CompactionRule, KeyId, LabelSet, SeriesRegistry};
use std::sync::Arc;

/// The rule graph over a shared series registry
#[derive(Debug, Clone)]
pub struct RuleGraph {
    /// The registry whose records carry the edges
    registry: Arc<SeriesRegistry>,
}

impl RuleGraph {
    /// Create a rule graph over the given registry
    pub fn new(registry: Arc<SeriesRegistry>) -> Self {
        Self { registry }
    }

    /// Access the underlying registry
    pub fn registry(&self) -> &Arc<SeriesRegistry> {
        &self.registry
    }

    /// Create a compaction rule from `source` to `destination`
    ///
    /// Fails with `DuplicateSource` if the destination already has a source
    /// rule, `SelfLoop` if source and destination are the same key, and
    /// `InvalidBucket` for a zero bucket. A failed call mutates nothing.
    pub fn create_rule(
        &self,
        source: &str,
        destination: &str,
        aggregator: Aggregator,
        bucket_duration: u64,
    ) -> RuleResult<()> {
        if bucket_duration == 0 {
            return Err(RuleError::InvalidBucket(bucket_duration));
        }
        if source == destination {
            return Err(RuleError::SelfLoop(source.to_string()));
        }

        loop {
            let src = self.registry.handle(source)?;
            let dst = self.registry.handle(destination)?;
            let handles = rank_sorted(vec![src, dst]);
            let mut guards = lock_ranked(&handles)?;

            // A rename may have retargeted either key between lookup and
            // lock; retry against the fresh map state if so.
            let src_idx = guards.iter().position(|g| g.id == source);
            let dst_idx = guards.iter().position(|g| g.id == destination);
            let (src_idx, dst_idx) = match (src_idx, dst_idx) {
                (Some(s), Some(d)) => (s, d),
                _ => {
                    drop(guards);
                    continue;
                }
            };

            if guards[dst_idx].source_link.is_some() {
                return Err(RuleError::DuplicateSource(destination.to_string()));
            }

            guards[src_idx]
                .rules
                .push(CompactionRule::new(destination, aggregator, bucket_duration));
            guards[dst_idx].source_link = Some(source.to_string());

            tracing::debug!(
                "Created rule {} -> {} ({} / {}ms)",
                source,
                destination,
                aggregator,
                bucket_duration
            );
            return Ok(());
        }
    }

    /// Delete the rule from `source` to `destination`
    ///
    /// Fails with `RuleNotFound` if no such rule exists; otherwise removes
    /// the rule entry and clears the destination's `source_link` as one step.
    pub fn delete_rule(&self, source: &str, destination: &str) -> RuleResult<()> {
        loop {
            let src = self.registry.handle(source)?;
            let dst = self.registry.handle(destination)?;
            let handles = rank_sorted(vec![src, dst]);
            let mut guards = lock_ranked(&handles)?;

            let src_idx = guards.iter().position(|g| g.id == source);
            let dst_idx = guards.iter().position(|g| g.id == destination);
            let (src_idx, dst_idx) = match (src_idx, dst_idx) {
                (Some(s), Some(d)) => (s, d),
                _ => {
                    drop(guards);
                    continue;
                }
            };

            let position = match guards[src_idx].rule_position(destination) {
                Some(p) => p,
                None => {
                    return Err(RuleError::RuleNotFound {
                        source: source.to_string(),
                        destination: destination.to_string(),
                    })
                }
            };

            guards[src_idx].rules.remove(position);
            guards[dst_idx].source_link = None;

            tracing::debug!("Deleted rule {} -> {}", source, destination);
            return Ok(());
        }
    }

    /// Propagate a key rename through the graph
    ///
    /// Invoked synchronously by the store's rename path, before the rename is
    /// acknowledged. In one logically atomic step this:
    ///
    /// 1. re-keys the registry entry from `old` to `new`;
    /// 2. rewrites the single rule entry referencing `old` inside the source
    ///    record (located via the `source_link` back-reference);
    /// 3. rewrites `source_link` in every destination of the renamed series.
    ///
    /// All affected record locks are held across the rewrite, so no reader
    /// ever observes a half-updated edge. A rename of a series with no edges
    /// is a trivial no-op (beyond the re-key). A failed call leaves the graph
    /// exactly as it was.
    pub fn on_rename(&self, old: &str, new: &str) -> RuleResult<()> {
        if old == new {
            return Ok(());
        }

        loop {
            let renamed = self.registry.handle(old)?;

            // Snapshot the edge set without other locks held, then collect
            // the neighborhood handles.
            let (source_id, dest_ids) = {
                let record = renamed.lock()?;
                let dests: Vec<KeyId> =
                    record.rules.iter().map(|r| r.destination.clone()).collect();
                (record.source_link.clone(), dests)
            };

            let mut handles = Vec::with_capacity(2 + dest_ids.len());
            handles.push(Arc::clone(&renamed));
            if let Some(src) = &source_id {
                handles.push(self.registry.handle(src)?);
            }
            for dest in &dest_ids {
                handles.push(self.registry.handle(dest)?);
            }
            let handles = rank_sorted(handles);
            let mut guards = lock_ranked(&handles)?;

            // Re-validate: a concurrent mutation may have changed the
            // subgraph between snapshot and acquisition.
            let renamed_idx = guards.iter().position(|g| g.id == old);
            let unchanged = renamed_idx.is_some_and(|idx| {
                let record = &guards[idx];
                record.source_link == source_id
                    && record.rules.len() == dest_ids.len()
                    && record
                        .rules
                        .iter()
                        .zip(dest_ids.iter())
                        .all(|(r, d)| r.destination == *d)
            });
            if !unchanged {
                drop(guards);
                continue;
            }

            // Re-key first: if the target key exists the error surfaces here
            // with every record still untouched.
            self.registry.rekey(old, new)?;

            // Rewrite identifiers in place, keyed on the old id. This
            // uniformly covers the renamed record, the source's rule entry,
            // and each destination's back-reference, including records that
            // are both source and destination of the renamed series. Rule
            // positions are never disturbed.
            for guard in guards.iter_mut() {
                if guard.id == old {
                    guard.id = new.to_string();
                }
                for rule in guard.rules.iter_mut() {
                    if rule.destination == old {
                        rule.destination = new.to_string();
                    }
                }
                if guard.source_link.as_deref() == Some(old) {
                    guard.source_link = Some(new.to_string());
                }
            }

            tracing::debug!(
                "Renamed series {} -> {} (source: {}, destinations: {})",
                old,
                new,
                source_id.is_some(),
                dest_ids.len()
            );
            return Ok(());
        }
    }

    /// Materialize a compaction policy against a source series
    ///
    /// Creates one destination series plus rule per policy entry, with
    /// destination keys of the form `<source>_<AGG>_<bucket>`. Each
    /// underlying create is individually atomic; the batch as a whole is
    /// not, and stops at the first error.
    pub fn apply_policy(&self, source: &str, policy: &[PolicyRule]) -> RuleResult<Vec<KeyId>> {
        // Source must exist before any destination is created.
        self.registry.handle(source)?;

        let mut created = Vec::with_capacity(policy.len());
        for rule in policy {
            let destination = format!("{}_{}_{}", source, rule.aggregator, rule.bucket_ms);
            self.registry
                .create_series(destination.clone(), LabelSet::new())?;
            self.create_rule(source, &destination, rule.aggregator, rule.bucket_ms)?;
            created.push(destination);
        }

        tracing::info!(
            "Applied compaction policy to {}: {} destinations",
            source,
            created.len()
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LabelSet;
    use std::thread;

    fn setup(keys: &[&str]) -> (Arc<SeriesRegistry>, RuleGraph) {
        let registry = Arc::new(SeriesRegistry::new());
        for key in keys {
            registry.create_series(*key, LabelSet::new()).unwrap();
        }
        let graph = RuleGraph::new(Arc::clone(&registry));
        (registry, graph)
    }

    /// Assert graph symmetry for every live series: each rule S -> D has
    /// D.source_key == S, and each source_key has exactly one matching rule.
    fn assert_symmetry(registry: &SeriesRegistry) {
        for (id, _) in registry.all_series().unwrap() {
            let info = registry.describe(&id).unwrap();
            for rule in &info.rules {
                let dest = registry.describe(&rule.destination).unwrap();
                assert_eq!(
                    dest.source_key.as_deref(),
                    Some(id.as_str()),
                    "rule {} -> {} lacks mirrored source link",
                    id,
                    rule.destination
                );
            }
            if let Some(source) = &info.source_key {
                let src = registry.describe(source).unwrap();
                let referencing = src
                    .rules
                    .iter()
                    .filter(|r| r.destination == id)
                    .count();
                assert_eq!(referencing, 1, "source {} must reference {} once", source, id);
            }
        }
    }

    #[test]
    fn test_create_rule_sets_both_sides() {
        let (registry, graph) = setup(&["a", "b"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();

        let a = registry.describe("a").unwrap();
        assert_eq!(a.rules.len(), 1);
        assert_eq!(a.rules[0].destination, "b");
        assert_eq!(a.rules[0].aggregator, Aggregator::Avg);
        assert_eq!(a.rules[0].bucket_duration, 5000);
        assert_eq!(a.source_key, None);

        let b = registry.describe("b").unwrap();
        assert_eq!(b.source_key.as_deref(), Some("a"));
        assert!(b.rules.is_empty());
        assert_symmetry(&registry);
    }

    #[test]
    fn test_create_rule_duplicate_source() {
        let (_, graph) = setup(&["a", "b", "c"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();

        let err = graph.create_rule("c", "b", Aggregator::Sum, 1000).unwrap_err();
        assert!(matches!(err, RuleError::DuplicateSource(_)));
        // Same source again is also rejected: the destination is taken.
        let err = graph.create_rule("a", "b", Aggregator::Sum, 1000).unwrap_err();
        assert!(matches!(err, RuleError::DuplicateSource(_)));
    }

    #[test]
    fn test_create_rule_self_loop() {
        let (_, graph) = setup(&["a"]);
        let err = graph.create_rule("a", "a", Aggregator::Avg, 5000).unwrap_err();
        assert!(matches!(err, RuleError::SelfLoop(_)));
    }

    #[test]
    fn test_create_rule_zero_bucket() {
        let (_, graph) = setup(&["a", "b"]);
        let err = graph.create_rule("a", "b", Aggregator::Avg, 0).unwrap_err();
        assert!(matches!(err, RuleError::InvalidBucket(0)));
    }

    #[test]
    fn test_create_rule_missing_series() {
        let (_, graph) = setup(&["a"]);
        let err = graph.create_rule("a", "ghost", Aggregator::Avg, 5000).unwrap_err();
        assert!(matches!(err, RuleError::Store(_)));
    }

    #[test]
    fn test_delete_rule() {
        let (registry, graph) = setup(&["a", "b"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();
        graph.delete_rule("a", "b").unwrap();

        assert!(registry.describe("a").unwrap().rules.is_empty());
        assert_eq!(registry.describe("b").unwrap().source_key, None);

        let err = graph.delete_rule("a", "b").unwrap_err();
        assert!(matches!(err, RuleError::RuleNotFound { .. }));
    }

    #[test]
    fn test_rename_without_edges_is_noop() {
        let (registry, graph) = setup(&["a1", "b"]);
        graph.on_rename("a1", "a2").unwrap();

        let info = registry.describe("a2").unwrap();
        assert_eq!(info.source_key, None);
        assert!(info.rules.is_empty());
        assert!(!registry.contains("a1"));
    }

    #[test]
    fn test_rename_source_relocates_back_reference() {
        // Mirrors: create rule a2 -> b, rename a2 -> a3 twice over.
        let (registry, graph) = setup(&["a1", "b"]);
        graph.on_rename("a1", "a2").unwrap();
        graph.create_rule("a2", "b", Aggregator::Avg, 5000).unwrap();

        assert_eq!(registry.describe("b").unwrap().source_key.as_deref(), Some("a2"));

        graph.on_rename("a2", "a3").unwrap();
        let b = registry.describe("b").unwrap();
        assert_eq!(b.source_key.as_deref(), Some("a3"));
        assert!(b.rules.is_empty());

        let a3 = registry.describe("a3").unwrap();
        assert_eq!(a3.rules[0].destination, "b");
        assert_symmetry(&registry);
    }

    #[test]
    fn test_rename_destination_preserves_rule_order() {
        let (registry, graph) = setup(&["a", "b", "c", "d"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();
        graph.create_rule("a", "c", Aggregator::Count, 2000).unwrap();
        graph.create_rule("a", "d", Aggregator::Sum, 3000).unwrap();

        graph.on_rename("b", "b1").unwrap();
        let a = registry.describe("a").unwrap();
        assert_eq!(a.source_key, None);
        assert_eq!(a.rules[0].destination, "b1");
        assert_eq!(a.rules[1].destination, "c");
        assert_eq!(a.rules[2].destination, "d");

        graph.on_rename("c", "c1").unwrap();
        let a = registry.describe("a").unwrap();
        assert_eq!(a.rules[0].destination, "b1");
        assert_eq!(a.rules[1].destination, "c1");
        assert_eq!(a.rules[2].destination, "d");

        // Aggregator and bucket fields ride along untouched.
        assert_eq!(a.rules[1].aggregator, Aggregator::Count);
        assert_eq!(a.rules[1].bucket_duration, 2000);
        assert_symmetry(&registry);
    }

    #[test]
    fn test_rename_fans_out_to_every_destination() {
        let (registry, graph) = setup(&["a", "b", "c", "d"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();
        graph.create_rule("a", "c", Aggregator::Min, 1000).unwrap();
        graph.create_rule("a", "d", Aggregator::Max, 2000).unwrap();

        graph.on_rename("a", "a2").unwrap();
        for dest in ["b", "c", "d"] {
            assert_eq!(
                registry.describe(dest).unwrap().source_key.as_deref(),
                Some("a2")
            );
        }
        assert_symmetry(&registry);
    }

    #[test]
    fn test_rename_middle_of_chain() {
        // a -> b -> c: renaming b touches both its source and its destination.
        let (registry, graph) = setup(&["a", "b", "c"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();
        graph.create_rule("b", "c", Aggregator::Sum, 1000).unwrap();

        graph.on_rename("b", "b2").unwrap();
        assert_eq!(registry.describe("a").unwrap().rules[0].destination, "b2");
        assert_eq!(registry.describe("c").unwrap().source_key.as_deref(), Some("b2"));
        let b2 = registry.describe("b2").unwrap();
        assert_eq!(b2.source_key.as_deref(), Some("a"));
        assert_eq!(b2.rules[0].destination, "c");
        assert_symmetry(&registry);
    }

    #[test]
    fn test_rename_missing_key() {
        let (_, graph) = setup(&[]);
        let err = graph.on_rename("ghost", "ghost2").unwrap_err();
        assert!(matches!(err, RuleError::Store(crate::store::StoreError::SeriesNotFound(_))));
    }

    #[test]
    fn test_rename_onto_existing_key_mutates_nothing() {
        let (registry, graph) = setup(&["a", "b", "c"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();

        let err = graph.on_rename("a", "c").unwrap_err();
        assert!(matches!(err, RuleError::Store(crate::store::StoreError::SeriesExists(_))));

        // Graph untouched
        assert!(registry.contains("a"));
        assert_eq!(registry.describe("b").unwrap().source_key.as_deref(), Some("a"));
        assert_symmetry(&registry);
    }

    #[test]
    fn test_symmetry_after_mutation_sequence() {
        let (registry, graph) = setup(&["a", "b", "c", "d", "e"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();
        graph.create_rule("a", "c", Aggregator::Sum, 1000).unwrap();
        graph.create_rule("d", "e", Aggregator::Max, 2000).unwrap();
        graph.on_rename("a", "a1").unwrap();
        graph.delete_rule("a1", "b").unwrap();
        graph.on_rename("c", "c1").unwrap();
        graph.on_rename("e", "e1").unwrap();
        graph.create_rule("a1", "b", Aggregator::Last, 9000).unwrap();
        assert_symmetry(&registry);

        // b was deleted then re-added: it must sit after c1 in creation order.
        let a1 = registry.describe("a1").unwrap();
        assert_eq!(a1.rules[0].destination, "c1");
        assert_eq!(a1.rules[1].destination, "b");
    }

    #[test]
    fn test_concurrent_disjoint_renames() {
        let registry = Arc::new(SeriesRegistry::new());
        let graph = RuleGraph::new(Arc::clone(&registry));

        // Two disjoint fan-out subgraphs.
        for i in 0..2 {
            let src = format!("src{}", i);
            registry.create_series(src.clone(), LabelSet::new()).unwrap();
            for j in 0..8 {
                let dest = format!("dst{}_{}", i, j);
                registry.create_series(dest.clone(), LabelSet::new()).unwrap();
                graph.create_rule(&src, &dest, Aggregator::Avg, 5000).unwrap();
            }
        }

        let workers: Vec<_> = (0..2)
            .map(|i| {
                let graph = graph.clone();
                thread::spawn(move || {
                    for round in 0..50 {
                        let old = if round == 0 {
                            format!("src{}", i)
                        } else {
                            format!("src{}_r{}", i, round - 1)
                        };
                        let new = format!("src{}_r{}", i, round);
                        graph.on_rename(&old, &new).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        for i in 0..2 {
            let final_id = format!("src{}_r49", i);
            let info = registry.describe(&final_id).unwrap();
            assert_eq!(info.rules.len(), 8);
            for j in 0..8 {
                assert_eq!(info.rules[j].destination, format!("dst{}_{}", i, j));
                let dest = registry.describe(&format!("dst{}_{}", i, j)).unwrap();
                assert_eq!(dest.source_key.as_deref(), Some(final_id.as_str()));
            }
        }
        assert_symmetry(&registry);
    }

    #[test]
    fn test_delete_series_detaches_edges() {
        let (registry, graph) = setup(&["a", "b", "c"]);
        graph.create_rule("a", "b", Aggregator::Avg, 5000).unwrap();
        graph.create_rule("b", "c", Aggregator::Sum, 1000).unwrap();

        registry.delete_series("b").unwrap();
        assert!(registry.describe("a").unwrap().rules.is_empty());
        assert_eq!(registry.describe("c").unwrap().source_key, None);
        assert_symmetry(&registry);
    }
}
