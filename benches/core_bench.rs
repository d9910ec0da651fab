//! Benchmarks for the rule graph and query engine
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tideline::query::{QueryEngine, RangeQuery, Reducer};
use tideline::rules::RuleGraph;
use tideline::store::{Aggregator, LabelSet, SeriesRegistry};

fn cpu_labels(name: &str) -> LabelSet {
    [
        ("metric_family".to_string(), "cpu".to_string()),
        ("metric_name".to_string(), name.to_string()),
    ]
    .into()
}

/// A source with `fan_out` compaction destinations.
fn fan_out_registry(fan_out: usize) -> (Arc<SeriesRegistry>, RuleGraph) {
    let registry = Arc::new(SeriesRegistry::new());
    registry.create_series("src", LabelSet::new()).unwrap();

    let graph = RuleGraph::new(Arc::clone(&registry));
    for i in 0..fan_out {
        let dest = format!("dst{}", i);
        registry.create_series(&dest, LabelSet::new()).unwrap();
        graph
            .create_rule("src", &dest, Aggregator::Avg, 60_000)
            .unwrap();
    }
    (registry, graph)
}

fn bench_rename(c: &mut Criterion) {
    let mut group = c.benchmark_group("rename");

    for fan_out in [1, 8, 64] {
        let (_registry, graph) = fan_out_registry(fan_out);

        group.throughput(Throughput::Elements(fan_out as u64));
        group.bench_function(format!("fan_out_{}", fan_out), |b| {
            let mut generation = 0u64;
            let mut current = "src".to_string();
            b.iter(|| {
                generation += 1;
                let next = format!("src_{}", generation);
                graph.on_rename(black_box(&current), &next).unwrap();
                current = next;
            })
        });
    }

    group.finish();
}

fn bench_group_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_query");

    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for (series_count, samples_per) in [(10, 100), (100, 100), (10, 10_000)] {
        let registry = Arc::new(SeriesRegistry::new());
        for s in 0..series_count {
            let id = format!("s{}", s);
            let name = if s % 2 == 0 { "user" } else { "system" };
            registry.create_series(&id, cpu_labels(name)).unwrap();
            for t in 0..samples_per {
                registry.append(&id, t as i64, t as f64).unwrap();
            }
        }
        let engine = QueryEngine::for_registry(registry);
        let query = RangeQuery::all_time()
            .filter("metric_family", "cpu")
            .group_by("metric_name", Reducer::Sum)
            .build();

        group.throughput(Throughput::Elements((series_count * samples_per) as u64));
        group.bench_function(
            format!("reduce_{}x{}", series_count, samples_per),
            |b| {
                b.iter(|| {
                    let results = rt.block_on(engine.execute(black_box(&query))).unwrap();
                    black_box(results)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_rename, bench_group_query);
criterion_main!(benches);
