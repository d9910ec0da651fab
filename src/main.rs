//! Tideline CLI
//!
//! Seeds a small in-process store, wires up compaction rules, and walks
//! through a rename plus a few multi-range queries.

use std::sync::Arc;
use tideline::config::Config;
use tideline::query::QueryEngine;
use tideline::rules::{parse_policy, RuleGraph};
use tideline::store::{LabelSet, SeriesRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();

    // Initialize logging
    let default_filter = format!("tideline={}", config.logging.level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(default_filter),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tideline v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(SeriesRegistry::new());
    let rules = RuleGraph::new(Arc::clone(&registry));

    seed_demo_series(&registry)?;

    // Standing compaction rules from the configured (or demo) policy
    let policy_text = config
        .rules
        .default_policy
        .unwrap_or_else(|| "avg:1h;max:1d".to_string());
    let policy = parse_policy(&policy_text)?;
    let created = rules.apply_policy("cpu:user", &policy)?;
    tracing::info!("Applied policy '{}': created {:?}", policy_text, created);

    // Renaming the source relocates every rule edge with it
    rules.on_rename("cpu:user", "cpu:user:primary")?;
    let info = registry.describe("cpu:user:primary")?;
    tracing::info!(
        "After rename: {} rules still attached to {}",
        info.rules.len(),
        info.id
    );

    let engine =
        QueryEngine::for_registry(registry).with_result_cap(config.query.max_result_samples);
    demo_query(engine).await?;

    Ok(())
}

fn seed_demo_series(registry: &SeriesRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let series = [
        ("cpu:user", "cpu", "user"),
        ("cpu:system", "cpu", "system"),
        ("mem:resident", "mem", "resident"),
    ];
    for (id, family, name) in series {
        let labels: LabelSet = [
            ("metric_family".to_string(), family.to_string()),
            ("metric_name".to_string(), name.to_string()),
        ]
        .into();
        registry.create_series(id, labels)?;
        for t in 0..60 {
            registry.append(id, t * 1000, (t % 10) as f64)?;
        }
    }
    tracing::info!("Seeded {} demo series", registry.len());
    Ok(())
}

async fn demo_query(engine: QueryEngine) -> Result<(), Box<dyn std::error::Error>> {
    let queries = [
        "- + FILTER metric_family=cpu",
        "- + WITHLABELS FILTER metric_family=cpu GROUPBY metric_name REDUCE max",
        "0 30000 COUNT 5 FILTER metric_name!=resident",
    ];

    for text in queries {
        let results = engine.execute_str(text).await?;
        tracing::info!("query '{}' -> {} output series", text, results.len());
        for series in &results {
            tracing::info!("  {}: {} samples", series.name, series.len());
        }
    }
    Ok(())
}
