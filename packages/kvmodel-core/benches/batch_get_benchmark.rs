//! Criterion benchmarks for batched retrieval.
//!
//! Measures `get_many` over an unthrottled store and over one that services
//! only part of every batch, so the retry path is exercised.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kvmodel_core::schema::{FieldSpec, SchemaBuilder};
use kvmodel_core::types::{attributes, Value, ValueKind};
use kvmodel_core::{Connection, MemoryStore, Model, ModelConfig};
use std::hint::black_box;
use std::sync::Arc;

/// Builds a model over `store` and fills its table with `count` records.
fn seeded_model(store: MemoryStore, count: usize) -> anyhow::Result<Model> {
    let schema = SchemaBuilder::new("BenchItem")
        .table("bench_items")
        .field(FieldSpec::new("id", ValueKind::String).hash_key())
        .field(FieldSpec::new("payload", ValueKind::String))
        .field(FieldSpec::new("rank", ValueKind::Integer))
        .build()?;
    let config = ModelConfig {
        batch_retry_initial_delay_ms: 0,
        batch_retry_max_delay_ms: 0,
        batch_max_retries: 64,
        ..ModelConfig::default()
    };
    let model = Model::new(schema, Connection::with_config(Arc::new(store), config));
    model.create_table(true)?;

    for i in 0..count {
        let mut entity = model.create_with(
            format!("item-{i}"),
            attributes([
                ("payload", Value::from("x".repeat(64))),
                ("rank", Value::from(i as i64)),
            ]),
        )?;
        entity.save()?;
    }
    Ok(model)
}

fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("item-{i}")).collect()
}

/// Benchmark: unthrottled batch reads at several key counts
fn benchmark_batch_get(c: &mut Criterion) {
    let model = seeded_model(MemoryStore::new(), 1_000).expect("Failed to seed store");
    let mut group = c.benchmark_group("batch_get");
    for count in [10, 100, 1_000] {
        let wanted = keys(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &wanted, |b, wanted| {
            b.iter(|| {
                let found = model.get_many(wanted.iter()).expect("batch get failed");
                black_box(found);
            });
        });
    }
    group.finish();
}

/// Benchmark: batch reads that need several passes to drain unprocessed keys
fn benchmark_throttled_batch_get(c: &mut Criterion) {
    let store = MemoryStore::new().with_batch_capacity(25);
    let model = seeded_model(store, 500).expect("Failed to seed store");
    let wanted = keys(500);
    c.bench_function("throttled_batch_get_500", |b| {
        b.iter(|| {
            let found = model.get_many(wanted.iter()).expect("batch get failed");
            black_box(found);
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(50)
        .warm_up_time(std::time::Duration::from_secs(1))
        .measurement_time(std::time::Duration::from_secs(5));
    targets =
        benchmark_batch_get,
        benchmark_throttled_batch_get
);

criterion_main!(benches);
