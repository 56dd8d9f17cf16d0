//! CLI for exercising entity mapping against the in-memory store.
//!
//! Provides commands for:
//! - Printing the effective configuration and the demo schemas
//! - Walking one entity through its save lifecycle
//! - Measuring batched retrieval against a throttled store

mod cli;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use kvmodel_core::schema::{AbstractSchema, EntitySchema};
use kvmodel_core::types::{attributes, string_set, Value};
use kvmodel_core::{
    Connection, FieldSpec, MemoryStore, Model, ModelConfig, SchemaBuilder, SchemaRegistry,
    ValueKind,
};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

/// Registers the demo entities: an abstract audited base plus two tables.
fn demo_registry() -> anyhow::Result<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    let audited = registry.register_abstract(
        SchemaBuilder::new("Audited")
            .field(FieldSpec::new("created_by", ValueKind::String).default_value("system"))
            .field(FieldSpec::new("labels", ValueKind::StringSet))
            .build_abstract()?,
    )?;
    registry.register(
        SchemaBuilder::new("Membership")
            .table("memberships")
            .capacity(4, 2)
            .key_template("{org}:{user}")
            .inherit(&audited)
            .field(FieldSpec::new("id", ValueKind::String).hash_key())
            .field(FieldSpec::new("org", ValueKind::String))
            .field(FieldSpec::new("user", ValueKind::Integer))
            .field(
                FieldSpec::new("role", ValueKind::String)
                    .default_value("member")
                    .validator(|v| match v.as_str() {
                        Some("member" | "admin" | "owner") => Ok(()),
                        _ => Err(format!("unknown role {v}")),
                    }),
            )
            .field(FieldSpec::new("settings", ValueKind::JsonMap))
            .build()?,
    )?;
    registry.register(
        SchemaBuilder::new("Document")
            .table("documents")
            .inherit(&audited)
            .field(FieldSpec::new("id", ValueKind::String).hash_key().auto_generate())
            .field(FieldSpec::new("title", ValueKind::String))
            .field(FieldSpec::new("size", ValueKind::Integer))
            .build()?,
    )?;
    Ok(registry)
}

fn load_config(cli: &Cli) -> anyhow::Result<ModelConfig> {
    let config = match &cli.config {
        Some(path) => ModelConfig::from_file(path)?,
        None => ModelConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(prefix) = &cli.prefix {
        config.table_prefix = prefix.clone();
    }
    Ok(config)
}

fn print_schema(schema: &EntitySchema) {
    println!("{} (table {})", schema.name(), schema.table());
    if let Some(template) = schema.template() {
        println!("  key template: {}", template.source());
    }
    if let Some(capacity) = schema.capacity() {
        println!(
            "  capacity: {} read / {} write",
            capacity.read_units, capacity.write_units
        );
    }
    for field in schema.fields() {
        let mut flags = Vec::new();
        if field.is_hash_key {
            flags.push("hash key".to_string());
        }
        if field.is_range_key {
            flags.push("range key".to_string());
        }
        if field.auto_generate {
            flags.push("generated".to_string());
        }
        if let Some(default) = &field.default {
            flags.push(format!("default {default}"));
        }
        println!("  {:<12} {:<10} {}", field.name, field.kind, flags.join(", "));
    }
}

fn print_abstract(schema: &AbstractSchema) {
    println!("{} (abstract)", schema.name());
    for field in schema.fields() {
        println!("  {:<12} {}", field.name, field.kind);
    }
}

fn lifecycle(model: &Model, org: &str, user: i64) -> anyhow::Result<()> {
    let mut member = model.get_or_create(attributes([
        ("org", Value::from(org)),
        ("user", Value::from(user)),
    ]))?;
    println!(
        "key {} (stored: {})",
        member.key_value()?,
        member.exists()
    );
    member.set("role", "admin")?;
    member.set("settings", serde_json::json!({"theme": "dark"}))?;
    member.save()?;

    member.set("role", "owner")?;
    member.stage_add_to_set("labels", string_set(["early", "beta"]))?;
    println!("pending: {:?}", member.pending_fields());
    member.save()?;

    member.remove_from_set("labels", string_set(["beta"]), false)?;
    let stored = model.get(member.key_value()?.clone())?;
    println!("stored:");
    for (name, value) in stored.to_attributes()? {
        println!("  {name} = {value}");
    }

    if let Err(e) = member.set("org", "other") {
        println!("key change rejected: {e}");
    }
    if let Err(e) = member.set("role", "guest") {
        println!("validation: {e}");
    }

    let removed = member.delete()?;
    let still_there = model.find(member.key_value()?.clone())?.is_some();
    println!("deleted: {removed}, found after delete: {still_there}");
    Ok(())
}

fn batch_get(model: &Model, store: &MemoryStore, records: usize, keys: usize) -> anyhow::Result<()> {
    let started = Instant::now();
    for i in 0..records {
        let mut doc = model.create_with(
            format!("doc-{i:06}"),
            attributes([
                ("title", Value::from(format!("Document {i}"))),
                ("size", Value::from(i as i64)),
            ]),
        )?;
        doc.save()?;
    }
    tracing::info!(records, elapsed_ms = started.elapsed().as_millis() as u64, "Seeded records");

    let wanted: Vec<String> = (0..keys).map(|i| format!("doc-{i:06}")).collect();
    let started = Instant::now();
    let found = model.get_many(wanted.iter())?;
    let hits = found.iter().filter(|e| e.is_some()).count();
    let stats = store.stats();
    println!(
        "requested {} keys, found {}, {} batch calls, {} keys sent back unprocessed, {:.1?}",
        wanted.len(),
        hits,
        stats.batch_get_calls(),
        stats.unprocessed_returned(),
        started.elapsed()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config(&cli).context("loading configuration")?;
    let registry = demo_registry().context("declaring demo entities")?;

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Schema => {
            print_abstract(&*registry.get_abstract("Audited")?);
            for name in registry.names() {
                if let Ok(schema) = registry.get(&name) {
                    print_schema(&schema);
                }
            }
        }
        Commands::Lifecycle { org, user } => {
            let connection = Connection::with_config(Arc::new(MemoryStore::new()), config);
            let model = Model::from_registry(&registry, "Membership", connection)?;
            model.create_table(true)?;
            lifecycle(&model, &org, user)?;
        }
        Commands::BatchGet {
            records,
            keys,
            throttle,
        } => {
            let store = match throttle {
                Some(capacity) => MemoryStore::new().with_batch_capacity(capacity),
                None => MemoryStore::new(),
            };
            let store = Arc::new(store);
            let connection = Connection::with_config(store.clone(), config);
            let model = Model::from_registry(&registry, "Document", connection)?;
            model.create_table(true)?;
            batch_get(&model, &store, records, keys)?;
        }
    }

    Ok(())
}
