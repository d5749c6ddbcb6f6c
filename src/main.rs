//! neume - graph schema compiler
//!
//! Loads a YAML model declaration, provisions it against the in-memory
//! store and prints the resulting graph topology and GraphQL SDL.

mod cli;
mod config;
mod services;

use std::sync::Arc;

use anyhow::Context;
use neume::{MemoryStore, ModelDeclaration, SchemaAssembler};
use tracing::info;

use crate::cli::CliOptions;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    services::init_tracing(config.log_json)?;
    let options = CliOptions::from_args();

    let model_path = options
        .model_override
        .clone()
        .unwrap_or_else(|| config.model_path.clone());
    info!(model = %model_path.display(), "Loading model");
    let model = ModelDeclaration::from_path(&model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

    let assembler = SchemaAssembler::new(config.schema_settings());
    model.apply(&assembler).context("Invalid model declaration")?;

    let storage = Arc::new(MemoryStore::new());
    let schema = assembler
        .materialize(storage.clone())
        .await
        .context("Failed to materialize schema")?;
    info!(
        kinds = schema.kinds().len(),
        graphs = schema.topologies().len(),
        provisioned = storage.provisioning_log().len(),
        "Schema materialized"
    );

    if options.print_topology {
        println!("{}", serde_json::to_string_pretty(schema.topologies())?);
    }
    if options.print_sdl {
        println!("{}", schema.sdl().context("Failed to build GraphQL schema")?);
    }

    Ok(())
}
