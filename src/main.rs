//! # Main Entry Point
//!
//! Loads the configuration, sets up logging and the cache, registers the
//! built-in handlers and drives the dispatcher from the console event source.
//!

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use herald::application::dispatcher::Dispatcher;
use herald::application::handler::Services;
use herald::application::registry::HandlerRegistry;
use herald::domain::config::AppConfig;
use herald::infrastructure::console::{ConsoleSink, JsonLinesSource};
use herald::infrastructure::{cache, logging};
use herald::interface::commands;
use herald::strings::logs;

#[derive(Debug, Parser)]
#[command(name = "herald", version, about = "Event dispatch core for a messaging automation agent")]
struct Cli {
    /// Path to config.yaml (defaults to data/config.yaml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compile the routing table, print the command listing as JSON and exit
    #[arg(long)]
    check: bool,

    /// Log filter directive, e.g. `debug` or `herald=trace` (RUST_LOG wins)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load Configuration
    let config = AppConfig::discover(cli.config.as_deref())?;

    // 2. Routing table; registration errors abort startup
    let mut registry = HandlerRegistry::new(&config.prefix);
    let catalog = commands::register_builtins(&mut registry, &config)
        .context("Failed to register built-in handlers")?;
    catalog.publish(&registry);

    if cli.check {
        println!("{}", serde_json::to_string_pretty(&registry.describe())?);
        return Ok(());
    }

    // 3. Logging Setup
    let _guard = logging::init(&config.logging, cli.log_level.as_deref())?;
    tracing::info!("{}", logs::config_loaded(&config.prefix, registry.len()));

    // 4. Collaborators
    let cache = cache::build(&config.cache).await?;
    let services = Services {
        sink: Arc::new(ConsoleSink::stdout()),
        cache,
        config: Arc::new(config),
    };

    // 5. Event Loop
    let dispatcher = Dispatcher::new(Arc::new(registry), services);
    dispatcher.run(JsonLinesSource::stdin()).await;

    Ok(())
}
