//! # Command Handlers
//!
//! Built-in handlers registered at startup (e.g., .help, .ping, the media and deletion loggers).
//! They are invoked by the Dispatcher.

pub mod album_logger;
pub mod delete_logger;
pub mod help;
pub mod message_cache;
pub mod ping;

use crate::application::registry::HandlerRegistry;
use crate::domain::config::AppConfig;
use crate::domain::error::CoreResult;

/// Registers every built-in handler. The returned catalog must be published
/// once all registrations, built-in or not, are done.
pub fn register_builtins(
    registry: &mut HandlerRegistry,
    config: &AppConfig,
) -> CoreResult<help::Catalog> {
    let catalog = help::Catalog::default();
    help::register(registry, catalog.clone())?;
    ping::register(registry)?;
    message_cache::register(registry)?;
    album_logger::register(registry, config)?;
    delete_logger::register(registry, config)?;
    Ok(catalog)
}
